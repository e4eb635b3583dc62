//! Process spawning: `cast`, `charm` and `invoke`.
//!
//! All three block until their single child terminates and classify the
//! termination the same way (see [`Termination`]). No timeouts, no signals
//! sent to children.

mod spawn;

pub use spawn::{cast, charm, invoke};

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use serde::{Deserialize, Serialize};

use crate::error::{ProcessFault, RitualError, RitualResult};

/// One argument as supplied by a caller: a direct value or a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> From<T> for Arg<T> {
    fn from(value: T) -> Self {
        Arg::One(value)
    }
}

/// Normalize an argument list given either as trailing values or as a single
/// container into one flat vector.
///
/// Mixing both shapes, or nesting more than one container, is a usage error;
/// so is an empty result.
pub fn normalize_args<T>(op: &'static str, args: Vec<Arg<T>>) -> RitualResult<Vec<T>> {
    let containers = args.iter().filter(|a| matches!(a, Arg::Many(_))).count();

    let values = match containers {
        0 => args
            .into_iter()
            .filter_map(|a| match a {
                Arg::One(v) => Some(v),
                Arg::Many(_) => None,
            })
            .collect::<Vec<_>>(),
        1 if args.len() == 1 => match args.into_iter().next() {
            Some(Arg::Many(values)) => values,
            _ => Vec::new(),
        },
        1 => {
            return Err(RitualError::usage(
                op,
                "arguments must be given either as trailing values or as a single list, not both",
            ))
        }
        n => {
            return Err(RitualError::usage(
                op,
                format!("expected at most one argument list, found {n}"),
            ))
        }
    };

    if values.is_empty() {
        return Err(RitualError::usage(op, "missing arguments"));
    }
    Ok(values)
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited(i32),
    Signaled(i32),
}

impl Termination {
    /// Map success to `Ok(())` and anything else to a [`RitualError::Process`].
    pub fn check(self, op: &'static str) -> RitualResult<()> {
        match self {
            Termination::Exited(0) => Ok(()),
            Termination::Exited(code) => {
                Err(RitualError::Process { op, fault: ProcessFault::Exited { code } })
            }
            Termination::Signaled(signal) => Err(RitualError::Process {
                op,
                fault: ProcessFault::Signaled { signal, name: signal_name(signal) },
            }),
        }
    }
}

impl From<ExitStatus> for Termination {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => Termination::Exited(code),
            (None, Some(signal)) => Termination::Signaled(signal),
            // Neither exited nor signaled: only reachable for stopped children,
            // which we never request.
            (None, None) => Termination::Exited(-1),
        }
    }
}

impl TryFrom<WaitStatus> for Termination {
    type Error = WaitStatus;

    fn try_from(status: WaitStatus) -> Result<Self, Self::Error> {
        match status {
            WaitStatus::Exited(_, code) => Ok(Termination::Exited(code)),
            WaitStatus::Signaled(_, signal, _) => Ok(Termination::Signaled(signal as i32)),
            other => Err(other),
        }
    }
}

fn signal_name(signal: i32) -> String {
    Signal::try_from(signal)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| format!("signal {signal}"))
}

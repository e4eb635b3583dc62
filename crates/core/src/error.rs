//! Error taxonomy shared by every ritual operation.
//!
//! Every fault is fail-fast: nothing in the engine retries, and partial side
//! effects are never rolled back. Messages carry the operation name plus the
//! path or argv involved so callers can report them without re-deriving
//! context.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for ritual operations.
pub type RitualResult<T> = Result<T, RitualError>;

/// Top-level error type surfaced to scripts and frontends.
#[derive(Debug, Error)]
pub enum RitualError {
    /// Malformed call shape or arguments, detected before any side effect.
    #[error("{op}: {message}")]
    Usage { op: &'static str, message: String },

    /// An incantation element could not be resolved against the registry.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Process creation (fork/exec/pipe) failed before the child ran.
    #[error("{op}: {context}: {source}")]
    Spawn {
        op: &'static str,
        context: String,
        #[source]
        source: io::Error,
    },

    /// A spawned process terminated unsuccessfully.
    #[error("{op}: {fault}")]
    Process { op: &'static str, fault: ProcessFault },

    /// Filesystem operation failure.
    #[error("{op}: {action} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Namespace or credential-mapping step failure.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// Template rendering failure.
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    /// A script file could not be read or parsed.
    #[error("script {}: {message}", .path.display())]
    Script { path: PathBuf, message: String },

    /// The script asked for termination with the given status.
    #[error("exit requested with status {code}")]
    Exit { code: i32 },
}

impl RitualError {
    /// Build an [`RitualError::Io`] from its parts.
    pub fn io(
        op: &'static str,
        action: &'static str,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::Io { op, action, path: path.into(), source }
    }

    /// Build a [`RitualError::Usage`] from its parts.
    pub fn usage(op: &'static str, message: impl Into<String>) -> Self {
        Self::Usage { op, message: message.into() }
    }

    /// Status a process should exit with after this error aborted it.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exit { code } => *code,
            _ => 1,
        }
    }
}

/// Unknown ritual name encountered while building an incantation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("incantation: element #{index}: unknown ritual '{name}'")]
pub struct ResolutionError {
    /// Zero-based position of the offending element.
    pub index: usize,
    pub name: String,
}

/// How a spawned process failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessFault {
    #[error("Exited with code {code}")]
    Exited { code: i32 },
    #[error("Terminated with signal {signal} ({name})")]
    Signaled { signal: i32, name: String },
}

/// Failure of one step of the namespace sandbox.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("hinder: {step}: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("hinder: process already entered an isolated namespace")]
    AlreadyHindered,
}

/// Failure while rendering a template.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("preprocess {}: unterminated variable '@{name}'", .path.display())]
    Unterminated { path: PathBuf, name: String },
    #[error("preprocess: {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

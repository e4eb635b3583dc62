use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::process::{Command, Stdio};

use nix::errno::Errno;
use nix::sys::wait::waitpid;
use nix::unistd::{fork, ForkResult, Pid};

use super::Termination;
use crate::error::{RitualError, RitualResult};
use crate::report::Report;
use crate::rituals::{Circle, Incantation};

/// Split `argv` into program and arguments.
fn program<'a>(op: &'static str, argv: &'a [String]) -> RitualResult<(&'a str, &'a [String])> {
    match argv.split_first() {
        Some((program, args)) if !program.is_empty() => Ok((program.as_str(), args)),
        _ => Err(RitualError::usage(op, "missing executable")),
    }
}

fn spawn_error(op: &'static str, program: &str, source: io::Error) -> RitualError {
    RitualError::Spawn { op, context: format!("execute {program}"), source }
}

/// Run `argv` to completion without capturing anything.
///
/// The executable is searched in `PATH` unless it contains a path separator.
/// No shell is involved.
pub fn cast(report: &dyn Report, argv: &[String]) -> RitualResult<()> {
    const OP: &str = "cast";
    let (program, args) = program(OP, argv)?;
    report.invocation(argv);

    let status =
        Command::new(program).args(args).status().map_err(|e| spawn_error(OP, program, e))?;

    Termination::from(status).check(OP)
}

/// Run `argv` and return its standard output, byte for byte, with one
/// trailing newline stripped.
///
/// The pipe is drained to end-of-stream before the child is reaped, so a
/// child filling the pipe buffer can never deadlock against us.
pub fn charm(report: &dyn Report, argv: &[String]) -> RitualResult<Vec<u8>> {
    const OP: &str = "charm";
    let (program, args) = program(OP, argv)?;
    report.invocation(argv);

    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(OP, program, e))?;

    let mut output = Vec::new();
    // The pipe's read end is dropped at the end of this statement, before wait.
    let drained = match child.stdout.take() {
        Some(mut stdout) => stdout.read_to_end(&mut output).map(|_| ()),
        None => Ok(()),
    };

    let status = child
        .wait()
        .map_err(|e| RitualError::Spawn { op: OP, context: format!("wait {program}"), source: e })?;
    drained.map_err(|e| RitualError::Spawn { op: OP, context: "read".to_string(), source: e })?;

    Termination::from(status).check(OP)?;

    if output.last() == Some(&b'\n') {
        output.pop();
    }
    Ok(output)
}

/// Perform `incantation` inside a forked copy of the current process.
///
/// The child sees a snapshot of the circle: nothing it changes is visible to
/// the caller, which only observes the exit status. When `output` is given it
/// is opened (created/truncated) before anything runs and receives both
/// standard output and standard error.
pub fn invoke(
    circle: &mut Circle,
    incantation: &Incantation,
    output: Option<&Path>,
) -> RitualResult<()> {
    const OP: &str = "invoke";

    // Anything still buffered would otherwise be written by both processes.
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();

    // SAFETY: the child only runs ritual code and then exits; it never
    // returns into the caller's frames.
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            let code = run_child(circle, incantation, output);
            let _ = io::stdout().flush();
            let _ = io::stderr().flush();
            std::process::exit(code);
        }
        Ok(ForkResult::Parent { child }) => wait_child(OP, child),
        Err(errno) => {
            Err(RitualError::Spawn { op: OP, context: "fork".to_string(), source: errno.into() })
        }
    }
}

fn run_child(circle: &mut Circle, incantation: &Incantation, output: Option<&Path>) -> i32 {
    if let Some(path) = output {
        if let Err(err) = redirect_output(path) {
            circle.report().failure(&err.to_string());
            return 1;
        }
    }

    match panic::catch_unwind(AssertUnwindSafe(|| incantation.perform(circle))) {
        Ok(Ok(())) => 0,
        Ok(Err(err)) => {
            if !matches!(err, RitualError::Exit { .. }) {
                circle.report().failure(&err.to_string());
            }
            err.exit_code()
        }
        Err(_) => 101,
    }
}

fn redirect_output(path: &Path) -> RitualResult<()> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o666)
        .open(path)
        .map_err(|e| RitualError::io("invoke", "open", path, e))?;

    for (target, label) in [(libc::STDOUT_FILENO, "dup2 (stdout)"), (libc::STDERR_FILENO, "dup2 (stderr)")]
    {
        // SAFETY: both descriptors are valid for the duration of the call.
        if unsafe { libc::dup2(file.as_raw_fd(), target) } < 0 {
            return Err(RitualError::io("invoke", label, path, io::Error::last_os_error()));
        }
    }
    Ok(())
}

fn wait_child(op: &'static str, child: Pid) -> RitualResult<()> {
    loop {
        match waitpid(child, None) {
            Ok(status) => {
                if let Ok(termination) = Termination::try_from(status) {
                    return termination.check(op);
                }
            }
            Err(Errno::EINTR) => {}
            Err(errno) => {
                return Err(RitualError::Spawn {
                    op,
                    context: format!("waitpid {child}"),
                    source: errno.into(),
                })
            }
        }
    }
}

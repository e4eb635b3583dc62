//! Report collaborator: human-readable lifecycle notifications.
//!
//! Reports never influence control flow. Frontends pick an implementation
//! through [`ReportKind`]; the engine only sees `&dyn Report`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Receiver of lifecycle events emitted while rituals run.
pub trait Report {
    /// An incantation element is about to run (`None` for anonymous ones).
    fn incantation(&self, name: Option<&str>);
    /// An external process is about to be spawned.
    fn invocation(&self, argv: &[String]);
    fn copy(&self, src: &Path, dst: &Path);
    fn remove(&self, paths: &[PathBuf]);
    fn preprocess(&self, src: &Path, dst: &Path);
    fn failure(&self, message: &str);
}

/// Report that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReport;

impl Report for NoReport {
    fn incantation(&self, _name: Option<&str>) {}
    fn invocation(&self, _argv: &[String]) {}
    fn copy(&self, _src: &Path, _dst: &Path) {}
    fn remove(&self, _paths: &[PathBuf]) {}
    fn preprocess(&self, _src: &Path, _dst: &Path) {}
    fn failure(&self, _message: &str) {}
}

/// Report that writes one log line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReport;

impl Report for LogReport {
    fn incantation(&self, name: Option<&str>) {
        tracing::info!(notice = true, "Performing incantation for {}", name.unwrap_or("<anonymous>"));
    }

    fn invocation(&self, argv: &[String]) {
        tracing::info!("Invocation of {}", argv.join(" "));
    }

    fn copy(&self, src: &Path, dst: &Path) {
        tracing::info!("Copying file(s) from {} to {}", src.display(), dst.display());
    }

    fn remove(&self, paths: &[PathBuf]) {
        let joined = paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ");
        tracing::info!("Removing file(s) at {joined}");
    }

    fn preprocess(&self, src: &Path, dst: &Path) {
        tracing::info!("Preprocessing {} into {}", src.display(), dst.display());
    }

    fn failure(&self, message: &str) {
        tracing::error!("{message}");
    }
}

/// Selects which [`Report`] implementation a frontend installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    None,
    #[default]
    Log,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::None => "none",
            ReportKind::Log => "log",
        }
    }

    /// Instantiate the selected report.
    pub fn build(&self) -> Box<dyn Report> {
        match self {
            ReportKind::None => Box::new(NoReport),
            ReportKind::Log => Box::new(LogReport),
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ReportKind::None),
            "log" => Ok(ReportKind::Log),
            other => Err(format!("Invalid report kind '{other}' (expected none or log)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_kind_round_trips_through_str() {
        assert_eq!("none".parse::<ReportKind>().unwrap(), ReportKind::None);
        assert_eq!("log".parse::<ReportKind>().unwrap(), ReportKind::Log);
        assert!("loud".parse::<ReportKind>().is_err());
        assert_eq!(ReportKind::default(), ReportKind::Log);
    }
}

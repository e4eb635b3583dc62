use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hex::commands::{check_command, list_rituals_command, run_command};
use hex::{build_circle, init_logging, resolve_config};
use ritual_core::report::ReportKind;
use ritual_core::rituals::Circle;
use ritual_core::RitualError;

/// Scripted provisioning tool.
///
/// This CLI is a thin wrapper around `ritual-core` (exposed in code as `ritual_core`).
/// Scripts register rituals by name and list what to perform; every fault
/// aborts the run with a non-zero exit status.
#[derive(Parser, Debug)]
#[command(name = "hex", version, about = "Perform ritual scripts", long_about = None)]
struct Cli {
    /// JSON config file (report kind, log filter, initial variables).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Report implementation receiving lifecycle events: `none` or `log`.
    #[arg(long, global = true, value_name = "KIND")]
    report: Option<ReportKind>,

    /// Log at debug level (ignored when `RUST_LOG` or a config filter is set).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ScriptArgs {
    /// Script files, loaded in order into one shared circle.
    #[arg(required = true, value_name = "SCRIPT")]
    scripts: Vec<PathBuf>,

    /// Define a variable; overrides config variables and script defaults.
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUE")]
    defines: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and perform scripts in order.
    Run {
        #[command(flatten)]
        args: ScriptArgs,

        /// Ritual to perform after every script has run (repeatable, in order).
        #[arg(long = "perform", value_name = "RITUAL")]
        perform: Vec<String>,
    },

    /// Load scripts and resolve every ritual name without performing anything.
    Check {
        #[command(flatten)]
        args: ScriptArgs,

        /// Ritual names to resolve as if given to `run --perform`.
        #[arg(long = "perform", value_name = "RITUAL")]
        perform: Vec<String>,
    },

    /// List rituals registered by the given scripts.
    Rituals {
        #[command(flatten)]
        args: ScriptArgs,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

impl Command {
    fn script_args(&self) -> &ScriptArgs {
        match self {
            Command::Run { args, .. } | Command::Check { args, .. } | Command::Rituals { args, .. } => {
                args
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let mut config = match resolve_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    };
    config.verbose |= cli.verbose;
    init_logging(&config.effective_log_filter());

    let report = cli.report.unwrap_or(config.report);
    let mut circle = match build_circle(&config, Some(report), &cli.command.script_args().defines) {
        Ok(circle) => circle,
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(2);
        }
    };

    let result = match &cli.command {
        Command::Run { args, perform } => run_command(&mut circle, &args.scripts, perform),
        Command::Check { args, perform } => check_command(&mut circle, &args.scripts, perform),
        Command::Rituals { args, json } => {
            match list_rituals_command(&mut circle, &args.scripts, *json) {
                Ok(()) => Ok(()),
                Err(err) => {
                    fail(&circle, report, &format!("{err:#}"));
                    std::process::exit(1);
                }
            }
        }
    };

    if let Err(err) = result {
        if !matches!(err, RitualError::Exit { .. }) {
            fail(&circle, report, &err.to_string());
        }
        std::process::exit(err.exit_code());
    }
}

/// Surface a fatal error through the report, or plainly when reports are off.
fn fail(circle: &Circle, report: ReportKind, message: &str) {
    circle.report().failure(message);
    if report == ReportKind::None {
        eprintln!("Error: {message}");
    }
}

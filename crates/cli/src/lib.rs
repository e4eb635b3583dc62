pub mod commands;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Result};
use ritual_core::config::{load_config, HexConfig};
use ritual_core::report::ReportKind;
use ritual_core::rituals::Circle;
use tracing_subscriber::EnvFilter;

/// Parse a `NAME=VALUE` variable definition from the command line.
pub fn parse_define(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(anyhow!("Invalid variable definition '{}'. Expected NAME=VALUE", raw)),
    }
}

/// Load the config file when one is given, defaults otherwise.
pub fn resolve_config(path: Option<&Path>) -> Result<HexConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(HexConfig::default()),
    }
}

/// Install the global `tracing` subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `default_filter`. Calling this twice is
/// harmless; the second subscriber is ignored.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Build the circle every script of one run shares.
///
/// Config variables come first; command-line definitions override them.
pub fn build_circle(
    config: &HexConfig,
    report: Option<ReportKind>,
    defines: &[String],
) -> Result<Circle> {
    let mut variables: BTreeMap<String, String> = config.variables.clone();
    for raw in defines {
        let (name, value) = parse_define(raw)?;
        variables.insert(name, value);
    }

    let mut circle = Circle::new(report.unwrap_or(config.report).build());
    circle.variables = variables;
    Ok(circle)
}

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::report::ReportKind;

/// Serializable configuration for a hex run.
///
/// Frontends read it from a JSON file; command-line flags override it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HexConfig {
    /// Schema/config version. This is about the config format, not the tool version.
    #[serde(default = "default_config_version")]
    pub config_version: String,
    /// Which report implementation receives lifecycle events.
    #[serde(default)]
    pub report: ReportKind,
    /// Optional `tracing` filter directive (e.g. `debug`, `ritual_core=trace`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    /// Log at debug level when no explicit filter is given.
    #[serde(default)]
    pub verbose: bool,
    /// Variables every circle starts with.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
}

fn default_config_version() -> String {
    "0.1.0".to_string()
}

impl Default for HexConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            report: ReportKind::default(),
            log_filter: None,
            verbose: false,
            variables: BTreeMap::new(),
        }
    }
}

impl HexConfig {
    /// Filter directive to initialise logging with.
    pub fn effective_log_filter(&self) -> String {
        match &self.log_filter {
            Some(filter) => filter.clone(),
            None if self.verbose => "debug".to_string(),
            None => "info".to_string(),
        }
    }
}

/// Load the config JSON from disk.
pub fn load_config(path: &Path) -> Result<HexConfig> {
    let config_json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let config: HexConfig =
        serde_json::from_str(&config_json).context("Failed to parse config JSON")?;
    Ok(config)
}

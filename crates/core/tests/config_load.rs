use std::fs;

use ritual_core::config::{load_config, HexConfig};
use ritual_core::report::ReportKind;
use tempfile::tempdir;

#[test]
fn loads_config_from_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hex.json");
    fs::write(
        &path,
        r#"{ "report": "none", "log_filter": "warn", "variables": { "PREFIX": "/opt" } }"#,
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.report, ReportKind::None);
    assert_eq!(config.effective_log_filter(), "warn");
    assert_eq!(config.variables["PREFIX"], "/opt");
    assert_eq!(config.config_version, HexConfig::default().config_version);
}

#[test]
fn missing_and_malformed_configs_fail_with_context() {
    let dir = tempdir().unwrap();
    let err = load_config(&dir.path().join("absent.json")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config"));

    let bad = dir.path().join("bad.json");
    fs::write(&bad, "{ not json").unwrap();
    let err = load_config(&bad).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config JSON"));
}

use hex::{build_circle, parse_define, resolve_config};
use ritual_core::config::HexConfig;
use ritual_core::report::ReportKind;

#[test]
fn parse_define_splits_on_first_equals() {
    assert_eq!(parse_define("A=b=c").unwrap(), ("A".to_string(), "b=c".to_string()));
    assert_eq!(parse_define("EMPTY=").unwrap(), ("EMPTY".to_string(), String::new()));
    assert!(parse_define("=x").is_err());
    assert!(parse_define("plain").is_err());
}

#[test]
fn resolve_config_defaults_without_path() {
    assert_eq!(resolve_config(None).unwrap(), HexConfig::default());
}

#[test]
fn defines_override_config_variables() {
    let mut config = HexConfig::default();
    config.variables.insert("A".into(), "config".into());
    config.variables.insert("B".into(), "config".into());

    let circle = build_circle(&config, Some(ReportKind::None), &["A=cli".to_string()]).unwrap();
    assert_eq!(circle.variables["A"], "cli");
    assert_eq!(circle.variables["B"], "config");
}

use std::fs;
use std::path::{Path, PathBuf};

use predicates::prelude::*;
use tempfile::tempdir;

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("write script");
    path
}

#[test]
fn check_loads_without_performing() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();
    let script = write(
        root,
        "s.yml",
        "rituals:\n  build:\n    - mkdirs: should-not-exist\n  all:\n    - incantation: [build]\nperform: [all]\n",
    );

    assert_cmd::cargo::cargo_bin_cmd!("hex")
        .current_dir(root)
        .arg("check")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("Scripts OK"))
        .stdout(predicate::str::contains("Registered rituals: 2"));

    assert!(!root.join("should-not-exist").exists());
}

#[test]
fn check_rejects_unknown_nested_names() {
    let dir = tempdir().expect("tempdir");
    let script = write(dir.path(), "s.yml", "rituals:\n  all:\n    - invoke: { rituals: [ghost] }\n");

    assert_cmd::cargo::cargo_bin_cmd!("hex")
        .args(["--report", "none", "check"])
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("references unknown ritual 'ghost'"));
}

#[test]
fn check_resolves_perform_flags() {
    let dir = tempdir().expect("tempdir");
    let script = write(dir.path(), "s.yml", "rituals:\n  known: []\n");

    assert_cmd::cargo::cargo_bin_cmd!("hex")
        .args(["--report", "none", "check"])
        .arg(&script)
        .args(["--perform", "unknown"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown ritual 'unknown'"));
}

#[test]
fn rituals_lists_sorted_names_across_scripts() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();
    let a = write(root, "a.yml", "rituals:\n  zeta: []\n  alpha: []\n");
    let b = write(root, "b.yml", "rituals:\n  mid: []\n");

    assert_cmd::cargo::cargo_bin_cmd!("hex")
        .arg("rituals")
        .arg(&a)
        .arg(&b)
        .assert()
        .success()
        .stdout(predicate::str::contains("Rituals:\n  - alpha\n  - mid\n  - zeta\n"));
}

#[test]
fn rituals_json_output() {
    let dir = tempdir().expect("tempdir");
    let script = write(dir.path(), "a.yml", "rituals:\n  one: []\n");

    let output = assert_cmd::cargo::cargo_bin_cmd!("hex")
        .arg("rituals")
        .arg(&script)
        .arg("--json")
        .output()
        .expect("run hex");
    assert!(output.status.success());

    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(entries[0]["name"], "one");
}

#[test]
fn rituals_with_empty_script_reports_none() {
    let dir = tempdir().expect("tempdir");
    let script = write(dir.path(), "a.yml", "perform: []\n");

    assert_cmd::cargo::cargo_bin_cmd!("hex")
        .arg("rituals")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("Rituals: (none)"));
}

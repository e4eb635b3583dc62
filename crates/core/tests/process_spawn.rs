use std::fs;

use nix::sys::signal::{raise, Signal};
use ritual_core::error::ProcessFault;
use ritual_core::process::{cast, charm, invoke};
use ritual_core::report::NoReport;
use ritual_core::rituals::{Circle, Element, Ritual};
use ritual_core::RitualError;
use tempfile::tempdir;

fn argv(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn sh(script: &str) -> Vec<String> {
    argv(&["sh", "-c", script])
}

fn exited_with(err: RitualError) -> i32 {
    match err {
        RitualError::Process { fault: ProcessFault::Exited { code }, .. } => code,
        other => panic!("expected exit fault, got: {other}"),
    }
}

#[test]
fn cast_succeeds_on_zero_status() {
    cast(&NoReport, &argv(&["true"])).unwrap();
}

#[test]
fn cast_reports_exit_code() {
    let err = cast(&NoReport, &sh("exit 7")).unwrap_err();
    assert_eq!(exited_with(err), 7);
}

#[test]
fn cast_reports_kill_signal() {
    let err = cast(&NoReport, &sh("kill -9 $$")).unwrap_err();
    match err {
        RitualError::Process { op, fault: ProcessFault::Signaled { signal, name } } => {
            assert_eq!(op, "cast");
            assert_eq!(signal, 9);
            assert_eq!(name, "SIGKILL");
        }
        other => panic!("expected signal fault, got: {other}"),
    }
}

#[test]
fn cast_missing_executable_is_a_spawn_error() {
    let err = cast(&NoReport, &argv(&["hex-definitely-not-a-real-program"])).unwrap_err();
    assert!(matches!(err, RitualError::Spawn { op: "cast", .. }), "unexpected: {err}");
}

#[test]
fn empty_argv_is_a_usage_error() {
    let err = cast(&NoReport, &[]).unwrap_err();
    assert!(matches!(err, RitualError::Usage { .. }), "unexpected: {err}");

    let err = charm(&NoReport, &argv(&["", "ignored"])).unwrap_err();
    assert!(matches!(err, RitualError::Usage { op: "charm", .. }), "unexpected: {err}");
}

#[test]
fn charm_strips_one_trailing_newline() {
    let out = charm(&NoReport, &argv(&["printf", "hello\\n"])).unwrap();
    assert_eq!(out, b"hello");

    let out = charm(&NoReport, &argv(&["printf", "a\\n\\n"])).unwrap();
    assert_eq!(out, b"a\n");
}

#[test]
fn charm_returns_raw_bytes() {
    let out = charm(&NoReport, &argv(&["printf", "\\377\\376"])).unwrap();
    assert_eq!(out, vec![0xff, 0xfe]);
}

#[test]
fn charm_drains_large_output() {
    let out = charm(&NoReport, &sh("i=0; while [ $i -lt 20000 ]; do echo 0123456789; i=$((i+1)); done"))
        .unwrap();
    assert_eq!(out.len(), 20000 * 11 - 1);
}

#[test]
fn charm_propagates_failure() {
    let err = charm(&NoReport, &sh("echo partial; exit 3")).unwrap_err();
    assert_eq!(exited_with(err), 3);
}

#[test]
fn invoke_runs_incantation_in_child() {
    let dir = tempdir().unwrap();
    let marker = dir.path().join("marker");
    let marker_arg = marker.display().to_string();

    let mut circle = Circle::default();
    circle.registry.register(
        "touch",
        Ritual::new(move |circle| cast(circle.report(), &argv(&["touch", marker_arg.as_str()]))),
    );
    circle.registry.register(
        "mutate",
        Ritual::new(|circle| {
            circle.variables.insert("child".into(), "yes".into());
            Ok(())
        }),
    );

    let incantation =
        circle.registry.build_incantation([Element::from("touch"), Element::from("mutate")]).unwrap();
    invoke(&mut circle, &incantation, None).unwrap();

    assert!(marker.exists());
    assert!(!circle.variables.contains_key("child"), "child state must not leak back");
}

#[test]
fn invoke_failure_is_only_visible_as_exit_status() {
    let mut circle = Circle::default();
    circle.registry.register("fail", Ritual::new(|c| cast(c.report(), &sh("exit 7"))));
    circle.registry.register("quit", Ritual::new(|_| Err(RitualError::Exit { code: 42 })));

    let failing = circle.registry.build_incantation([Element::from("fail")]).unwrap();
    let err = invoke(&mut circle, &failing, None).unwrap_err();
    assert_eq!(exited_with(err), 1);

    let quitting = circle.registry.build_incantation([Element::from("quit")]).unwrap();
    let err = invoke(&mut circle, &quitting, None).unwrap_err();
    assert_eq!(exited_with(err), 42);
}

#[test]
fn invoke_reports_child_killed_by_signal() {
    let mut circle = Circle::default();
    circle.registry.register(
        "die",
        Ritual::new(|_| {
            let _ = raise(Signal::SIGKILL);
            Ok(())
        }),
    );

    let incantation = circle.registry.build_incantation([Element::from("die")]).unwrap();
    match invoke(&mut circle, &incantation, None).unwrap_err() {
        RitualError::Process { op, fault: ProcessFault::Signaled { signal, name } } => {
            assert_eq!(op, "invoke");
            assert_eq!(signal, 9);
            assert_eq!(name, "SIGKILL");
        }
        other => panic!("expected signal fault, got: {other}"),
    }
}

#[test]
fn invoke_redirects_output_to_file() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("out.log");

    let mut circle = Circle::default();
    circle.registry.register(
        "speak",
        Ritual::new(|c| cast(c.report(), &sh("echo out; echo err >&2"))),
    );
    let incantation = circle.registry.build_incantation([Element::from("speak")]).unwrap();
    invoke(&mut circle, &incantation, Some(&log)).unwrap();

    let contents = fs::read_to_string(&log).unwrap();
    assert!(contents.contains("out\n"));
    assert!(contents.contains("err\n"));
}

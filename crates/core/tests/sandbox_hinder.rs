use ritual_core::error::{ProcessFault, SandboxError};
use ritual_core::process::invoke;
use ritual_core::rituals::{Circle, Element, Ritual};
use ritual_core::sandbox::{is_hindered, Credentials};
use ritual_core::RitualError;

/// Exit status the child uses when the host refuses user namespaces. Any
/// other failure to enter the sandbox fails the test.
const UNSUPPORTED: i32 = 77;

/// Entering the sandbox is process-wide and irreversible, so it only ever
/// happens inside a forked child.
#[test]
fn second_hinder_in_same_process_is_rejected() {
    let mut circle = Circle::default();
    circle.registry.register(
        "hinder-twice",
        Ritual::new(|_| {
            match Credentials::new(1000, 1000).hinder() {
                Ok(_) => {}
                Err(SandboxError::Step { step: "unshare", .. }) => {
                    return Err(RitualError::Exit { code: UNSUPPORTED });
                }
                Err(_) => return Err(RitualError::Exit { code: 4 }),
            }
            if !is_hindered() {
                return Err(RitualError::Exit { code: 2 });
            }
            match Credentials::new(1000, 1000).hinder() {
                Err(SandboxError::AlreadyHindered) => Ok(()),
                _ => Err(RitualError::Exit { code: 3 }),
            }
        }),
    );

    let incantation = circle.registry.build_incantation([Element::from("hinder-twice")]).unwrap();
    match invoke(&mut circle, &incantation, None) {
        Ok(()) => {}
        Err(RitualError::Process { fault: ProcessFault::Exited { code: UNSUPPORTED }, .. }) => {
            eprintln!("skipping: unprivileged user namespaces unavailable");
        }
        Err(other) => panic!("unexpected: {other}"),
    }
    assert!(!is_hindered(), "parent must stay outside the namespace");
}

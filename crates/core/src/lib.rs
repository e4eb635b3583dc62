//! ritual-core
//!
//! Core library of the hex provisioning tool.
//!
//! Rituals are named units of work registered in a [`rituals::Circle`];
//! incantations are ordered pipelines of them, resolved by name up front and
//! performed fail-fast. The remaining modules are the operations rituals are
//! built from: process spawning, the namespace sandbox, recursive tree
//! copy/remove and `@NAME@` template preprocessing.
//!
//! All substantive logic lives here so it is testable and reusable from
//! frontends other than the `hex` CLI.

pub mod config;
pub mod error;
pub mod fs;
pub mod hash;
pub mod logging;
pub mod process;
pub mod report;
pub mod rituals;
pub mod sandbox;
pub mod script;
pub mod template;

pub use error::{RitualError, RitualResult};

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

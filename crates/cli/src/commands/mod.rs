pub mod check;
pub mod rituals;
pub mod run;

pub use check::*;
pub use rituals::*;
pub use run::*;

use std::path::PathBuf;

use ritual_core::rituals::Circle;
use ritual_core::script::Script;
use ritual_core::RitualResult;

/// Load every script into `circle` without performing anything.
///
/// Each script's `perform` list is still built, so unknown names surface here.
pub fn install_scripts(circle: &mut Circle, paths: &[PathBuf]) -> RitualResult<Vec<Script>> {
    let mut scripts = Vec::with_capacity(paths.len());
    for path in paths {
        let script = Script::load(path)?;
        script.install(circle)?;
        scripts.push(script);
    }
    Ok(scripts)
}

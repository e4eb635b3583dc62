use std::path::PathBuf;

use ritual_core::rituals::{Circle, Element};
use ritual_core::script::Script;
use ritual_core::RitualResult;

/// Load and perform each script in order, then the `--perform` rituals.
///
/// A failing script aborts the run; later scripts are never loaded.
pub fn run_command(circle: &mut Circle, scripts: &[PathBuf], perform: &[String]) -> RitualResult<()> {
    for path in scripts {
        tracing::debug!(script = %path.display(), "loading script");
        let script = Script::load(path)?;
        let incantation = script.install(circle)?;
        incantation.perform(circle)?;
    }

    if !perform.is_empty() {
        circle.perform(perform.iter().cloned().map(Element::Name))?;
    }

    Ok(())
}

use std::path::PathBuf;

use ritual_core::rituals::{Circle, Element};
use ritual_core::script::check_references;
use ritual_core::RitualResult;

use crate::commands::install_scripts;

/// Load every script and resolve every ritual name they mention, without
/// performing anything.
pub fn check_command(circle: &mut Circle, scripts: &[PathBuf], perform: &[String]) -> RitualResult<()> {
    let loaded = install_scripts(circle, scripts)?;
    check_references(circle, &loaded)?;
    circle.registry.build_incantation(perform.iter().cloned().map(Element::Name))?;

    println!("Scripts OK:");
    for script in &loaded {
        println!("  - {} ({} ritual(s))", script.path.display(), script.rituals.len());
    }
    println!("Registered rituals: {}", circle.registry.len());

    Ok(())
}

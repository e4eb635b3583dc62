use std::path::PathBuf;

use anyhow::Result;
use ritual_core::rituals::Circle;
use serde::Serialize;

use crate::commands::install_scripts;

#[derive(Debug, Serialize)]
pub struct RitualInfo {
    pub name: String,
}

/// List the rituals registered by `scripts`, sorted by name.
pub fn list_rituals_command(circle: &mut Circle, scripts: &[PathBuf], json: bool) -> Result<()> {
    install_scripts(circle, scripts)?;
    let entries: Vec<RitualInfo> =
        circle.registry.names().into_iter().map(|name| RitualInfo { name }).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Rituals: (none)");
        return Ok(());
    }

    println!("Rituals:");
    for entry in entries {
        println!("  - {}", entry.name);
    }
    Ok(())
}

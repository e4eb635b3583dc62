//! YAML ritual scripts.
//!
//! A script declares variables, named rituals (lists of steps) and an ordered
//! `perform` list. Loading a script registers its rituals into a [`Circle`];
//! the `perform` list is then built into an incantation and run.
//!
//! ```yaml
//! variables: { PREFIX: /opt/app }
//! rituals:
//!   build:
//!     - cast: [make, -C, src]
//!   install:
//!     - copy: { from: src/out, to: "@PREFIX@" }
//! perform: [build, install]
//! ```

mod steps;

pub use steps::{
    Args, CharmStep, CopyStep, EnvStep, ExitName, ExitStatus, HashStep, HinderStep, InvokeStep,
    JoinStep, LogStep, MountStep, PathPartStep, PreprocessStep, PwdStep, Step,
};

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{RitualError, RitualResult};
use crate::rituals::{Circle, Element, Incantation, Ritual};

/// An incantation element as written in a script: a ritual name or an
/// anonymous inline list of steps.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ElementSpec {
    Name(String),
    Steps(Vec<Step>),
}

/// Parsed script file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Where the script was read from (empty for in-memory scripts).
    #[serde(skip)]
    pub path: PathBuf,
    /// Default variables; values already present in the circle win.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub rituals: BTreeMap<String, Vec<Step>>,
    #[serde(default)]
    pub perform: Vec<ElementSpec>,
}

impl Script {
    /// Parse script text; `path` is only used for error messages.
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> RitualResult<Self> {
        let path = path.into();
        let deserializer = serde_yaml::Deserializer::from_str(text);
        let mut script: Script = serde_yaml::with::singleton_map_recursive::deserialize(deserializer)
            .map_err(|e| RitualError::Script { path: path.clone(), message: e.to_string() })?;
        script.path = path;
        Ok(script)
    }

    /// Read and parse the script at `path`.
    pub fn load(path: &Path) -> RitualResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| RitualError::io("load", "read", path, e))?;
        Self::parse(path, &text)
    }

    /// Register this script's rituals and default variables into `circle`,
    /// then build (without performing) its `perform` list.
    pub fn install(&self, circle: &mut Circle) -> RitualResult<Incantation> {
        for (name, value) in &self.variables {
            circle.variables.entry(name.clone()).or_insert_with(|| value.clone());
        }
        for (name, steps) in &self.rituals {
            circle.registry.register(name.clone(), ritual_from_steps(steps.clone()));
        }
        tracing::debug!(
            script = %self.path.display(),
            rituals = self.rituals.len(),
            "installed script"
        );
        Ok(circle.registry.build_incantation(elements(&self.perform))?)
    }

    /// Every ritual name this script refers to, anywhere in its steps.
    pub fn referenced_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        collect_names(&self.perform, &mut names);
        for steps in self.rituals.values() {
            for step in steps {
                step.collect_names(&mut names);
            }
        }
        names
    }
}

/// Load the script at `path` into `circle` and perform its `perform` list.
pub fn run_script(circle: &mut Circle, path: &Path) -> RitualResult<()> {
    let script = Script::load(path)?;
    let incantation = script.install(circle)?;
    incantation.perform(circle)
}

/// Verify that every name referenced by `scripts` resolves in `circle`.
///
/// Nested `incantation`/`invoke` lists are only resolved when they run, so
/// this is the one place they can be validated up front.
pub fn check_references(circle: &Circle, scripts: &[Script]) -> RitualResult<()> {
    for script in scripts {
        if let Some(name) =
            script.referenced_names().into_iter().find(|name| !circle.registry.contains(name))
        {
            return Err(RitualError::Script {
                path: script.path.clone(),
                message: format!("references unknown ritual '{name}'"),
            });
        }
    }
    Ok(())
}

/// Wrap a step list into a callable ritual.
pub fn ritual_from_steps(steps: Vec<Step>) -> Ritual {
    Ritual::new(move |circle| {
        for step in &steps {
            step.execute(circle)?;
        }
        Ok(())
    })
}

/// Convert script element specs into registry elements.
pub fn elements(specs: &[ElementSpec]) -> Vec<Element> {
    specs
        .iter()
        .map(|spec| match spec {
            ElementSpec::Name(name) => Element::Name(name.clone()),
            ElementSpec::Steps(steps) => Element::Callable(ritual_from_steps(steps.clone())),
        })
        .collect()
}

fn collect_names(specs: &[ElementSpec], names: &mut BTreeSet<String>) {
    for spec in specs {
        match spec {
            ElementSpec::Name(name) => {
                names.insert(name.clone());
            }
            ElementSpec::Steps(steps) => {
                for step in steps {
                    step.collect_names(names);
                }
            }
        }
    }
}

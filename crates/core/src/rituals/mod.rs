//! Rituals and incantations: named units of work and the ordered pipelines
//! built from them.
//!
//! Building an incantation only performs name lookups; performing it is where
//! side effects happen. Callers can therefore validate a whole pipeline before
//! running any part of it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::error::{ResolutionError, RitualResult};
use crate::report::{NoReport, Report};

/// Signature of a ritual body.
///
/// Script-level rituals take no arguments; the Rust closure receives the
/// [`Circle`] it runs in so it can reach the registry, variables and report.
pub type RitualFn = dyn Fn(&mut Circle) -> RitualResult<()>;

/// Cheaply clonable handle to a callable unit of work.
#[derive(Clone)]
pub struct Ritual {
    body: Rc<RitualFn>,
}

impl Ritual {
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&mut Circle) -> RitualResult<()> + 'static,
    {
        Self { body: Rc::new(body) }
    }

    pub fn call(&self, circle: &mut Circle) -> RitualResult<()> {
        (self.body)(circle)
    }
}

impl fmt::Debug for Ritual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ritual").finish_non_exhaustive()
    }
}

/// Name → ritual mapping shared across every script loaded into a circle.
#[derive(Default, Debug, Clone)]
pub struct RitualRegistry {
    rituals: HashMap<String, Ritual>,
}

impl RitualRegistry {
    pub fn new() -> Self {
        Self { rituals: HashMap::new() }
    }

    /// Insert or overwrite the ritual bound to `name`.
    pub fn register(&mut self, name: impl Into<String>, ritual: Ritual) -> &mut Self {
        self.rituals.insert(name.into(), ritual);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Ritual> {
        self.rituals.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rituals.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.rituals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rituals.is_empty()
    }

    /// Return a sorted list of registered ritual names for listings/errors.
    pub fn names(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.rituals.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Resolve `elements` into an incantation.
    ///
    /// Names are looked up in order; the first unknown name fails the whole
    /// build and nothing is returned. Callables are taken verbatim.
    pub fn build_incantation(
        &self,
        elements: impl IntoIterator<Item = Element>,
    ) -> Result<Incantation, ResolutionError> {
        let elements = elements.into_iter();
        let mut steps = Vec::with_capacity(elements.size_hint().0);

        for (index, element) in elements.enumerate() {
            let step = match element {
                Element::Name(name) => match self.rituals.get(&name) {
                    Some(ritual) => Invocation { name: Some(name), ritual: ritual.clone() },
                    None => return Err(ResolutionError { index, name }),
                },
                Element::Callable(ritual) => Invocation { name: None, ritual },
            };
            steps.push(step);
        }

        Ok(Incantation { steps })
    }
}

/// One input element of an incantation: a registered name or a callable.
#[derive(Debug, Clone)]
pub enum Element {
    Name(String),
    Callable(Ritual),
}

impl From<&str> for Element {
    fn from(name: &str) -> Self {
        Element::Name(name.to_string())
    }
}

impl From<String> for Element {
    fn from(name: String) -> Self {
        Element::Name(name)
    }
}

impl From<Ritual> for Element {
    fn from(ritual: Ritual) -> Self {
        Element::Callable(ritual)
    }
}

/// A resolved incantation element.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Name the element was resolved from; `None` for anonymous callables.
    pub name: Option<String>,
    pub ritual: Ritual,
}

/// Ordered, fully resolved sequence of rituals.
#[derive(Debug, Clone, Default)]
pub struct Incantation {
    steps: Vec<Invocation>,
}

impl Incantation {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Invocation] {
        &self.steps
    }

    /// Names of the elements in execution order (`None` for anonymous ones).
    pub fn names(&self) -> Vec<Option<&str>> {
        self.steps.iter().map(|s| s.name.as_deref()).collect()
    }

    /// Run every element in order, stopping at the first fault.
    ///
    /// Completed elements are not undone when a later one fails.
    pub fn perform(&self, circle: &mut Circle) -> RitualResult<()> {
        for step in &self.steps {
            circle.report().incantation(step.name.as_deref());
            step.ritual.call(circle)?;
        }
        Ok(())
    }
}

/// Execution context every ritual runs in.
///
/// Owns the registry, the variable dictionary used by templating and argument
/// expansion, and the report receiving lifecycle events. Nothing here is
/// global; independent circles never observe each other.
pub struct Circle {
    pub registry: RitualRegistry,
    pub variables: BTreeMap<String, String>,
    report: Box<dyn Report>,
}

impl Circle {
    pub fn new(report: Box<dyn Report>) -> Self {
        Self { registry: RitualRegistry::new(), variables: BTreeMap::new(), report }
    }

    pub fn report(&self) -> &dyn Report {
        self.report.as_ref()
    }

    pub fn set_report(&mut self, report: Box<dyn Report>) {
        self.report = report;
    }

    /// Build `elements` against this circle's registry and perform them.
    pub fn perform(&mut self, elements: impl IntoIterator<Item = Element>) -> RitualResult<()> {
        let incantation = self.registry.build_incantation(elements)?;
        incantation.perform(self)
    }
}

impl Default for Circle {
    fn default() -> Self {
        Self::new(Box::new(NoReport))
    }
}

impl fmt::Debug for Circle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Circle")
            .field("registry", &self.registry)
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}

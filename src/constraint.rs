//! Constraints gating eager construction.
//!
//! A definition carries an ordered list of [`Marker`]s. During the eager
//! pass each marker is looked up in the tree's [`ConstraintRegistry`] and
//! its [`Constraint`] decides whether the definition may be built now. The
//! first failing marker excludes the definition from the pass; it stays
//! lazily resolvable.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::definition::ComponentDefinition;

/// Reference from a definition to a registered constraint, with arguments.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Marker {
    name: Arc<str>,
    args: BTreeMap<String, String>,
}

impl Marker {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            args: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }

    pub fn args(&self) -> impl Iterator<Item = (&str, &str)> {
        self.args.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Debug for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "@{}", self.name)
        } else {
            write!(f, "@{}{:?}", self.name, self.args)
        }
    }
}

/// Predicate deciding whether a definition may be eagerly constructed.
///
/// Implementations must not mutate shared state; the same marker and
/// definition must always produce the same answer within one pass.
pub trait Constraint: Send + Sync {
    fn matches(&self, marker: &Marker, definition: &ComponentDefinition) -> bool;
}

struct FnConstraint<F>(F);

impl<F> Constraint for FnConstraint<F>
where
    F: Fn(&Marker, &ComponentDefinition) -> bool + Send + Sync,
{
    fn matches(&self, marker: &Marker, definition: &ComponentDefinition) -> bool {
        (self.0)(marker, definition)
    }
}

/// Adapts a closure into a [`Constraint`].
///
/// ```rust
/// use ferrous_context::{constraint_fn, ComponentDefinition, Constraint, Marker};
///
/// let feature_on = constraint_fn(|marker, _| marker.get("enabled") == Some("true"));
/// let definition = ComponentDefinition::builder::<String>().build();
///
/// assert!(feature_on.matches(&Marker::new("feature").arg("enabled", "true"), &definition));
/// assert!(!feature_on.matches(&Marker::new("feature"), &definition));
/// ```
pub fn constraint_fn<F>(predicate: F) -> Arc<dyn Constraint>
where
    F: Fn(&Marker, &ComponentDefinition) -> bool + Send + Sync + 'static,
{
    Arc::new(FnConstraint(predicate))
}

/// Outcome of evaluating a definition's constraint chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// The marker whose constraint rejected the definition
    Rejected(Marker),
    /// The marker has no registered constraint
    Unregistered(Marker),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Marker name to constraint lookup.
#[derive(Clone, Default)]
pub struct ConstraintRegistry {
    constraints: BTreeMap<String, Arc<dyn Constraint>>,
}

impl ConstraintRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `constraint` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, constraint: Arc<dyn Constraint>) {
        self.constraints.insert(name.into(), constraint);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Constraint>> {
        self.constraints.get(name)
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Runs the constraint chain of `definition` in declared order,
    /// stopping at the first failure.
    pub fn evaluate(&self, definition: &ComponentDefinition) -> Verdict {
        for marker in definition.constraints() {
            match self.constraints.get(marker.name()) {
                Some(constraint) => {
                    if !constraint.matches(marker, definition) {
                        return Verdict::Rejected(marker.clone());
                    }
                }
                None => {
                    tracing::warn!(
                        marker = marker.name(),
                        component = %definition.display_name(),
                        "no constraint registered for marker"
                    );
                    return Verdict::Unregistered(marker.clone());
                }
            }
        }
        Verdict::Pass
    }
}

impl fmt::Debug for ConstraintRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.constraints.keys()).finish()
    }
}

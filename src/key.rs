//! Capability tokens, qualifiers and binding keys.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::internal::FastMap;

/// Opaque identity token for a capability (the contract a component fulfils).
///
/// Capabilities are compared by `TypeId` only; the name is kept for
/// diagnostics. Trait objects work as capabilities, which is the common case:
///
/// ```rust
/// use ferrous_context::Capability;
///
/// trait Logger: Send + Sync {}
///
/// let a = Capability::of::<dyn Logger>();
/// let b = Capability::of::<dyn Logger>();
/// assert_eq!(a, b);
/// assert!(a.name().contains("Logger"));
/// assert_ne!(a, Capability::of::<String>());
/// ```
#[derive(Clone, Copy)]
pub struct Capability {
    id: TypeId,
    name: &'static str,
}

impl Capability {
    /// Token for the capability `T`.
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Full type name of the capability.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name (`dyn app::Logger` -> `Logger`).
    pub fn short_name(&self) -> &'static str {
        let trimmed = self.name.trim_start_matches("dyn ");
        let base = trimmed.split('<').next().unwrap_or(trimmed);
        base.rsplit("::").next().unwrap_or(base)
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.id
    }
}

impl PartialEq for Capability {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Capability {}

impl Hash for Capability {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability({})", self.name)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// String discriminator between several bindings of one capability.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Qualifier(Arc<str>);

impl Qualifier {
    pub fn new(value: impl AsRef<str>) -> Self {
        Qualifier(Arc::from(value.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Qualifier {
    fn from(value: &str) -> Self {
        Qualifier::new(value)
    }
}

impl From<String> for Qualifier {
    fn from(value: String) -> Self {
        Qualifier(Arc::from(value))
    }
}

impl AsRef<str> for Qualifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a binding table: capability plus qualifier.
///
/// ```rust
/// use ferrous_context::{BindingKey, Capability, Qualifier};
///
/// let key = BindingKey::new(Capability::of::<u32>(), "port");
/// assert_eq!(key.qualifier().as_str(), "port");
/// assert_eq!(key, BindingKey::new(Capability::of::<u32>(), Qualifier::new("port")));
/// assert_ne!(key, BindingKey::new(Capability::of::<u32>(), "timeout"));
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
    capability: Capability,
    qualifier: Qualifier,
}

impl BindingKey {
    pub fn new(capability: Capability, qualifier: impl Into<Qualifier>) -> Self {
        Self {
            capability,
            qualifier: qualifier.into(),
        }
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn qualifier(&self) -> &Qualifier {
        &self.qualifier
    }

    /// Human-readable form used in errors and logs.
    pub fn display_name(&self) -> String {
        format!("{}[{}]", self.capability.name, self.qualifier)
    }
}

impl fmt::Debug for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.capability.name, self.qualifier)
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.capability.name, self.qualifier)
    }
}

/// Pure function that derives the default qualifier of a capability.
///
/// The same capability must always yield the same qualifier. Distinct
/// capabilities should yield distinct qualifiers; collisions are reported
/// by [`CapabilityRegistry`] but never rejected.
#[derive(Clone)]
pub struct DefaultQualifier {
    strategy: Arc<dyn Fn(&Capability) -> Qualifier + Send + Sync>,
}

impl DefaultQualifier {
    /// Uses the full type name of the capability.
    pub fn type_name() -> Self {
        Self::from_fn(|capability| Qualifier::new(capability.name()))
    }

    /// Uses the last path segment of the type name. Shorter, but two
    /// capabilities named alike in different modules collide.
    pub fn short_name() -> Self {
        Self::from_fn(|capability| Qualifier::new(capability.short_name()))
    }

    pub fn from_fn<F>(strategy: F) -> Self
    where
        F: Fn(&Capability) -> Qualifier + Send + Sync + 'static,
    {
        Self {
            strategy: Arc::new(strategy),
        }
    }

    #[inline]
    pub fn qualifier_for(&self, capability: &Capability) -> Qualifier {
        (self.strategy)(capability)
    }
}

impl Default for DefaultQualifier {
    fn default() -> Self {
        Self::type_name()
    }
}

impl fmt::Debug for DefaultQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DefaultQualifier(..)")
    }
}

/// Registry of every capability bound anywhere in a tree.
///
/// Membership is explicit: a capability is known once something was bound
/// for it. The registry also notices default-qualifier collisions.
#[derive(Default)]
pub struct CapabilityRegistry {
    inner: RwLock<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    by_capability: FastMap<Capability, Qualifier>,
    by_qualifier: FastMap<Qualifier, Capability>,
    collisions: usize,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `capability` and its default qualifier. Returns the capability
    /// that already owned the qualifier when it collides.
    pub fn register(&self, capability: Capability, default: &Qualifier) -> Option<Capability> {
        if self.inner.read().by_capability.contains_key(&capability) {
            return None;
        }

        let mut state = self.inner.write();
        if state.by_capability.contains_key(&capability) {
            return None;
        }
        state.by_capability.insert(capability, default.clone());
        match state.by_qualifier.get(default).copied() {
            Some(existing) if existing != capability => {
                state.collisions += 1;
                tracing::warn!(
                    qualifier = %default,
                    first = existing.name(),
                    second = capability.name(),
                    "default qualifier collision"
                );
                Some(existing)
            }
            _ => {
                state.by_qualifier.insert(default.clone(), capability);
                None
            }
        }
    }

    pub fn is_registered(&self, capability: &Capability) -> bool {
        self.inner.read().by_capability.contains_key(capability)
    }

    pub fn default_qualifier(&self, capability: &Capability) -> Option<Qualifier> {
        self.inner.read().by_capability.get(capability).cloned()
    }

    /// Number of collisions seen so far.
    pub fn collisions(&self) -> usize {
        self.inner.read().collisions
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_capability.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter {}

    mod other {
        pub trait Greeter {}
    }

    #[test]
    fn short_name_strips_path_and_dyn() {
        assert_eq!(Capability::of::<dyn Greeter>().short_name(), "Greeter");
        assert_eq!(Capability::of::<Vec<u8>>().short_name(), "Vec");
    }

    #[test]
    fn default_strategy_is_deterministic() {
        let strategy = DefaultQualifier::default();
        let cap = Capability::of::<dyn Greeter>();
        assert_eq!(strategy.qualifier_for(&cap), strategy.qualifier_for(&cap));
        assert_ne!(
            strategy.qualifier_for(&cap),
            strategy.qualifier_for(&Capability::of::<dyn other::Greeter>())
        );
    }

    #[test]
    fn registry_reports_collisions_without_rejecting() {
        let registry = CapabilityRegistry::new();
        let strategy = DefaultQualifier::short_name();
        let first = Capability::of::<dyn Greeter>();
        let second = Capability::of::<dyn other::Greeter>();

        assert_eq!(registry.register(first, &strategy.qualifier_for(&first)), None);
        assert_eq!(registry.register(second, &strategy.qualifier_for(&second)), Some(first));
        assert_eq!(registry.collisions(), 1);
        assert!(registry.is_registered(&second));
        assert_eq!(registry.len(), 2);

        // Registering again is a no-op.
        assert_eq!(registry.register(second, &strategy.qualifier_for(&second)), None);
        assert_eq!(registry.collisions(), 1);
    }
}

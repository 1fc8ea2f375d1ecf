//! Resolver traits for instance lookup.

use std::sync::Arc;

use crate::definition::{downcast, AnyArc, Dependency};
use crate::error::{DiError, DiResult};
use crate::key::{BindingKey, Capability, Qualifier};

/// Object-safe resolution core.
///
/// `resolve_any` answers "give me an instance for this key" along the whole
/// scope chain. An empty result means nothing reachable is bound; an error
/// means something was found but could not be built.
pub trait ResolverCore: Send + Sync {
    /// Resolves one key to an erased instance.
    fn resolve_any(&self, key: &BindingKey) -> DiResult<Option<AnyArc>>;

    /// Default qualifier for `capability` under this resolver's strategy.
    fn default_qualifier(&self, capability: &Capability) -> Qualifier;

    /// Key a declared dependency refers to.
    fn key_for(&self, dependency: &Dependency) -> BindingKey {
        let capability = dependency.capability();
        let qualifier = match dependency.explicit_qualifier() {
            Some(q) => q.clone(),
            None => self.default_qualifier(&capability),
        };
        BindingKey::new(capability, qualifier)
    }
}

/// Typed lookups built on [`ResolverCore`].
///
/// # Examples
///
/// ```
/// use ferrous_context::{Context, Implementation, Resolver};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn name(&self) -> &'static str;
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn name(&self) -> &'static str { "console" }
/// }
///
/// let root = Context::root();
/// root.bind::<dyn Logger>(Implementation::from_fn(|_| Ok(Arc::new(ConsoleLogger) as Arc<dyn Logger>)));
///
/// let logger = root.get_required::<dyn Logger>().unwrap();
/// assert_eq!(logger.name(), "console");
/// assert!(root.get::<String>().unwrap().is_none());
/// ```
pub trait Resolver: ResolverCore {
    /// Key of `T` under its default qualifier.
    fn key_of<T: ?Sized + 'static>(&self) -> BindingKey {
        let capability = Capability::of::<T>();
        BindingKey::new(capability, self.default_qualifier(&capability))
    }

    /// Instance of `T`, or `None` when nothing reachable is bound.
    fn get<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        let key = self.key_of::<T>();
        typed::<T>(self.resolve_any(&key)?)
    }

    fn get_qualified<T: ?Sized + Send + Sync + 'static>(
        &self,
        qualifier: impl Into<Qualifier>,
    ) -> DiResult<Option<Arc<T>>> {
        let key = BindingKey::new(Capability::of::<T>(), qualifier);
        typed::<T>(self.resolve_any(&key)?)
    }

    /// Instance of `T`, failing with [`DiError::NotFound`] when unbound.
    fn get_required<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let key = self.key_of::<T>();
        typed::<T>(self.resolve_any(&key)?)?.ok_or_else(|| DiError::NotFound(key.display_name()))
    }

    fn get_required_qualified<T: ?Sized + Send + Sync + 'static>(
        &self,
        qualifier: impl Into<Qualifier>,
    ) -> DiResult<Arc<T>> {
        let key = BindingKey::new(Capability::of::<T>(), qualifier);
        typed::<T>(self.resolve_any(&key)?)?.ok_or_else(|| DiError::NotFound(key.display_name()))
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}

fn typed<T: ?Sized + Send + Sync + 'static>(value: Option<AnyArc>) -> DiResult<Option<Arc<T>>> {
    match value {
        Some(any) => downcast::<T>(&any)
            .map(Some)
            .ok_or(DiError::TypeMismatch(std::any::type_name::<T>())),
        None => Ok(None),
    }
}

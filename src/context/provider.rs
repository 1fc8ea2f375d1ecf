use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::definition::{downcast, ComponentDefinition, Factory};
use crate::error::{DiError, DiResult};
use crate::graph::ComponentNode;
use crate::key::BindingKey;

/// Handle that produces instances of one located binding on demand.
///
/// Every `get` goes through the owning scope, so lifecycle flags still
/// apply: a singleton provider keeps returning the same instance, a
/// transient one builds a new instance per call.
///
/// ```rust
/// use ferrous_context::{Context, Implementation};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// let counter = Arc::new(AtomicU32::new(0));
/// let seen = counter.clone();
///
/// let root = Context::root();
/// root.bind::<u32>(Implementation::from_fn(move |_| Ok(Arc::new(seen.fetch_add(1, Ordering::SeqCst)))));
///
/// let provider = root.get_factory::<u32>().unwrap();
/// assert_eq!(*provider.get().unwrap(), 0);
/// assert_eq!(*provider.get().unwrap(), 1);
/// ```
pub struct Provider<T: ?Sized> {
    node: Arc<ComponentNode>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Provider<T> {
    pub(crate) fn new(node: Arc<ComponentNode>) -> Self {
        Self {
            node,
            _marker: PhantomData,
        }
    }

    pub fn get(&self) -> DiResult<Arc<T>> {
        let owner = self
            .node
            .owner()
            .ok_or_else(|| DiError::ScopeDropped(self.node.key().display_name()))?;
        let value = owner.instance_for(&self.node)?;
        downcast::<T>(&value).ok_or(DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    pub fn key(&self) -> &BindingKey {
        self.node.key()
    }

    pub fn definition(&self) -> &ComponentDefinition {
        self.node.definition()
    }

    /// False once the owning scope is gone.
    pub fn is_available(&self) -> bool {
        self.node.owner().is_some()
    }
}

impl<T: ?Sized> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> Factory<T> for Provider<T> {
    fn produce(&self) -> DiResult<Arc<T>> {
        self.get()
    }
}

impl<T: ?Sized> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Provider({})", self.node.key())
    }
}

//! Teardown trait for retained instances.

/// Trait for synchronous teardown of retained instances.
///
/// Implement this for components that must release resources (flush a
/// buffer, close a connection) when their scope removes them. Register it on
/// a definition with `disposable()`; the hook runs exactly once per retained
/// instance, whether the instance is removed explicitly, replaced by a
/// rebind, cleared with its scope, or dropped with the last scope handle.
///
/// # Examples
///
/// ```
/// use ferrous_context::{ComponentDefinition, Context, Dispose, Implementation, Resolver};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Cache {
///     flushed: AtomicBool,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) {
///         self.flushed.store(true, Ordering::SeqCst);
///     }
/// }
///
/// let root = Context::root();
/// root.bind_definition(
///     ComponentDefinition::builder::<Cache>()
///         .implementation(Implementation::from_fn(|_| Ok(Arc::new(Cache { flushed: AtomicBool::new(false) }))))
///         .singleton()
///         .disposable()
///         .build(),
/// );
///
/// let cache = root.get_required::<Cache>().unwrap();
/// root.clear();
/// assert!(cache.flushed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self);
}

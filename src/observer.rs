//! Observation hooks for resolution events.
//!
//! Observers are registered on the root settings and shared by the whole
//! tree. They are called synchronously on the resolving thread, so keep
//! them cheap.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::key::BindingKey;

/// Observer of construction and teardown events.
///
/// # Examples
///
/// ```
/// use ferrous_context::{BindingKey, Context, ContextObserver, ContextSettings, Implementation};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Counting(AtomicUsize);
///
/// impl ContextObserver for Counting {
///     fn resolving(&self, _key: &BindingKey) {}
///
///     fn resolved(&self, _key: &BindingKey, _duration: Duration) {
///         self.0.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// let counting = Arc::new(Counting::default());
/// let root = Context::with_settings(ContextSettings::new().observer(counting.clone()));
/// root.bind::<u32>(Implementation::from_fn(|_| Ok(Arc::new(7))));
///
/// use ferrous_context::Resolver;
/// root.get_required::<u32>().unwrap();
/// assert_eq!(counting.0.load(Ordering::SeqCst), 1);
/// ```
pub trait ContextObserver: Send + Sync {
    /// An instance is about to be built.
    fn resolving(&self, key: &BindingKey);

    /// An instance was built.
    fn resolved(&self, key: &BindingKey, duration: Duration);

    fn construction_failed(&self, key: &BindingKey, error: &DiError) {
        let _ = (key, error);
    }

    /// A retained instance left its scope.
    fn torn_down(&self, key: &BindingKey) {
        let _ = key;
    }
}

#[derive(Clone, Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ContextObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn ContextObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolving(&self, key: &BindingKey) {
        for observer in &self.observers {
            observer.resolving(key);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, key: &BindingKey, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(key, duration);
        }
    }

    pub(crate) fn construction_failed(&self, key: &BindingKey, error: &DiError) {
        for observer in &self.observers {
            observer.construction_failed(key, error);
        }
    }

    pub(crate) fn torn_down(&self, key: &BindingKey) {
        for observer in &self.observers {
            observer.torn_down(key);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }
}

/// Observer forwarding every event to `tracing`.
///
/// ```
/// use ferrous_context::{Context, ContextSettings, LoggingObserver};
/// use std::sync::Arc;
///
/// let root = Context::with_settings(ContextSettings::new().observer(Arc::new(LoggingObserver::new())));
/// # drop(root);
/// ```
pub struct LoggingObserver {
    target: &'static str,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self { target: "ferrous-context" }
    }

    /// Uses `target` as the `scope` field of every event.
    pub fn with_target(target: &'static str) -> Self {
        Self { target }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextObserver for LoggingObserver {
    fn resolving(&self, key: &BindingKey) {
        tracing::trace!(scope = self.target, key = %key, "resolving");
    }

    fn resolved(&self, key: &BindingKey, duration: Duration) {
        tracing::debug!(scope = self.target, key = %key, ?duration, "resolved");
    }

    fn construction_failed(&self, key: &BindingKey, error: &DiError) {
        tracing::warn!(scope = self.target, key = %key, %error, "construction failed");
    }

    fn torn_down(&self, key: &BindingKey) {
        tracing::debug!(scope = self.target, key = %key, "torn down");
    }
}

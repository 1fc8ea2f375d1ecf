//! Tree-wide configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{DEFAULT_CAPACITY, DEFAULT_CONCURRENCY_LEVEL, DEFAULT_IDLE};
use crate::constraint::{Constraint, ConstraintRegistry};
use crate::key::DefaultQualifier;
use crate::observer::{ContextObserver, Observers};

/// Default limit on nested constructions before resolution gives up.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Settings shared by every scope of one tree, fixed when the root is built.
///
/// ```rust
/// use ferrous_context::{constraint_fn, Context, ContextSettings, DefaultQualifier};
/// use std::time::Duration;
///
/// let settings = ContextSettings::new()
///     .cache_capacity(256)
///     .cache_idle(Duration::from_secs(30))
///     .concurrency_level(8)
///     .default_qualifier(DefaultQualifier::short_name())
///     .constraint("always", constraint_fn(|_, _| true));
///
/// assert_eq!(settings.capacity(), 256);
/// let root = Context::with_settings(settings);
/// assert!(root.parent().is_none());
/// ```
#[derive(Clone)]
pub struct ContextSettings {
    pub(crate) cache_capacity: usize,
    pub(crate) cache_idle: Duration,
    pub(crate) concurrency_level: usize,
    pub(crate) default_qualifier: DefaultQualifier,
    pub(crate) constraints: ConstraintRegistry,
    pub(crate) observers: Observers,
    pub(crate) max_depth: usize,
}

impl ContextSettings {
    pub fn new() -> Self {
        Self {
            cache_capacity: DEFAULT_CAPACITY,
            cache_idle: DEFAULT_IDLE,
            concurrency_level: DEFAULT_CONCURRENCY_LEVEL,
            default_qualifier: DefaultQualifier::default(),
            constraints: ConstraintRegistry::new(),
            observers: Observers::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Maximum number of cached broadcast results.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity.max(1);
        self
    }

    /// Entries not read within `idle` are dropped.
    pub fn cache_idle(mut self, idle: Duration) -> Self {
        self.cache_idle = idle;
        self
    }

    /// Number of cache shards that may compute in parallel.
    pub fn concurrency_level(mut self, level: usize) -> Self {
        self.concurrency_level = level.max(1);
        self
    }

    pub fn default_qualifier(mut self, strategy: DefaultQualifier) -> Self {
        self.default_qualifier = strategy;
        self
    }

    /// Registers the constraint evaluated for markers named `name`.
    pub fn constraint(mut self, name: impl Into<String>, constraint: Arc<dyn Constraint>) -> Self {
        self.constraints.register(name, constraint);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ContextObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn capacity(&self) -> usize {
        self.cache_capacity
    }

    pub fn idle(&self) -> Duration {
        self.cache_idle
    }

    pub fn level(&self) -> usize {
        self.concurrency_level
    }

    pub fn depth_limit(&self) -> usize {
        self.max_depth
    }

    pub fn constraints(&self) -> &ConstraintRegistry {
        &self.constraints
    }

    /// Applies a deserialized cache section.
    #[cfg(feature = "config")]
    pub fn cache(self, cache: CacheSettings) -> Self {
        self.cache_capacity(cache.capacity)
            .cache_idle(Duration::from_secs(cache.idle_secs))
            .concurrency_level(cache.concurrency_level)
    }
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContextSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextSettings")
            .field("cache_capacity", &self.cache_capacity)
            .field("cache_idle", &self.cache_idle)
            .field("concurrency_level", &self.concurrency_level)
            .field("constraints", &self.constraints)
            .field("observers", &self.observers.len())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

/// Cache section loadable from JSON.
///
/// ```rust
/// use ferrous_context::{CacheSettings, ContextSettings};
///
/// let cache = CacheSettings::from_json(r#"{ "capacity": 512, "idle_secs": 5 }"#).unwrap();
/// assert_eq!(cache.concurrency_level, 4);
///
/// let settings = ContextSettings::new().cache(cache);
/// assert_eq!(settings.capacity(), 512);
/// ```
#[cfg(feature = "config")]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub capacity: usize,
    pub idle_secs: u64,
    pub concurrency_level: usize,
}

#[cfg(feature = "config")]
impl CacheSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(feature = "config")]
impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            idle_secs: DEFAULT_IDLE.as_secs(),
            concurrency_level: DEFAULT_CONCURRENCY_LEVEL,
        }
    }
}

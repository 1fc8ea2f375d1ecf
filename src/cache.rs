//! Bounded, idle-expiring, compute-once resolution cache.
//!
//! The cache is split into `concurrency_level` shards, each an LRU map
//! behind its own mutex. A shard lock is only held to find or insert a slot;
//! the computation itself runs outside it, on the slot's `OnceCell`, so
//! distinct keys compute in parallel while identical in-flight keys
//! collapse into one computation.

use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::internal::FastState;

pub const DEFAULT_CAPACITY: usize = 128;
pub const DEFAULT_IDLE: Duration = Duration::from_secs(60);
pub const DEFAULT_CONCURRENCY_LEVEL: usize = 4;

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// Computations that panicked and were discarded
    pub failures: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    failures: AtomicU64,
}

struct Entry<V> {
    slot: Arc<OnceCell<V>>,
    touched: Instant,
}

/// Sharded LRU cache with per-key compute-once semantics.
///
/// ```rust
/// use ferrous_context::ResolutionCache;
/// use std::time::Duration;
///
/// let cache: ResolutionCache<&str, u32> = ResolutionCache::new(8, Duration::from_secs(60), 2);
/// assert_eq!(cache.get_or_compute("answer", || 42), Some(42));
/// assert_eq!(cache.get_or_compute("answer", || 0), Some(42));
///
/// let stats = cache.stats();
/// assert_eq!((stats.hits, stats.misses), (1, 1));
/// ```
pub struct ResolutionCache<K, V> {
    shards: Box<[Mutex<LruCache<K, Entry<V>>>]>,
    idle: Duration,
    hasher: FastState,
    counters: Counters,
}

impl<K, V> ResolutionCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates a cache holding at most `capacity` entries (rounded up to a
    /// multiple of the shard count) that drops entries not read for `idle`.
    pub fn new(capacity: usize, idle: Duration, concurrency_level: usize) -> Self {
        let shard_count = concurrency_level.max(1);
        let per_shard = NonZeroUsize::new(capacity.max(1).div_ceil(shard_count)).unwrap_or(NonZeroUsize::MIN);
        let shards = (0..shard_count)
            .map(|_| Mutex::new(LruCache::new(per_shard)))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            shards,
            idle,
            hasher: FastState::default(),
            counters: Counters::default(),
        }
    }

    fn shard(&self, key: &K) -> &Mutex<LruCache<K, Entry<V>>> {
        let index = (self.hasher.hash_one(key) as usize) % self.shards.len();
        &self.shards[index]
    }

    /// Returns the cached value for `key`, computing it at most once across
    /// concurrent callers when absent or expired.
    ///
    /// A panicking computation is not cached: the slot is discarded and
    /// `None` is returned.
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> Option<V>
    where
        F: FnOnce() -> V,
    {
        let slot = self.slot_for(&key);

        let mut computed = false;
        let result = slot.get_or_try_init(|| {
            computed = true;
            panic::catch_unwind(AssertUnwindSafe(compute)).map_err(|payload| panic_message(&*payload))
        });

        match result {
            Ok(value) => {
                let counter = if computed { &self.counters.misses } else { &self.counters.hits };
                counter.fetch_add(1, Ordering::Relaxed);
                Some(value.clone())
            }
            Err(message) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(panic = %message, "resolution computation failed; treating as a miss");
                let mut shard = self.shard(&key).lock();
                if shard.peek(&key).is_some_and(|entry| Arc::ptr_eq(&entry.slot, &slot)) {
                    shard.pop(&key);
                }
                None
            }
        }
    }

    fn slot_for(&self, key: &K) -> Arc<OnceCell<V>> {
        let mut shard = self.shard(key).lock();
        let now = Instant::now();

        if let Some(entry) = shard.get_mut(key) {
            if now.duration_since(entry.touched) <= self.idle {
                entry.touched = now;
                return entry.slot.clone();
            }
            shard.pop(key);
            self.counters.expirations.fetch_add(1, Ordering::Relaxed);
        }

        let slot = Arc::new(OnceCell::new());
        let entry = Entry { slot: slot.clone(), touched: now };
        if shard.push(key.clone(), entry).is_some() {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        }
        slot
    }

    /// Drops one entry.
    pub fn invalidate(&self, key: &K) {
        self.shard(key).lock().pop(key);
    }

    /// Drops every entry.
    pub fn purge(&self) {
        for shard in self.shards.iter() {
            shard.lock().clear();
        }
    }

    /// Number of entries, including in-flight and expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().cap().get()).sum()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

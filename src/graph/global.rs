use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;

use crate::cache::{CacheStats, ResolutionCache};
use crate::graph::{ComponentNode, LocalNode, Matcher, MatcherKey, NodeId};

#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    executor: NodeId,
    matcher: MatcherKey,
    generation: u64,
}

type Cached = Option<Weak<ComponentNode>>;

/// Root of the graph: knows every scope's local node and caches broadcasts.
///
/// Children are kept weakly and in registration order, which is also the
/// broadcast order. Cache entries are keyed by executor, matcher identity
/// and the tree generation, so any binding change makes older entries
/// unreachable.
pub struct GlobalNode {
    id: NodeId,
    children: RwLock<Vec<(NodeId, Weak<LocalNode>)>>,
    generation: AtomicU64,
    cache: ResolutionCache<CacheKey, Cached>,
}

impl GlobalNode {
    pub fn new(capacity: usize, idle: Duration, concurrency_level: usize) -> Self {
        Self {
            id: NodeId::next(),
            children: RwLock::new(Vec::new()),
            generation: AtomicU64::new(0),
            cache: ResolutionCache::new(capacity, idle, concurrency_level),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Adds `child` to the broadcast. An empty scope cannot change any
    /// cached answer, so only a populated one moves the generation.
    pub fn register(&self, child: &Arc<LocalNode>) {
        self.children.write().push((child.id(), Arc::downgrade(child)));
        if !child.is_empty() {
            self.bump_generation();
        }
    }

    /// Forgets `child`. Cached answers stay; when `child` still held
    /// bindings the generation moves past every entry that could name them.
    pub fn unregister(&self, child: &LocalNode) {
        self.children.write().retain(|(id, _)| *id != child.id());
        if !child.is_empty() {
            self.bump_generation();
        }
    }

    pub fn children(&self) -> Vec<Arc<LocalNode>> {
        self.children.read().iter().filter_map(|(_, child)| child.upgrade()).collect()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Marks every cached answer as stale.
    pub fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn connects(&self, target: NodeId) -> bool {
        self.children
            .read()
            .iter()
            .any(|(id, child)| *id == target || child.upgrade().is_some_and(|c| c.connects(target)))
    }

    /// Broadcasts to every child except `executor`, first hit wins.
    pub fn resolve(&self, executor: NodeId, matcher: &Matcher) -> Option<Arc<ComponentNode>> {
        let key = CacheKey {
            executor,
            matcher: matcher.key(),
            generation: self.generation(),
        };

        let cached = self.cache.get_or_compute(key.clone(), || {
            self.broadcast(executor, matcher).map(|node| Arc::downgrade(&node))
        })?;
        match cached {
            None => None,
            Some(weak) => match weak.upgrade() {
                Some(node) => Some(node),
                None => {
                    // The binding died without a generation change reaching us first.
                    self.cache.invalidate(&key);
                    self.broadcast(executor, matcher)
                }
            },
        }
    }

    fn broadcast(&self, executor: NodeId, matcher: &Matcher) -> Option<Arc<ComponentNode>> {
        let children: Vec<Arc<LocalNode>> = self
            .children
            .read()
            .iter()
            .filter(|(id, _)| *id != executor)
            .filter_map(|(_, child)| child.upgrade())
            .collect();

        let found = children.iter().find_map(|child| child.resolve(matcher));
        tracing::trace!(?executor, ?matcher, found = found.is_some(), "global broadcast");
        found
    }

    pub fn purge_cache(&self) {
        self.cache.purge();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}

impl fmt::Debug for GlobalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalNode")
            .field("id", &self.id)
            .field("children", &self.children.read().len())
            .field("generation", &self.generation())
            .finish()
    }
}

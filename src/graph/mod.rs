//! The resolution graph.
//!
//! Every scope owns a [`LocalNode`] holding the components bound directly in
//! it. A [`BridgeNode`] exposes one scope's local node to another scope. The
//! tree shares a single [`GlobalNode`] that knows every local node and
//! caches broadcast results. [`ComponentNode`]s are the leaves: each wraps
//! one definition and never routes any further.
//!
//! All four kinds answer the same three questions through [`Node`]:
//! `connects`, `resolve` and `in_scope`.

mod bridge;
mod component;
mod global;
mod local;

pub use bridge::BridgeNode;
pub use component::ComponentNode;
pub use global::GlobalNode;
pub use local::LocalNode;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::key::BindingKey;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_MATCHER_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a node; node equality is id equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type Predicate = Arc<dyn Fn(&ComponentNode) -> bool + Send + Sync>;

/// Identity-bearing predicate over component nodes.
///
/// Two matchers with equal [`Matcher::key`]s are interchangeable; the cache
/// relies on that. Custom matchers get a fresh identity when created, so a
/// clone shares cache entries with its original while a second closure
/// doing the same thing does not.
#[derive(Clone)]
pub enum Matcher {
    /// Component bound under this exact key
    Binding(BindingKey),
    /// This exact component node
    Node(NodeId),
    Custom { id: u64, predicate: Predicate },
}

/// Hashable identity of a [`Matcher`].
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum MatcherKey {
    Binding(BindingKey),
    Node(NodeId),
    Custom(u64),
}

impl Matcher {
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&ComponentNode) -> bool + Send + Sync + 'static,
    {
        Matcher::Custom {
            id: NEXT_MATCHER_ID.fetch_add(1, Ordering::Relaxed),
            predicate: Arc::new(predicate),
        }
    }

    pub fn matches(&self, node: &ComponentNode) -> bool {
        match self {
            Matcher::Binding(key) => node.key() == key,
            Matcher::Node(id) => node.id() == *id,
            Matcher::Custom { predicate, .. } => predicate(node),
        }
    }

    pub fn key(&self) -> MatcherKey {
        match self {
            Matcher::Binding(key) => MatcherKey::Binding(key.clone()),
            Matcher::Node(id) => MatcherKey::Node(*id),
            Matcher::Custom { id, .. } => MatcherKey::Custom(*id),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Binding(key) => write!(f, "Matcher::Binding({})", key),
            Matcher::Node(id) => write!(f, "Matcher::Node({:?})", id),
            Matcher::Custom { id, .. } => write!(f, "Matcher::Custom({})", id),
        }
    }
}

/// Any node of the resolution graph.
#[derive(Clone)]
pub enum Node {
    Local(Arc<LocalNode>),
    Bridge(Arc<BridgeNode>),
    Global(Arc<GlobalNode>),
    Component(Arc<ComponentNode>),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Local(node) => node.id(),
            Node::Bridge(node) => node.id(),
            Node::Global(node) => node.id(),
            Node::Component(node) => node.id(),
        }
    }

    /// Whether a request starting here can reach `target`. Not symmetric.
    pub fn connects(&self, target: NodeId) -> bool {
        match self {
            Node::Local(node) => node.connects(target),
            Node::Bridge(node) => node.connects(target),
            Node::Global(node) => node.connects(target),
            Node::Component(_) => false,
        }
    }

    /// First component reachable from here that `matcher` accepts, never
    /// routing back through `executor`. `None` is the not-found answer.
    pub fn resolve(&self, executor: NodeId, matcher: &Matcher) -> Option<Arc<ComponentNode>> {
        match self {
            Node::Local(node) => node.resolve(matcher),
            Node::Bridge(node) => node.resolve(matcher),
            Node::Global(node) => node.resolve(executor, matcher),
            Node::Component(_) => None,
        }
    }

    /// Whether the component `target` is reachable from here on behalf of `executor`.
    pub fn in_scope(&self, executor: NodeId, target: NodeId) -> bool {
        match self {
            Node::Bridge(node) => node.in_scope(target),
            Node::Component(_) => false,
            _ => self.resolve(executor, &Matcher::Node(target)).is_some(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Local(_) => "local",
            Node::Bridge(_) => "bridge",
            Node::Global(_) => "global",
            Node::Component(_) => "component",
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node::{}({:?})", self.kind(), self.id())
    }
}

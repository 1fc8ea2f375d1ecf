use std::fmt;
use std::sync::{Arc, Weak};

use crate::graph::{ComponentNode, LocalNode, Matcher, Node, NodeId};

/// One-way link exposing the bindings of `to` to the scope owning `from`.
///
/// Requests crossing the bridge are re-issued as if they came from `from`.
/// The target is held weakly: once its scope is gone the bridge leads nowhere.
pub struct BridgeNode {
    id: NodeId,
    from: NodeId,
    to_id: NodeId,
    to: Weak<LocalNode>,
}

impl BridgeNode {
    pub fn new(from: NodeId, to: &Arc<LocalNode>) -> Self {
        Self {
            id: NodeId::next(),
            from,
            to_id: to.id(),
            to: Arc::downgrade(to),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn from(&self) -> NodeId {
        self.from
    }

    pub fn to(&self) -> NodeId {
        self.to_id
    }

    pub fn is_live(&self) -> bool {
        self.to.strong_count() > 0
    }

    pub fn connects(&self, target: NodeId) -> bool {
        target == self.to_id || self.to.upgrade().is_some_and(|to| to.connects(target))
    }

    pub fn resolve(&self, matcher: &Matcher) -> Option<Arc<ComponentNode>> {
        let to = self.to.upgrade()?;
        Node::Local(to).resolve(self.from, matcher)
    }

    pub fn in_scope(&self, target: NodeId) -> bool {
        self.to
            .upgrade()
            .is_some_and(|to| Node::Local(to).in_scope(self.from, target))
    }
}

impl fmt::Debug for BridgeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BridgeNode({:?} -> {:?})", self.from, self.to_id)
    }
}

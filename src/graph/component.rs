use std::fmt;
use std::sync::{Arc, Weak};

use crate::context::{Context, ContextInner};
use crate::definition::ComponentDefinition;
use crate::graph::NodeId;
use crate::key::BindingKey;

/// Leaf of the resolution graph: one bound definition.
///
/// The node only points back to its owning scope weakly, so a node held by
/// a provider or a cache entry never keeps a torn-down scope alive.
pub struct ComponentNode {
    id: NodeId,
    key: BindingKey,
    definition: Arc<ComponentDefinition>,
    owner: Weak<ContextInner>,
}

impl ComponentNode {
    pub(crate) fn new(key: BindingKey, definition: Arc<ComponentDefinition>, owner: Weak<ContextInner>) -> Self {
        Self {
            id: NodeId::next(),
            key,
            definition,
            owner,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn key(&self) -> &BindingKey {
        &self.key
    }

    pub fn definition(&self) -> &Arc<ComponentDefinition> {
        &self.definition
    }

    /// The scope this component is bound in, if it is still alive.
    pub fn owner(&self) -> Option<Context> {
        self.owner.upgrade().map(Context::from_inner)
    }
}

impl PartialEq for ComponentNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentNode {}

impl fmt::Debug for ComponentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentNode")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("definition", &self.definition.display_name())
            .finish()
    }
}

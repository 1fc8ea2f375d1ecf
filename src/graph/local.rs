use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::graph::{ComponentNode, Matcher, NodeId};
use crate::internal::FastMap;
use crate::key::BindingKey;

#[derive(Default)]
struct BindingTable {
    entries: Vec<Arc<ComponentNode>>,
    index: FastMap<BindingKey, usize>,
}

impl BindingTable {
    fn reindex(&mut self) {
        self.index.clear();
        for (position, node) in self.entries.iter().enumerate() {
            self.index.insert(node.key().clone(), position);
        }
    }
}

/// Components bound directly in one scope.
///
/// The table keeps insertion order; rebinding a key replaces the entry in
/// place. Every mutation happens under one write lock so a reader never
/// sees a half-applied bind. Lookups never ascend to a parent scope.
pub struct LocalNode {
    id: NodeId,
    label: Arc<str>,
    table: RwLock<BindingTable>,
}

impl LocalNode {
    pub fn new(label: impl AsRef<str>) -> Self {
        Self {
            id: NodeId::next(),
            label: Arc::from(label.as_ref()),
            table: RwLock::new(BindingTable::default()),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Binds `node` under its key and returns the node it replaced.
    pub fn insert(&self, node: Arc<ComponentNode>) -> Option<Arc<ComponentNode>> {
        let mut table = self.table.write();
        match table.index.get(node.key()).copied() {
            Some(position) => Some(std::mem::replace(&mut table.entries[position], node)),
            None => {
                let position = table.entries.len();
                table.index.insert(node.key().clone(), position);
                table.entries.push(node);
                None
            }
        }
    }

    pub fn remove(&self, key: &BindingKey) -> Option<Arc<ComponentNode>> {
        let mut table = self.table.write();
        let position = table.index.remove(key)?;
        let removed = table.entries.remove(position);
        table.reindex();
        Some(removed)
    }

    /// Removes every binding accepted by `predicate`, returning them in binding order.
    pub fn remove_where<F>(&self, mut predicate: F) -> Vec<Arc<ComponentNode>>
    where
        F: FnMut(&ComponentNode) -> bool,
    {
        let mut table = self.table.write();
        let (removed, kept): (Vec<_>, Vec<_>) = table.entries.drain(..).partition(|node| predicate(node));
        table.entries = kept;
        table.reindex();
        removed
    }

    pub fn drain(&self) -> Vec<Arc<ComponentNode>> {
        let mut table = self.table.write();
        table.index.clear();
        std::mem::take(&mut table.entries)
    }

    pub fn get(&self, key: &BindingKey) -> Option<Arc<ComponentNode>> {
        let table = self.table.read();
        table.index.get(key).map(|&position| table.entries[position].clone())
    }

    pub fn contains(&self, key: &BindingKey) -> bool {
        self.table.read().index.contains_key(key)
    }

    /// Snapshot of the bound components in binding order.
    pub fn nodes(&self) -> Vec<Arc<ComponentNode>> {
        self.table.read().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.table.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn connects(&self, target: NodeId) -> bool {
        self.table.read().entries.iter().any(|node| node.id() == target)
    }

    /// Linear scan over this scope's bindings.
    pub fn resolve(&self, matcher: &Matcher) -> Option<Arc<ComponentNode>> {
        let table = self.table.read();
        if let Matcher::Binding(key) = matcher {
            // Keys are unique per table, so the index gives the same answer as the scan.
            return table.index.get(key).map(|&position| table.entries[position].clone());
        }
        table.entries.iter().find(|node| matcher.matches(node)).cloned()
    }
}

impl fmt::Debug for LocalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalNode")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("bindings", &self.len())
            .finish()
    }
}

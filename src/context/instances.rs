//! Per-scope store of retained instances.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::definition::{AnyArc, TeardownFn};
use crate::error::DiResult;
use crate::graph::NodeId;
use crate::internal::{FastMap, TeardownBag};
use crate::key::BindingKey;

/// One retained instance, tagged with the binding that produced it.
///
/// `node` is `None` for instances placed with `set_instance` before any
/// binding existed for the key.
pub(crate) struct Slot {
    cell: OnceCell<AnyArc>,
    teardown: Option<TeardownFn>,
    sequence: u64,
    node: Option<NodeId>,
}

impl Slot {
    pub(crate) fn value(&self) -> Option<AnyArc> {
        self.cell.get().cloned()
    }

    /// Compute-once: concurrent callers wait for a single build.
    pub(crate) fn get_or_try_init<F>(&self, build: F) -> DiResult<AnyArc>
    where
        F: FnOnce() -> DiResult<AnyArc>,
    {
        self.cell.get_or_try_init(build).cloned()
    }

    fn belongs_to(&self, node: NodeId) -> bool {
        !matches!(self.node, Some(owner) if owner != node)
    }
}

/// An instance removed from the store, waiting for its teardown hook.
pub(crate) struct Retired {
    pub(crate) key: BindingKey,
    value: AnyArc,
    teardown: Option<TeardownFn>,
    sequence: u64,
}

impl Retired {
    /// Queues the teardown hooks of `retired` so they run newest first.
    pub(crate) fn into_bag(mut retired: Vec<Retired>, mut on_teardown: impl FnMut(&BindingKey)) -> TeardownBag {
        retired.sort_by_key(|r| r.sequence);
        let mut bag = TeardownBag::default();
        for item in retired {
            on_teardown(&item.key);
            if let Some(hook) = item.teardown {
                let value = item.value;
                bag.push(Box::new(move || hook(&value)));
            }
        }
        bag
    }
}

/// Retained instances of one scope, keyed by binding.
///
/// Removal happens under the write lock and hands the slot out exactly once,
/// which is what makes teardown run at most once per instance. A build only
/// lands in the store while the binding that produced it is still the one
/// bound for its key; `is_current` is asked under the write lock, and a
/// rebind always removes the replaced binding's slot after installing the
/// new binding.
#[derive(Default)]
pub(crate) struct InstanceStore {
    slots: RwLock<FastMap<BindingKey, Arc<Slot>>>,
    sequence: AtomicU64,
}

impl InstanceStore {
    pub(crate) fn get(&self, key: &BindingKey) -> Option<AnyArc> {
        self.slots.read().get(key).and_then(|slot| slot.value())
    }

    /// Instance for `key` if it was produced by `node` or set explicitly.
    pub(crate) fn get_for(&self, key: &BindingKey, node: NodeId) -> Option<AnyArc> {
        self.slots
            .read()
            .get(key)
            .filter(|slot| slot.belongs_to(node))
            .and_then(|slot| slot.value())
    }

    pub(crate) fn contains(&self, key: &BindingKey) -> bool {
        self.slots.read().get(key).is_some_and(|slot| slot.cell.get().is_some())
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn slot(&self, node: Option<NodeId>, teardown: Option<TeardownFn>, cell: OnceCell<AnyArc>) -> Arc<Slot> {
        Arc::new(Slot {
            cell,
            teardown,
            sequence: self.next_sequence(),
            node,
        })
    }

    /// The singleton slot of `node` under `key`, created if needed.
    ///
    /// Returns no slot when `node` is no longer bound; the caller builds an
    /// instance that is not kept. A slot left behind by a replaced binding is
    /// displaced and handed back for teardown.
    pub(crate) fn claim(
        &self,
        key: &BindingKey,
        node: NodeId,
        teardown: Option<TeardownFn>,
        is_current: impl FnOnce() -> bool,
    ) -> (Option<Arc<Slot>>, Option<Retired>) {
        let mut slots = self.slots.write();
        let existing = slots.get(key).filter(|slot| slot.node == Some(node)).cloned();
        if existing.is_some() {
            return (existing, None);
        }
        if !is_current() {
            return (None, None);
        }

        let slot = self.slot(Some(node), teardown, OnceCell::new());
        let displaced = slots
            .insert(key.clone(), slot.clone())
            .and_then(|previous| retire(key.clone(), previous));
        (Some(slot), displaced)
    }

    /// Stores `built` for `node` unless an instance of `node` got there
    /// first. Returns the instance to serve plus whatever must be torn down:
    /// the losing build, or a slot left behind by a replaced binding.
    ///
    /// When `node` is no longer bound, `built` is served but not kept.
    pub(crate) fn retain(
        &self,
        key: &BindingKey,
        node: NodeId,
        teardown: Option<TeardownFn>,
        built: AnyArc,
        is_current: impl FnOnce() -> bool,
    ) -> (AnyArc, Option<Retired>) {
        let mut slots = self.slots.write();
        let existing = slots
            .get(key)
            .filter(|slot| slot.belongs_to(node))
            .and_then(|slot| slot.value());
        if let Some(existing) = existing {
            let discarded = Retired {
                key: key.clone(),
                value: built,
                teardown,
                sequence: self.next_sequence(),
            };
            return (existing, Some(discarded));
        }
        if !is_current() {
            return (built, None);
        }

        let slot = self.slot(Some(node), teardown, OnceCell::with_value(built.clone()));
        let displaced = slots
            .insert(key.clone(), slot)
            .and_then(|previous| retire(key.clone(), previous));
        (built, displaced)
    }

    /// Stores `value`, returning the instance it displaced.
    pub(crate) fn insert(
        &self,
        key: &BindingKey,
        value: AnyArc,
        teardown: Option<TeardownFn>,
        node: Option<NodeId>,
    ) -> Option<Retired> {
        let slot = self.slot(node, teardown, OnceCell::with_value(value));
        let previous = self.slots.write().insert(key.clone(), slot)?;
        retire(key.clone(), previous)
    }

    pub(crate) fn remove(&self, key: &BindingKey) -> Option<Retired> {
        let slot = self.slots.write().remove(key)?;
        retire(key.clone(), slot)
    }

    /// Removes the instance under `key` only if `node` produced it or it was
    /// set explicitly. A newer binding's instance stays.
    pub(crate) fn remove_owned(&self, key: &BindingKey, node: NodeId) -> Option<Retired> {
        let mut slots = self.slots.write();
        if !slots.get(key)?.belongs_to(node) {
            return None;
        }
        let slot = slots.remove(key)?;
        drop(slots);
        retire(key.clone(), slot)
    }

    pub(crate) fn drain(&self) -> Vec<Retired> {
        let drained: Vec<_> = self.slots.write().drain().collect();
        drained.into_iter().filter_map(|(key, slot)| retire(key, slot)).collect()
    }

    pub(crate) fn keys(&self) -> Vec<BindingKey> {
        self.slots
            .read()
            .iter()
            .filter(|(_, slot)| slot.cell.get().is_some())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.read().values().filter(|slot| slot.cell.get().is_some()).count()
    }
}

fn retire(key: BindingKey, slot: Arc<Slot>) -> Option<Retired> {
    let value = slot.cell.get()?.clone();
    Some(Retired {
        key,
        value,
        teardown: slot.teardown.clone(),
        sequence: slot.sequence,
    })
}

//! The scope façade.
//!
//! A [`Context`] is one scope of the tree. It owns its binding table (held by
//! its [`LocalNode`]), its retained instances and the bridges it was given,
//! and keeps its parent alive. Parents never hold their children.
//!
//! Non-local lookups follow one chain: this scope's instances, this scope's
//! bindings, the scopes exposed to it, then the parent's same operation. The
//! root ends the chain by asking the global node, which broadcasts to every
//! other scope of the tree. Operations with a `_local` suffix only look at
//! this scope.

mod inject;
mod instances;
mod provider;

pub use inject::Injectable;
pub use provider::Provider;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::cache::CacheStats;
use crate::definition::{AnyArc, ComponentDefinition, Dependencies, FactoryDescriptor, Implementation};
use crate::discovery::{DefinitionBatch, Discovery};
use crate::eager::{self, EagerReport};
use crate::error::{DiError, DiResult};
use crate::graph::{BridgeNode, ComponentNode, GlobalNode, LocalNode, Matcher, Node, NodeId};
use crate::internal::{BuildTracker, StackGuard};
use crate::key::{BindingKey, Capability, CapabilityRegistry, Qualifier};
use crate::settings::ContextSettings;
use crate::traits::{Resolver, ResolverCore};

use instances::{InstanceStore, Retired, Slot};

/// State shared by every scope of one tree.
pub(crate) struct Tree {
    global: Arc<GlobalNode>,
    settings: ContextSettings,
    registry: CapabilityRegistry,
    builds: BuildTracker,
}

pub(crate) struct ContextInner {
    label: String,
    depth: usize,
    parent: Option<Context>,
    tree: Arc<Tree>,
    local: Arc<LocalNode>,
    bridges: RwLock<Vec<Arc<BridgeNode>>>,
    instances: InstanceStore,
}

/// Handle to one scope. Cloning is cheap and yields the same scope.
///
/// # Examples
///
/// ```rust
/// use ferrous_context::{Context, Implementation, Resolver};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn sink(&self) -> &'static str;
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn sink(&self) -> &'static str { "console" }
/// }
///
/// struct FileLogger;
/// impl Logger for FileLogger {
///     fn sink(&self) -> &'static str { "file" }
/// }
///
/// let root = Context::root();
/// root.bind_qualified::<dyn Logger>("default", Implementation::from_fn(|_| Ok(Arc::new(ConsoleLogger) as Arc<dyn Logger>)));
///
/// let child = root.create_child("request");
/// child.bind_qualified::<dyn Logger>("default", Implementation::from_fn(|_| Ok(Arc::new(FileLogger) as Arc<dyn Logger>)));
///
/// assert_eq!(child.get_required_qualified::<dyn Logger>("default").unwrap().sink(), "file");
/// assert_eq!(root.get_required_qualified::<dyn Logger>("default").unwrap().sink(), "console");
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// New root scope with default settings.
    pub fn root() -> Self {
        Self::with_settings(ContextSettings::default())
    }

    /// New root scope; `settings` apply to the whole tree.
    pub fn with_settings(settings: ContextSettings) -> Self {
        let global = Arc::new(GlobalNode::new(
            settings.cache_capacity,
            settings.cache_idle,
            settings.concurrency_level,
        ));
        let tree = Arc::new(Tree {
            global,
            settings,
            registry: CapabilityRegistry::new(),
            builds: BuildTracker::default(),
        });
        Self::attach("root".to_string(), None, tree)
    }

    /// New root scope seeded with a discovered batch.
    pub fn root_with(settings: ContextSettings, batch: DefinitionBatch) -> Self {
        let root = Self::with_settings(settings);
        root.import(batch);
        root
    }

    fn attach(label: String, parent: Option<Context>, tree: Arc<Tree>) -> Self {
        let local = Arc::new(LocalNode::new(&label));
        tree.global.register(&local);
        let depth = parent.as_ref().map_or(0, |p| p.depth() + 1);
        tracing::trace!(scope = %label, depth, "scope created");

        Self {
            inner: Arc::new(ContextInner {
                label,
                depth,
                parent,
                tree,
                local,
                bridges: RwLock::new(Vec::new()),
                instances: InstanceStore::default(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ContextInner>) -> Self {
        Self { inner }
    }

    /// New child scope. The child keeps this scope alive.
    pub fn create_child(&self, label: impl Into<String>) -> Context {
        Self::attach(label.into(), Some(self.clone()), self.inner.tree.clone())
    }

    pub fn parent(&self) -> Option<&Context> {
        self.inner.parent.as_ref()
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Distance from the root; the root is 0.
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    /// Labels from the root down to this scope, joined by `/`.
    pub fn path(&self) -> String {
        match &self.inner.parent {
            Some(parent) => format!("{}/{}", parent.path(), self.inner.label),
            None => self.inner.label.clone(),
        }
    }

    /// True when both handles point at the same scope.
    pub fn same_scope(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.inner.tree.settings
    }

    /// Every capability bound anywhere in this tree.
    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.inner.tree.registry
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.tree.global.cache_stats()
    }

    pub fn local_node(&self) -> Node {
        Node::Local(self.inner.local.clone())
    }

    pub fn global_node(&self) -> Node {
        Node::Global(self.inner.tree.global.clone())
    }

    pub(crate) fn local(&self) -> &Arc<LocalNode> {
        &self.inner.local
    }

    /// Makes the bindings of `other` visible to lookups from this scope,
    /// after this scope's own bindings and before its parent. One-way.
    pub fn expose(&self, other: &Context) {
        if self.same_scope(other) {
            return;
        }
        let bridge = Arc::new(BridgeNode::new(self.inner.local.id(), &other.inner.local));
        self.inner.bridges.write().push(bridge);
        self.inner.tree.global.bump_generation();
        tracing::debug!(from = %self.path(), to = %other.path(), "scope exposed");
    }

    pub fn bridges(&self) -> Vec<Node> {
        self.inner.bridges.read().iter().cloned().map(Node::Bridge).collect()
    }

    /// Binds every definition of `batch` into this scope.
    pub fn import(&self, batch: DefinitionBatch) -> Vec<BindingKey> {
        let keys: Vec<_> = batch
            .into_definitions()
            .into_iter()
            .map(|definition| self.bind_definition(definition))
            .collect();
        tracing::debug!(scope = %self.path(), definitions = keys.len(), "batch imported");
        keys
    }

    pub fn import_from(&self, source: &dyn Discovery) -> Vec<BindingKey> {
        self.import(source.discover())
    }

    /// Builds this scope's eager definitions.
    pub fn initialize(&self) -> EagerReport {
        eager::run(self)
    }

    fn key<T: ?Sized + 'static>(&self, qualifier: Option<Qualifier>) -> BindingKey {
        match qualifier {
            Some(qualifier) => BindingKey::new(Capability::of::<T>(), qualifier),
            None => self.key_of::<T>(),
        }
    }

    // ----- Binding management -----

    pub fn bind<T>(&self, implementation: Implementation<T>) -> BindingKey
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.bind_definition(ComponentDefinition::builder::<T>().implementation(implementation).build())
    }

    pub fn bind_qualified<T>(&self, qualifier: impl Into<Qualifier>, implementation: Implementation<T>) -> BindingKey
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.bind_definition(
            ComponentDefinition::builder::<T>()
                .qualifier(qualifier)
                .implementation(implementation)
                .build(),
        )
    }

    pub fn bind_factory<T>(&self, factory: FactoryDescriptor<T>) -> BindingKey
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.bind_definition(ComponentDefinition::builder::<T>().factory(factory).build())
    }

    pub fn bind_factory_qualified<T>(&self, qualifier: impl Into<Qualifier>, factory: FactoryDescriptor<T>) -> BindingKey
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.bind_definition(ComponentDefinition::builder::<T>().qualifier(qualifier).factory(factory).build())
    }

    /// Binds `definition` in this scope, replacing any binding with the same
    /// key. A replaced binding's retained instance is torn down.
    pub fn bind_definition(&self, definition: ComponentDefinition) -> BindingKey {
        let tree = &self.inner.tree;
        let defaults = &tree.settings.default_qualifier;
        let capability = definition.capability();
        tree.registry.register(capability, &defaults.qualifier_for(&capability));

        let key = BindingKey::new(capability, definition.qualifier(defaults));
        let node = Arc::new(ComponentNode::new(
            key.clone(),
            Arc::new(definition),
            Arc::downgrade(&self.inner),
        ));
        let previous = self.inner.local.insert(node);
        tree.global.bump_generation();

        // The new binding is visible before the old instance goes, so a build
        // of the replaced binding finishing now is never stored.
        if let Some(previous) = previous {
            tracing::debug!(scope = %self.path(), key = %key, "binding replaced");
            self.retire(self.inner.instances.remove_owned(&key, previous.id()).into_iter().collect());
        } else {
            tracing::trace!(scope = %self.path(), key = %key, "bound");
        }
        key
    }

    pub fn clear_binding<T: ?Sized + 'static>(&self) -> bool {
        self.clear_binding_key(&self.key::<T>(None))
    }

    pub fn clear_binding_qualified<T: ?Sized + 'static>(&self, qualifier: impl Into<Qualifier>) -> bool {
        self.clear_binding_key(&self.key::<T>(Some(qualifier.into())))
    }

    /// Removes one binding of this scope and tears down its retained instance.
    pub fn clear_binding_key(&self, key: &BindingKey) -> bool {
        match self.inner.local.remove(key) {
            Some(node) => {
                self.forget(vec![node]);
                true
            }
            None => false,
        }
    }

    /// Removes the bindings of `T` under every qualifier.
    pub fn clear_bindings_for<T: ?Sized + 'static>(&self) -> usize {
        let capability = Capability::of::<T>();
        self.clear_bindings_where(|key, _| key.capability() == capability)
    }

    pub fn clear_bindings_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&BindingKey, &ComponentDefinition) -> bool,
    {
        let removed = self.inner.local.remove_where(|node| predicate(node.key(), node.definition()));
        self.forget(removed)
    }

    pub fn clear_all_bindings(&self) -> usize {
        let removed = self.inner.local.drain();
        self.forget(removed)
    }

    fn forget(&self, removed: Vec<Arc<ComponentNode>>) -> usize {
        if removed.is_empty() {
            return 0;
        }
        self.inner.tree.global.bump_generation();
        let retired = removed
            .iter()
            .filter_map(|node| self.inner.instances.remove_owned(node.key(), node.id()))
            .collect();
        self.retire(retired);
        tracing::debug!(scope = %self.path(), bindings = removed.len(), "bindings cleared");
        removed.len()
    }

    pub fn has_binding<T: ?Sized + 'static>(&self) -> bool {
        self.lookup(&Matcher::Binding(self.key::<T>(None))).is_some()
    }

    pub fn has_binding_qualified<T: ?Sized + 'static>(&self, qualifier: impl Into<Qualifier>) -> bool {
        self.lookup(&Matcher::Binding(self.key::<T>(Some(qualifier.into())))).is_some()
    }

    pub fn has_binding_local<T: ?Sized + 'static>(&self) -> bool {
        self.inner.local.contains(&self.key::<T>(None))
    }

    pub fn has_binding_local_qualified<T: ?Sized + 'static>(&self, qualifier: impl Into<Qualifier>) -> bool {
        self.inner.local.contains(&self.key::<T>(Some(qualifier.into())))
    }

    // ----- Instance lifecycle -----

    /// Stores `value` as this scope's instance of `T`. Without a binding for
    /// the key, an instance-only binding is added.
    pub fn set_instance<T>(&self, value: Arc<T>) -> BindingKey
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = self.key::<T>(None);
        self.store_instance(&key, crate::definition::erase(value), None);
        key
    }

    pub fn set_instance_qualified<T>(&self, qualifier: impl Into<Qualifier>, value: Arc<T>) -> BindingKey
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let qualifier = qualifier.into();
        let key = self.key::<T>(Some(qualifier.clone()));
        self.store_instance(&key, crate::definition::erase(value), Some(qualifier));
        key
    }

    fn store_instance(&self, key: &BindingKey, value: AnyArc, qualifier: Option<Qualifier>) {
        let existing = self.inner.local.get(key);
        let teardown = existing.as_ref().and_then(|node| node.definition().teardown_hook());
        let replaced = self
            .inner
            .instances
            .insert(key, value, teardown, existing.as_ref().map(|node| node.id()));

        if existing.is_none() {
            self.bind_definition(ComponentDefinition::instance_only(key.capability(), qualifier));
        }
        self.retire(replaced.into_iter().collect());
    }

    pub fn remove_instance<T: ?Sized + 'static>(&self) -> bool {
        self.remove_instance_key(&self.key::<T>(None))
    }

    pub fn remove_instance_qualified<T: ?Sized + 'static>(&self, qualifier: impl Into<Qualifier>) -> bool {
        self.remove_instance_key(&self.key::<T>(Some(qualifier.into())))
    }

    /// Tears down this scope's instance for `key`. A binding that only
    /// existed to carry the instance goes with it.
    pub fn remove_instance_key(&self, key: &BindingKey) -> bool {
        let removed = self.inner.instances.remove(key);
        let found = removed.is_some();
        self.retire(removed.into_iter().collect());

        if self.inner.local.get(key).is_some_and(|node| !node.definition().is_producible()) {
            self.inner.local.remove(key);
            self.inner.tree.global.bump_generation();
        }
        found
    }

    pub fn remove_all_instances(&self) -> usize {
        let count = self.retire(self.inner.instances.drain());
        let orphans = self.inner.local.remove_where(|node| !node.definition().is_producible());
        if !orphans.is_empty() {
            self.inner.tree.global.bump_generation();
        }
        count
    }

    /// Tears down every instance, then drops every binding and bridge.
    /// Calling it again is a no-op.
    pub fn clear(&self) {
        self.remove_all_instances();
        self.clear_all_bindings();
        let bridges = std::mem::take(&mut *self.inner.bridges.write());
        if !bridges.is_empty() {
            self.inner.tree.global.bump_generation();
        }
    }

    fn retire(&self, retired: Vec<Retired>) -> usize {
        if retired.is_empty() {
            return 0;
        }
        let count = retired.len();
        let observers = &self.inner.tree.settings.observers;
        let mut bag = Retired::into_bag(retired, |key| observers.torn_down(key));
        tracing::debug!(scope = %self.path(), instances = count, hooks = bag.len(), "tearing down");
        bag.run_all_reverse();
        count
    }

    // ----- Lookup -----

    /// First component `matcher` accepts along this scope's chain.
    pub fn lookup(&self, matcher: &Matcher) -> Option<Arc<ComponentNode>> {
        if let Some(node) = self.lookup_here(matcher) {
            return Some(node);
        }
        match &self.inner.parent {
            Some(parent) => parent.lookup(matcher),
            None => self.global_node().resolve(self.inner.local.id(), matcher),
        }
    }

    fn lookup_here(&self, matcher: &Matcher) -> Option<Arc<ComponentNode>> {
        let origin = self.inner.local.id();
        if let Some(node) = self.local_node().resolve(origin, matcher) {
            return Some(node);
        }
        self.bridges().iter().find_map(|bridge| bridge.resolve(origin, matcher))
    }

    /// Whether `node` is reachable from this scope.
    pub fn in_scope(&self, node: &ComponentNode) -> bool {
        self.lookup(&Matcher::Node(node.id())).is_some()
    }

    pub fn get_local<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        self.get_local_key(&self.key::<T>(None))
    }

    pub fn get_local_qualified<T: ?Sized + Send + Sync + 'static>(
        &self,
        qualifier: impl Into<Qualifier>,
    ) -> DiResult<Option<Arc<T>>> {
        self.get_local_key(&self.key::<T>(Some(qualifier.into())))
    }

    fn get_local_key<T: ?Sized + Send + Sync + 'static>(&self, key: &BindingKey) -> DiResult<Option<Arc<T>>> {
        let value = match self.inner.instances.get(key) {
            Some(value) => Some(value),
            None => match self.inner.local.get(key) {
                Some(node) => Some(self.instance_for(&node)?),
                None => None,
            },
        };
        match value {
            Some(value) => crate::definition::downcast::<T>(&value)
                .map(Some)
                .ok_or(DiError::TypeMismatch(std::any::type_name::<T>())),
            None => Ok(None),
        }
    }

    /// Provider for the binding of `T` visible from this scope.
    pub fn get_factory<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Provider<T>> {
        self.lookup(&Matcher::Binding(self.key::<T>(None))).map(Provider::new)
    }

    pub fn get_factory_qualified<T: ?Sized + Send + Sync + 'static>(
        &self,
        qualifier: impl Into<Qualifier>,
    ) -> Option<Provider<T>> {
        self.lookup(&Matcher::Binding(self.key::<T>(Some(qualifier.into()))))
            .map(Provider::new)
    }

    pub fn has_instance<T: ?Sized + 'static>(&self) -> bool {
        self.has_instance_key(&self.key::<T>(None))
    }

    pub fn has_instance_qualified<T: ?Sized + 'static>(&self, qualifier: impl Into<Qualifier>) -> bool {
        self.has_instance_key(&self.key::<T>(Some(qualifier.into())))
    }

    pub fn has_local_instance<T: ?Sized + 'static>(&self) -> bool {
        self.inner.instances.contains(&self.key::<T>(None))
    }

    pub fn has_local_instance_qualified<T: ?Sized + 'static>(&self, qualifier: impl Into<Qualifier>) -> bool {
        self.inner.instances.contains(&self.key::<T>(Some(qualifier.into())))
    }

    pub fn has_local_instance_key(&self, key: &BindingKey) -> bool {
        self.inner.instances.contains(key)
    }

    pub fn has_instance_key(&self, key: &BindingKey) -> bool {
        if self.inner.instances.contains(key) {
            return true;
        }
        self.inner.parent.as_ref().is_some_and(|parent| parent.has_instance_key(key))
    }

    /// True when a retained instance exists or a reachable definition could
    /// build one right now.
    pub fn can_produce_instance<T: ?Sized + 'static>(&self) -> bool {
        self.can_produce_key(&self.key::<T>(None))
    }

    pub fn can_produce_instance_qualified<T: ?Sized + 'static>(&self, qualifier: impl Into<Qualifier>) -> bool {
        self.can_produce_key(&self.key::<T>(Some(qualifier.into())))
    }

    pub fn can_produce_instance_locally<T: ?Sized + 'static>(&self) -> bool {
        self.can_produce_locally_key(&self.key::<T>(None))
    }

    pub fn can_produce_instance_locally_qualified<T: ?Sized + 'static>(&self, qualifier: impl Into<Qualifier>) -> bool {
        self.can_produce_locally_key(&self.key::<T>(Some(qualifier.into())))
    }

    /// Asks this scope, then the scopes exposed to it, then the parent. A
    /// binding here that cannot produce does not stop the parent from
    /// answering.
    pub fn can_produce_key(&self, key: &BindingKey) -> bool {
        if self.can_produce_locally_key(key) {
            return true;
        }
        let matcher = Matcher::Binding(key.clone());
        let origin = self.inner.local.id();
        let bridged = self
            .bridges()
            .iter()
            .filter_map(|bridge| bridge.resolve(origin, &matcher))
            .any(|node| producible_now(&node, &mut Vec::new()));
        if bridged {
            return true;
        }
        match &self.inner.parent {
            Some(parent) => parent.can_produce_key(key),
            None => self
                .global_node()
                .resolve(origin, &matcher)
                .is_some_and(|node| producible_now(&node, &mut Vec::new())),
        }
    }

    pub fn can_produce_locally_key(&self, key: &BindingKey) -> bool {
        self.inner.instances.contains(key)
            || self.inner.local.get(key).is_some_and(|node| producible_now(&node, &mut Vec::new()))
    }

    /// Whether resolving `key` from here would succeed right now, following
    /// the same chain as `get`.
    fn resolvable_now(&self, key: &BindingKey, visiting: &mut Vec<NodeId>) -> bool {
        if self.inner.instances.contains(key) {
            return true;
        }
        let matcher = Matcher::Binding(key.clone());
        if let Some(node) = self.lookup_here(&matcher) {
            return producible_now(&node, visiting);
        }
        match &self.inner.parent {
            Some(parent) => parent.resolvable_now(key, visiting),
            None => self
                .global_node()
                .resolve(self.inner.local.id(), &matcher)
                .is_some_and(|node| producible_now(&node, visiting)),
        }
    }

    /// Fills the slots of `target` with what is resolvable now and returns
    /// how many were filled. Failures leave their slot empty.
    pub fn inject(&self, target: &mut dyn Injectable) -> usize {
        let mut values = Dependencies::new("injection target");
        let mut filled = 0;
        for dependency in target.dependencies() {
            let key = self.key_for(&dependency);
            let value = match self.resolve_any(&key) {
                Ok(value) => value,
                Err(error) => {
                    tracing::debug!(key = %key, %error, "injection slot left empty");
                    self.inner.tree.settings.observers.construction_failed(&key, &error);
                    None
                }
            };
            filled += usize::from(value.is_some());
            values.push(dependency, value);
        }
        target.inject(&values);
        filled
    }

    // ----- Construction -----

    /// Instance for `node`, honouring its lifecycle flags. `node` must be
    /// bound in this scope.
    pub(crate) fn instance_for(&self, node: &ComponentNode) -> DiResult<AnyArc> {
        let definition = node.definition();
        let flags = definition.flags();
        let key = node.key();

        let store = &self.inner.instances;

        if flags.is_retained() {
            if let Some(value) = store.get_for(key, node.id()) {
                return Ok(value);
            }
        }

        let _guard = StackGuard::enter(node.id(), definition.display_name(), self.inner.tree.settings.max_depth)?;
        if flags.is_singleton() {
            let (slot, displaced) = store.claim(key, node.id(), definition.teardown_hook(), || self.is_bound(node));
            self.retire(displaced.into_iter().collect());
            match slot {
                Some(slot) => self.build_once(&slot, node),
                // Replaced while this request was in flight: served, not kept.
                None => self.construct(node),
            }
        } else if flags.is_retained() {
            let built = self.construct(node)?;
            let (value, discarded) =
                store.retain(key, node.id(), definition.teardown_hook(), built, || self.is_bound(node));
            self.retire(discarded.into_iter().collect());
            Ok(value)
        } else {
            self.construct(node)
        }
    }

    /// Waits for or runs the single build of a singleton slot. Waits are
    /// recorded tree-wide so two threads building each other's singletons
    /// fail with a cycle instead of blocking forever.
    fn build_once(&self, slot: &Slot, node: &ComponentNode) -> DiResult<AnyArc> {
        if let Some(value) = slot.value() {
            return Ok(value);
        }
        let builds = &self.inner.tree.builds;
        let _waiting = builds.wait(node.id(), &node.definition().display_name())?;
        slot.get_or_try_init(|| {
            let _owner = builds.own(node.id());
            self.construct(node)
        })
    }

    /// True while `node` is still the binding for its key in this scope.
    fn is_bound(&self, node: &ComponentNode) -> bool {
        self.inner.local.get(node.key()).is_some_and(|bound| bound.id() == node.id())
    }

    fn construct(&self, node: &ComponentNode) -> DiResult<AnyArc> {
        let observers = &self.inner.tree.settings.observers;
        let key = node.key();
        let started = observers.has_observers().then(|| {
            observers.resolving(key);
            Instant::now()
        });

        let result = node.definition().new_instance(self);
        match &result {
            Ok(_) => {
                if let Some(started) = started {
                    observers.resolved(key, started.elapsed());
                }
            }
            Err(error) => {
                tracing::debug!(scope = %self.path(), key = %key, %error, "construction failed");
                observers.construction_failed(key, error);
            }
        }
        result
    }

    fn instantiate(&self, node: &ComponentNode) -> DiResult<AnyArc> {
        let owner = node
            .owner()
            .ok_or_else(|| DiError::ScopeDropped(node.key().display_name()))?;
        owner.instance_for(node)
    }
}

/// Whether `node` could be built right now from its owning scope: every
/// non-lazy dependency must itself be resolvable now. `visiting` holds the
/// components on the current path; meeting one again is a cycle, which
/// cannot be built.
fn producible_now(node: &ComponentNode, visiting: &mut Vec<NodeId>) -> bool {
    let definition = node.definition();
    let Some(owner) = node.owner() else {
        return false;
    };
    if owner.inner.instances.contains(node.key()) {
        return true;
    }
    if !definition.is_producible() || visiting.contains(&node.id()) {
        return false;
    }

    visiting.push(node.id());
    let producible = definition
        .dependencies()
        .iter()
        .filter(|dependency| !dependency.is_lazy())
        .all(|dependency| owner.resolvable_now(&owner.key_for(dependency), visiting));
    visiting.pop();
    producible
}

impl ResolverCore for Context {
    fn resolve_any(&self, key: &BindingKey) -> DiResult<Option<AnyArc>> {
        if let Some(value) = self.inner.instances.get(key) {
            return Ok(Some(value));
        }

        let matcher = Matcher::Binding(key.clone());
        if let Some(node) = self.lookup_here(&matcher) {
            return self.instantiate(&node).map(Some);
        }

        match &self.inner.parent {
            Some(parent) => parent.resolve_any(key),
            None => match self.global_node().resolve(self.inner.local.id(), &matcher) {
                Some(node) => self.instantiate(&node).map(Some),
                None => Ok(None),
            },
        }
    }

    fn default_qualifier(&self, capability: &Capability) -> Qualifier {
        self.inner.tree.settings.default_qualifier.qualifier_for(capability)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("path", &self.path())
            .field("bindings", &self.inner.local.len())
            .field("instances", &self.inner.instances.len())
            .field("bridges", &self.inner.bridges.read().len())
            .finish()
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        let observers = &self.tree.settings.observers;
        let mut bag = Retired::into_bag(self.instances.drain(), |key| observers.torn_down(key));
        bag.run_all_reverse();
        self.tree.global.unregister(&self.local);
        tracing::trace!(scope = %self.label, "scope dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Dependency;
    use crate::lifecycle::LifecycleFlags;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(usize);

    fn counting(calls: &Arc<AtomicUsize>) -> Implementation<Counter> {
        let calls = calls.clone();
        Implementation::from_fn(move |_| Ok(Arc::new(Counter(calls.fetch_add(1, Ordering::SeqCst)))))
    }

    #[test]
    fn set_instance_adds_and_removes_an_instance_only_binding() {
        let root = Context::root();
        root.set_instance(Arc::new(5u8));
        assert!(root.has_binding_local::<u8>());
        assert!(root.has_local_instance::<u8>());
        assert_eq!(*root.get_required::<u8>().unwrap(), 5);

        assert!(root.remove_instance::<u8>());
        assert!(!root.has_binding_local::<u8>());
        assert!(root.get::<u8>().unwrap().is_none());
    }

    #[test]
    fn retain_keeps_the_first_stored_instance() {
        let calls = Arc::new(AtomicUsize::new(0));
        let root = Context::root();
        root.bind_definition(
            ComponentDefinition::builder::<Counter>()
                .implementation(counting(&calls))
                .retain()
                .build(),
        );

        let a = root.get_required::<Counter>().unwrap();
        let b = root.get_required::<Counter>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn singleton_lives_in_the_owning_scope() {
        let calls = Arc::new(AtomicUsize::new(0));
        let root = Context::root();
        root.bind_definition(
            ComponentDefinition::builder::<Counter>()
                .implementation(counting(&calls))
                .flags(LifecycleFlags::SINGLETON)
                .build(),
        );
        let child = root.create_child("child");

        let via_child = child.get_required::<Counter>().unwrap();
        assert!(root.has_local_instance::<Counter>());
        assert!(!child.has_local_instance::<Counter>());
        assert!(child.has_instance::<Counter>());
        assert!(Arc::ptr_eq(&via_child, &root.get_required::<Counter>().unwrap()));
    }

    #[test]
    fn can_produce_requires_resolvable_dependencies() {
        struct Service;
        let root = Context::root();
        root.bind::<Service>(
            Implementation::from_fn(|deps| {
                deps.require::<Counter>(0)?;
                Ok(Arc::new(Service))
            })
            .depends_on(Dependency::on::<Counter>()),
        );
        assert!(!root.can_produce_instance::<Service>());
        assert!(root.get::<Service>().is_err());

        root.set_instance(Arc::new(Counter(0)));
        assert!(root.can_produce_instance_locally::<Service>());
        assert!(root.get::<Service>().unwrap().is_some());
    }

    #[test]
    fn path_and_depth() {
        let root = Context::root();
        let grandchild = root.create_child("a").create_child("b");
        assert_eq!(grandchild.path(), "root/a/b");
        assert_eq!(grandchild.depth(), 2);
        assert!(grandchild.parent().is_some_and(|p| p.label() == "a"));
    }
}

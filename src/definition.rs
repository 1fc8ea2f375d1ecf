//! Component definitions and the producers behind them.
//!
//! A [`ComponentDefinition`] is the full metadata for one binding: which
//! capability it satisfies, how instances are produced, in which order eager
//! definitions are built, which constraints gate eager construction and
//! which lifecycle flags apply. Definitions are type-erased so that one
//! binding table can hold them all; the typed builders below do the erasure.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::constraint::Marker;
use crate::error::{DiError, DiResult};
use crate::key::{Capability, DefaultQualifier, Qualifier};
use crate::lifecycle::{InitializationStrategy, LifecycleFlags};
use crate::traits::{Dispose, ResolverCore};

/// Type-erased instance. The payload is always an `Arc<T>` so that trait
/// objects and sized types are stored the same way.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type TeardownFn = Arc<dyn Fn(&AnyArc) + Send + Sync>;

type ProduceFn = Arc<dyn Fn(&Dependencies) -> DiResult<Produced> + Send + Sync>;

/// Wraps a typed instance into the erased form used by the stores.
pub fn erase<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> AnyArc {
    Arc::new(value)
}

/// Recovers a typed instance from the erased form.
pub fn downcast<T: ?Sized + Send + Sync + 'static>(value: &AnyArc) -> Option<Arc<T>> {
    value.downcast_ref::<Arc<T>>().cloned()
}

/// A declared input of a producer.
#[derive(Clone, Debug)]
pub struct Dependency {
    capability: Capability,
    qualifier: Option<Qualifier>,
    lazy: bool,
}

impl Dependency {
    /// Required dependency on `T` under its default qualifier.
    pub fn on<T: ?Sized + 'static>() -> Self {
        Self {
            capability: Capability::of::<T>(),
            qualifier: None,
            lazy: false,
        }
    }

    pub fn qualified(mut self, qualifier: impl Into<Qualifier>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Marks the dependency lazy: when it is unavailable the producer still
    /// runs and sees [`Lazy::Unavailable`].
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn explicit_qualifier(&self) -> Option<&Qualifier> {
        self.qualifier.as_ref()
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub(crate) fn display_name(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{}[{}]", self.capability.name(), q),
            None => self.capability.name().to_string(),
        }
    }
}

/// Value of a lazy dependency: either resolved, or explicitly not available.
#[derive(Debug)]
pub enum Lazy<T: ?Sized> {
    Ready(Arc<T>),
    Unavailable,
}

impl<T: ?Sized> Lazy<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Lazy::Ready(_))
    }

    pub fn get(&self) -> Option<&Arc<T>> {
        match self {
            Lazy::Ready(value) => Some(value),
            Lazy::Unavailable => None,
        }
    }

    pub fn into_option(self) -> Option<Arc<T>> {
        match self {
            Lazy::Ready(value) => Some(value),
            Lazy::Unavailable => None,
        }
    }
}

impl<T: ?Sized> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        match self {
            Lazy::Ready(value) => Lazy::Ready(value.clone()),
            Lazy::Unavailable => Lazy::Unavailable,
        }
    }
}

/// Resolved inputs handed to a producer, in declaration order.
pub struct Dependencies {
    component: String,
    slots: SmallVec<[(Dependency, Option<AnyArc>); 4]>,
}

impl Dependencies {
    pub(crate) fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            slots: SmallVec::new(),
        }
    }

    pub(crate) fn push(&mut self, dependency: Dependency, value: Option<AnyArc>) {
        self.slots.push((dependency, value));
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Value at `index`, or `None` when it is unavailable or of another type.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> Option<Arc<T>> {
        self.slots
            .get(index)
            .and_then(|(_, value)| value.as_ref())
            .and_then(downcast::<T>)
    }

    /// Value at `index`, failing with a missing-dependency error.
    pub fn require<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> DiResult<Arc<T>> {
        let (dependency, value) = self.slots.get(index).ok_or_else(|| DiError::MissingDependency {
            component: self.component.clone(),
            dependency: format!("#{}", index),
        })?;
        let value = value.as_ref().ok_or_else(|| DiError::MissingDependency {
            component: self.component.clone(),
            dependency: dependency.display_name(),
        })?;
        downcast::<T>(value).ok_or(DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    pub fn lazy<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> Lazy<T> {
        match self.get::<T>(index) {
            Some(value) => Lazy::Ready(value),
            None => Lazy::Unavailable,
        }
    }
}

type AliveFn = Box<dyn Fn() -> bool + Send + Sync>;

/// Output of a producer: the erased instance plus a probe telling whether
/// any strong reference to it is still alive.
pub(crate) struct Produced {
    value: AnyArc,
    alive: AliveFn,
}

/// Instances counted against `LIMIT`: those still alive plus builds in flight.
#[derive(Default)]
struct LiveSet {
    alive: Vec<AliveFn>,
    building: usize,
}

/// One in-flight build holding a place under the cap. Released on drop
/// unless committed with the produced instance.
struct Reservation<'a> {
    live: &'a Mutex<LiveSet>,
    committed: bool,
}

impl<'a> Reservation<'a> {
    fn take(live: &'a Mutex<LiveSet>, limit: usize) -> Option<Self> {
        let mut set = live.lock();
        set.alive.retain(|alive| alive());
        if set.alive.len() + set.building >= limit {
            return None;
        }
        set.building += 1;
        Some(Self { live, committed: false })
    }

    fn commit(mut self, alive: AliveFn) {
        let mut set = self.live.lock();
        set.building -= 1;
        set.alive.push(alive);
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.live.lock().building -= 1;
        }
    }
}

impl Produced {
    fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        let weak: Weak<T> = Arc::downgrade(&value);
        Self {
            value: erase(value),
            alive: Box::new(move || weak.strong_count() > 0),
        }
    }
}

#[derive(Clone)]
struct ErasedProducer {
    name: String,
    dependencies: SmallVec<[Dependency; 4]>,
    produce: ProduceFn,
}

/// How to build `T` directly from its declared dependencies.
///
/// ```rust
/// use ferrous_context::{Implementation, Dependency};
/// use std::sync::Arc;
///
/// struct Config { url: String }
/// struct Repository { config: Arc<Config> }
///
/// let implementation = Implementation::<Repository>::from_fn(|deps| {
///     Ok(Arc::new(Repository { config: deps.require::<Config>(0)? }))
/// })
/// .depends_on(Dependency::on::<Config>());
/// assert_eq!(implementation.dependencies().len(), 1);
/// ```
pub struct Implementation<T: ?Sized> {
    name: String,
    dependencies: SmallVec<[Dependency; 4]>,
    produce: Arc<dyn Fn(&Dependencies) -> DiResult<Arc<T>> + Send + Sync>,
}

impl<T: ?Sized + Send + Sync + 'static> Implementation<T> {
    pub fn from_fn<F>(produce: F) -> Self
    where
        F: Fn(&Dependencies) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            name: std::any::type_name::<T>().to_string(),
            dependencies: SmallVec::new(),
            produce: Arc::new(produce),
        }
    }

    /// Always yields the given instance.
    pub fn value(value: Arc<T>) -> Self {
        Self::from_fn(move |_| Ok(value.clone()))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    fn erase(self) -> ErasedProducer {
        let produce = self.produce;
        ErasedProducer {
            name: self.name,
            dependencies: self.dependencies,
            produce: Arc::new(move |deps| produce(deps).map(Produced::new)),
        }
    }
}

/// Produces instances of `T` on demand.
pub trait Factory<T: ?Sized>: Send + Sync {
    fn produce(&self) -> DiResult<Arc<T>>;
}

impl<T, F> Factory<T> for F
where
    T: ?Sized,
    F: Fn() -> DiResult<Arc<T>> + Send + Sync,
{
    fn produce(&self) -> DiResult<Arc<T>> {
        self()
    }
}

/// How to build a [`Factory`] for `T` from declared dependencies.
///
/// The factory itself is built from the currently resolvable dependencies
/// each time an instance is needed, then asked to produce one.
pub struct FactoryDescriptor<T: ?Sized> {
    name: String,
    dependencies: SmallVec<[Dependency; 4]>,
    build: Arc<dyn Fn(&Dependencies) -> DiResult<Arc<dyn Factory<T>>> + Send + Sync>,
}

impl<T: ?Sized + Send + Sync + 'static> FactoryDescriptor<T> {
    pub fn from_fn<F>(build: F) -> Self
    where
        F: Fn(&Dependencies) -> DiResult<Arc<dyn Factory<T>>> + Send + Sync + 'static,
    {
        Self {
            name: format!("Factory<{}>", std::any::type_name::<T>()),
            dependencies: SmallVec::new(),
            build: Arc::new(build),
        }
    }

    /// Uses one factory instance for every production.
    pub fn shared(factory: Arc<dyn Factory<T>>) -> Self {
        Self::from_fn(move |_| Ok(factory.clone()))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn erase(self) -> ErasedProducer {
        let build = self.build;
        ErasedProducer {
            name: self.name,
            dependencies: self.dependencies,
            produce: Arc::new(move |deps| {
                let factory = build(deps)?;
                factory.produce().map(Produced::new)
            }),
        }
    }
}

/// Metadata for producing and lifecycle-managing one component.
pub struct ComponentDefinition {
    capability: Capability,
    qualifier: Option<Qualifier>,
    implementation: Option<ErasedProducer>,
    factory: Option<ErasedProducer>,
    order: i32,
    constraints: SmallVec<[Marker; 2]>,
    flags: LifecycleFlags,
    strategy: InitializationStrategy,
    limit: usize,
    teardown: Option<TeardownFn>,
    live: Mutex<LiveSet>,
}

impl ComponentDefinition {
    /// Starts a definition for capability `T`.
    ///
    /// ```rust
    /// use ferrous_context::{ComponentDefinition, Implementation, LifecycleFlags};
    /// use std::sync::Arc;
    ///
    /// trait Clock: Send + Sync { fn now(&self) -> u64; }
    /// struct FixedClock;
    /// impl Clock for FixedClock { fn now(&self) -> u64 { 7 } }
    ///
    /// let definition = ComponentDefinition::builder::<dyn Clock>()
    ///     .qualifier("fixed")
    ///     .implementation(Implementation::from_fn(|_| Ok(Arc::new(FixedClock) as Arc<dyn Clock>)))
    ///     .singleton()
    ///     .order(10)
    ///     .eager()
    ///     .build();
    ///
    /// assert!(definition.is_qualified());
    /// assert!(definition.flags().contains(LifecycleFlags::SINGLETON));
    /// assert!(definition.is_eager());
    /// ```
    pub fn builder<T: ?Sized + Send + Sync + 'static>() -> DefinitionBuilder<T> {
        DefinitionBuilder::new()
    }

    /// Definition that only carries an instance placed with `set_instance`.
    pub(crate) fn instance_only(capability: Capability, qualifier: Option<Qualifier>) -> Self {
        Self {
            capability,
            qualifier,
            implementation: None,
            factory: None,
            order: 0,
            constraints: SmallVec::new(),
            flags: LifecycleFlags::RETAIN,
            strategy: InitializationStrategy::Lazy,
            limit: 0,
            teardown: None,
            live: Mutex::new(LiveSet::default()),
        }
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// True when an explicit qualifier overrides the capability's default.
    pub fn is_qualified(&self) -> bool {
        self.qualifier.is_some()
    }

    pub fn explicit_qualifier(&self) -> Option<&Qualifier> {
        self.qualifier.as_ref()
    }

    /// Effective qualifier under the given default strategy.
    pub fn qualifier(&self, defaults: &DefaultQualifier) -> Qualifier {
        match &self.qualifier {
            Some(q) => q.clone(),
            None => defaults.qualifier_for(&self.capability),
        }
    }

    pub fn implementation_name(&self) -> Option<&str> {
        self.implementation.as_ref().map(|p| p.name.as_str())
    }

    pub fn factory_name(&self) -> Option<&str> {
        self.factory.as_ref().map(|p| p.name.as_str())
    }

    pub fn has_implementation(&self) -> bool {
        self.implementation.is_some()
    }

    pub fn has_factory(&self) -> bool {
        self.factory.is_some()
    }

    /// True when `new_instance` has something to call.
    pub fn is_producible(&self) -> bool {
        self.implementation.is_some() || self.factory.is_some()
    }

    /// Higher orders are constructed earlier during the eager pass.
    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn constraints(&self) -> &[Marker] {
        &self.constraints
    }

    pub fn flags(&self) -> LifecycleFlags {
        self.flags
    }

    pub fn strategy(&self) -> InitializationStrategy {
        self.strategy
    }

    pub fn is_eager(&self) -> bool {
        self.strategy == InitializationStrategy::Eager
    }

    /// Live-instance cap; meaningful only with `LIMIT`.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Name used in errors and logs.
    pub fn display_name(&self) -> String {
        match self.producer() {
            Some(producer) => producer.name.clone(),
            None => self.capability.name().to_string(),
        }
    }

    /// Dependencies of the producer `new_instance` would use.
    pub fn dependencies(&self) -> &[Dependency] {
        self.producer().map(|p| &p.dependencies[..]).unwrap_or(&[])
    }

    fn producer(&self) -> Option<&ErasedProducer> {
        self.implementation.as_ref().or(self.factory.as_ref())
    }

    /// Builds an instance from dependencies resolvable right now through
    /// `resolver`. Missing non-lazy dependencies fail; unbound peers are
    /// never created on the fly.
    pub fn new_instance(&self, resolver: &dyn ResolverCore) -> DiResult<AnyArc> {
        let producer = self.producer().ok_or_else(|| {
            DiError::construction(self.capability.name(), "no implementation or factory bound")
        })?;

        let mut deps = Dependencies::new(producer.name.clone());
        for dependency in &producer.dependencies {
            let key = resolver.key_for(dependency);
            let value = match resolver.resolve_any(&key) {
                Ok(value) => value,
                Err(err) if dependency.lazy => {
                    tracing::debug!(component = %producer.name, dependency = %key, error = %err, "lazy dependency unavailable");
                    None
                }
                Err(err) => return Err(err),
            };
            if value.is_none() && !dependency.lazy {
                return Err(DiError::MissingDependency {
                    component: producer.name.clone(),
                    dependency: key.display_name(),
                });
            }
            deps.push(dependency.clone(), value);
        }

        if self.flags.is_limited() {
            let reservation = Reservation::take(&self.live, self.limit).ok_or_else(|| DiError::LimitExceeded {
                component: producer.name.clone(),
                limit: self.limit,
            })?;
            // The producer runs unlocked; the reservation keeps its place under the cap.
            let produced = (producer.produce)(&deps)?;
            reservation.commit(produced.alive);
            return Ok(produced.value);
        }

        (producer.produce)(&deps).map(|produced| produced.value)
    }

    /// Number of instances produced under `LIMIT` that are still alive.
    pub fn live_instances(&self) -> usize {
        let mut live = self.live.lock();
        live.alive.retain(|alive| alive());
        live.alive.len()
    }

    pub(crate) fn teardown_hook(&self) -> Option<TeardownFn> {
        self.teardown.clone()
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("capability", &self.capability)
            .field("qualifier", &self.qualifier)
            .field("implementation", &self.implementation_name())
            .field("factory", &self.factory_name())
            .field("order", &self.order)
            .field("constraints", &self.constraints)
            .field("flags", &self.flags)
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// Typed builder for [`ComponentDefinition`].
pub struct DefinitionBuilder<T: ?Sized> {
    definition: ComponentDefinition,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> DefinitionBuilder<T> {
    fn new() -> Self {
        Self {
            definition: ComponentDefinition {
                capability: Capability::of::<T>(),
                qualifier: None,
                implementation: None,
                factory: None,
                order: 0,
                constraints: SmallVec::new(),
                flags: LifecycleFlags::NONE,
                strategy: InitializationStrategy::Lazy,
                limit: 1,
                teardown: None,
                live: Mutex::new(LiveSet::default()),
            },
            _marker: PhantomData,
        }
    }

    pub fn qualifier(mut self, qualifier: impl Into<Qualifier>) -> Self {
        self.definition.qualifier = Some(qualifier.into());
        self
    }

    pub fn implementation(mut self, implementation: Implementation<T>) -> Self {
        self.definition.implementation = Some(implementation.erase());
        self
    }

    pub fn factory(mut self, factory: FactoryDescriptor<T>) -> Self {
        self.definition.factory = Some(factory.erase());
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.definition.order = order;
        self
    }

    pub fn flags(mut self, flags: LifecycleFlags) -> Self {
        self.definition.flags |= flags;
        self
    }

    pub fn singleton(self) -> Self {
        self.flags(LifecycleFlags::SINGLETON)
    }

    pub fn retain(self) -> Self {
        self.flags(LifecycleFlags::RETAIN)
    }

    pub fn dispose(self) -> Self {
        self.flags(LifecycleFlags::DISPOSE)
    }

    /// Caps live instances at `limit` and sets `LIMIT`.
    pub fn limit(mut self, limit: usize) -> Self {
        self.definition.limit = limit;
        self.flags(LifecycleFlags::LIMIT)
    }

    pub fn strategy(mut self, strategy: InitializationStrategy) -> Self {
        self.definition.strategy = strategy;
        self
    }

    pub fn eager(self) -> Self {
        self.strategy(InitializationStrategy::Eager)
    }

    /// Appends a constraint marker; markers are evaluated in declaration order.
    pub fn constraint(mut self, marker: Marker) -> Self {
        self.definition.constraints.push(marker);
        self
    }

    /// Hook run once when a retained instance of this definition is torn down.
    pub fn on_teardown<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Arc<T>) + Send + Sync + 'static,
    {
        self.definition.teardown = Some(Arc::new(move |value: &AnyArc| {
            if let Some(typed) = downcast::<T>(value) {
                hook(&typed);
            }
        }));
        self
    }

    pub fn build(self) -> ComponentDefinition {
        if self.definition.flags.is_disposable()
            && self.definition.flags.contains(LifecycleFlags::SINGLETON)
        {
            tracing::debug!(
                capability = self.definition.capability.name(),
                "DISPOSE overrides SINGLETON; instances will not be retained"
            );
        }
        self.definition
    }
}

impl<T: ?Sized + Dispose + Send + Sync + 'static> DefinitionBuilder<T> {
    /// Tears retained instances down through their [`Dispose`] impl.
    pub fn disposable(self) -> Self {
        self.on_teardown(|value: &Arc<T>| value.dispose())
    }
}

use ferrous_context::{
    ComponentDefinition, Context, Dependencies, Dependency, DiError, DiResult, Factory, FactoryDescriptor,
    Implementation, Injectable, Lazy, Resolver,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

trait Store: Send + Sync {
    fn name(&self) -> String;
}

struct MemoryStore(&'static str);

impl Store for MemoryStore {
    fn name(&self) -> String {
        self.0.to_string()
    }
}

fn store(name: &'static str) -> Implementation<dyn Store> {
    Implementation::from_fn(move |_| Ok(Arc::new(MemoryStore(name)) as Arc<dyn Store>))
}

#[derive(Default)]
struct Handler {
    primary: Option<Arc<dyn Store>>,
    backup: Option<Arc<dyn Store>>,
    retries: Option<Arc<u8>>,
}

impl Injectable for Handler {
    fn dependencies(&self) -> Vec<Dependency> {
        vec![
            Dependency::on::<dyn Store>().qualified("primary"),
            Dependency::on::<dyn Store>().qualified("backup"),
            Dependency::on::<u8>(),
        ]
    }

    fn inject(&mut self, values: &Dependencies) {
        self.primary = values.get::<dyn Store>(0);
        self.backup = values.get::<dyn Store>(1);
        self.retries = values.get::<u8>(2);
    }
}

#[test]
fn inject_fills_what_is_resolvable() {
    let root = Context::root();
    root.bind_qualified("primary", store("disk"));
    root.set_instance(Arc::new(3u8));

    let mut handler = Handler::default();
    assert_eq!(root.inject(&mut handler), 2);
    assert_eq!(handler.primary.unwrap().name(), "disk");
    assert!(handler.backup.is_none());
    assert_eq!(*handler.retries.unwrap(), 3);
}

#[test]
fn inject_leaves_failing_slots_empty() {
    let root = Context::root();
    root.bind_qualified::<dyn Store>(
        "primary",
        Implementation::from_fn(|_| Err(DiError::construction("primary", "offline"))),
    );
    root.bind_qualified("backup", store("tape"));

    let mut handler = Handler::default();
    assert_eq!(root.inject(&mut handler), 1);
    assert!(handler.primary.is_none());
    assert_eq!(handler.backup.unwrap().name(), "tape");
}

#[test]
fn inject_sees_the_closest_binding() {
    let root = Context::root();
    root.bind_qualified("primary", store("root"));
    let child = root.create_child("child");
    child.bind_qualified("primary", store("child"));

    let mut handler = Handler::default();
    child.inject(&mut handler);
    assert_eq!(handler.primary.unwrap().name(), "child");
}

#[test]
fn provider_honours_singleton() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let root = Context::root();
    root.bind_definition(
        ComponentDefinition::builder::<dyn Store>()
            .implementation(Implementation::from_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(MemoryStore("shared")) as Arc<dyn Store>)
            }))
            .singleton()
            .build(),
    );

    let provider = root.create_child("child").get_factory::<dyn Store>().unwrap();
    let a = provider.get().unwrap();
    let b = provider.produce().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert!(root.has_local_instance::<dyn Store>());
}

#[test]
fn provider_without_binding_is_absent() {
    let root = Context::root();
    assert!(root.get_factory::<dyn Store>().is_none());
    assert!(root.get_factory_qualified::<dyn Store>("primary").is_none());
}

#[test]
fn provider_outliving_its_scope_reports_it() {
    let root = Context::root();
    let child = root.create_child("child");
    child.bind(store("temp"));
    let provider = child.get_factory::<dyn Store>().unwrap();
    assert!(provider.is_available());

    drop(child);
    assert!(!provider.is_available());
    assert!(matches!(provider.get(), Err(DiError::ScopeDropped(_))));
}

struct Pool {
    size: usize,
}

struct PoolFactory {
    size: Arc<usize>,
}

impl Factory<Pool> for PoolFactory {
    fn produce(&self) -> DiResult<Arc<Pool>> {
        Ok(Arc::new(Pool { size: *self.size }))
    }
}

#[test]
fn factory_binding_is_built_from_dependencies() {
    let root = Context::root();
    root.set_instance(Arc::new(16usize));
    root.bind_factory(
        FactoryDescriptor::<Pool>::from_fn(|deps| {
            Ok(Arc::new(PoolFactory { size: deps.require::<usize>(0)? }) as Arc<dyn Factory<Pool>>)
        })
        .depends_on(Dependency::on::<usize>()),
    );

    assert_eq!(root.get_required::<Pool>().unwrap().size, 16);
    assert!(root.can_produce_instance::<Pool>());
}

#[test]
fn shared_factory_binding() {
    let root = Context::root();
    let factory: Arc<dyn Factory<Pool>> = Arc::new(PoolFactory { size: Arc::new(2) });
    root.bind_factory_qualified("small", FactoryDescriptor::shared(factory));

    assert_eq!(root.get_required_qualified::<Pool>("small").unwrap().size, 2);
    assert!(root.get::<Pool>().unwrap().is_none());
}

#[test]
fn lazy_dependency_sees_what_exists_at_build_time() {
    struct Report {
        store: Lazy<dyn Store>,
    }

    let root = Context::root();
    root.bind::<Report>(
        Implementation::from_fn(|deps| Ok(Arc::new(Report { store: deps.lazy::<dyn Store>(0) })))
            .depends_on(Dependency::on::<dyn Store>().lazy()),
    );

    let before = root.get_required::<Report>().unwrap();
    assert!(!before.store.is_ready());
    assert!(root.can_produce_instance::<Report>());

    root.bind(store("late"));
    let after = root.get_required::<Report>().unwrap();
    assert_eq!(after.store.get().unwrap().name(), "late");
}

#[test]
fn missing_dependency_names_the_key() {
    struct Consumer;
    let root = Context::root();
    root.bind::<Consumer>(
        Implementation::from_fn(|deps| {
            deps.require::<dyn Store>(0)?;
            Ok(Arc::new(Consumer))
        })
        .depends_on(Dependency::on::<dyn Store>().qualified("primary")),
    );

    match root.get::<Consumer>() {
        Err(DiError::MissingDependency { dependency, .. }) => assert!(dependency.contains("primary")),
        other => panic!("unexpected: {:?}", other.map(|v| v.is_some())),
    }
    assert!(!root.can_produce_instance::<Consumer>());
}

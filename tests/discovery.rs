use ferrous_context::{
    ComponentDefinition, Context, ContextSettings, DefinitionBatch, DiResult, Discovery, Factory, FactoryDescriptor,
    Implementation, Resolver,
};
use std::sync::Arc;

struct Clock(u64);
struct Config {
    name: &'static str,
}

struct StaticRegistry;

impl Discovery for StaticRegistry {
    fn discover(&self) -> DefinitionBatch {
        let mut batch = DefinitionBatch::new();
        batch
            .add_singleton::<Config>(Implementation::from_fn(|_| Ok(Arc::new(Config { name: "static" }))))
            .add_transient::<Clock>(Implementation::from_fn(|_| Ok(Arc::new(Clock(1)))));
        batch
    }
}

#[test]
fn import_from_binds_every_discovered_definition() {
    let root = Context::root();
    let keys = root.import_from(&StaticRegistry);

    assert_eq!(keys.len(), 2);
    assert!(root.has_binding_local::<Config>());
    assert!(root.has_binding_local::<Clock>());
    assert_eq!(root.get_required::<Config>().unwrap().name, "static");
}

#[test]
fn later_definitions_replace_earlier_ones() {
    let batch: DefinitionBatch = [1u64, 2, 3]
        .into_iter()
        .map(|value| {
            ComponentDefinition::builder::<Clock>()
                .implementation(Implementation::from_fn(move |_| Ok(Arc::new(Clock(value)))))
                .build()
        })
        .collect();
    assert_eq!(batch.len(), 3);

    let root = Context::root();
    root.import(batch);
    assert_eq!(root.get_required::<Clock>().unwrap().0, 3);
}

#[test]
fn root_with_seeds_the_tree() {
    let mut batch = DefinitionBatch::new();
    batch.add_factory::<Clock>(FactoryDescriptor::from_fn(|_| {
        Ok(Arc::new(|| -> DiResult<Arc<Clock>> { Ok(Arc::new(Clock(9))) }) as Arc<dyn Factory<Clock>>)
    }));

    let root = Context::root_with(ContextSettings::default(), batch);
    let child = root.create_child("child");
    assert_eq!(child.get_required::<Clock>().unwrap().0, 9);
}

#[test]
fn importing_into_a_child_shadows_the_parent() {
    let root = Context::root();
    root.import_from(&StaticRegistry);

    let mut overrides = DefinitionBatch::new();
    overrides.extend([ComponentDefinition::builder::<Config>()
        .implementation(Implementation::from_fn(|_| Ok(Arc::new(Config { name: "override" }))))
        .build()]);
    let child = root.create_child("child");
    child.import(overrides);

    assert_eq!(child.get_required::<Config>().unwrap().name, "override");
    assert_eq!(root.get_required::<Config>().unwrap().name, "static");
}

#[test]
fn empty_batch_is_a_no_op() {
    let root = Context::root();
    assert!(DefinitionBatch::new().is_empty());
    assert!(root.import(DefinitionBatch::new()).is_empty());
}

use ferrous_context::{Context, Dependency, Implementation, Node, Resolver};
use std::sync::Arc;

trait Logger: Send + Sync {
    fn sink(&self) -> &'static str;
}

struct ConsoleLogger;
impl Logger for ConsoleLogger {
    fn sink(&self) -> &'static str {
        "console"
    }
}

struct FileLogger;
impl Logger for FileLogger {
    fn sink(&self) -> &'static str {
        "file"
    }
}

fn console() -> Implementation<dyn Logger> {
    Implementation::from_fn(|_| Ok(Arc::new(ConsoleLogger) as Arc<dyn Logger>))
}

fn file() -> Implementation<dyn Logger> {
    Implementation::from_fn(|_| Ok(Arc::new(FileLogger) as Arc<dyn Logger>))
}

#[test]
fn logger_scenario() {
    let root = Context::root();
    root.bind_qualified::<dyn Logger>("default", console());
    let child = root.create_child("child");
    child.bind_qualified::<dyn Logger>("default", file());

    assert_eq!(child.get_required_qualified::<dyn Logger>("default").unwrap().sink(), "file");
    assert_eq!(root.get_required_qualified::<dyn Logger>("default").unwrap().sink(), "console");
}

#[test]
fn child_binding_shadows_parent() {
    let root = Context::root();
    root.bind::<String>(Implementation::value(Arc::new("parent".to_string())));
    let child = root.create_child("child");
    child.bind::<String>(Implementation::value(Arc::new("child".to_string())));
    let grandchild = child.create_child("grandchild");

    assert_eq!(*grandchild.get_required::<String>().unwrap(), "child");
    assert_eq!(*child.get_required::<String>().unwrap(), "child");
    assert_eq!(*root.get_required::<String>().unwrap(), "parent");
}

#[test]
fn ancestor_binding_resolves_identically() {
    let root = Context::root();
    let shared = Arc::new(41u64);
    root.set_instance(shared.clone());
    let leaf = root.create_child("a").create_child("b").create_child("c");

    let via_leaf = leaf.get_required::<u64>().unwrap();
    let via_root = root.get_required::<u64>().unwrap();
    assert!(Arc::ptr_eq(&via_leaf, &via_root));
    assert!(Arc::ptr_eq(&via_leaf, &shared));
}

#[test]
fn local_queries_never_delegate() {
    let root = Context::root();
    root.bind::<String>(Implementation::value(Arc::new("root".to_string())));
    let child = root.create_child("child");

    assert!(child.get_local::<String>().unwrap().is_none());
    assert!(!child.has_binding_local::<String>());
    assert!(!child.can_produce_instance_locally::<String>());

    assert!(child.has_binding::<String>());
    assert!(child.can_produce_instance::<String>());
}

#[test]
fn missing_binding_is_an_empty_result() {
    let root = Context::root();
    let child = root.create_child("child");
    assert!(child.get::<String>().unwrap().is_none());
    assert!(child.get_factory::<String>().is_none());
    assert!(!child.has_instance::<String>());
    assert!(!child.can_produce_instance::<String>());
}

#[test]
fn clear_twice_matches_a_fresh_scope() {
    let root = Context::root();
    let other = root.create_child("other");
    other.bind::<u8>(Implementation::value(Arc::new(1)));

    let scope = root.create_child("scope");
    scope.bind::<String>(Implementation::value(Arc::new("x".to_string())));
    scope.set_instance_qualified("port", Arc::new(80u16));
    scope.expose(&other);

    scope.clear();
    scope.clear();

    let fresh = root.create_child("fresh");
    for ctx in [&scope, &fresh] {
        assert!(!ctx.has_binding_local::<String>());
        assert!(!ctx.has_local_instance_qualified::<u16>("port"));
        assert!(ctx.get_local::<String>().unwrap().is_none());
        assert!(ctx.bridges().is_empty());
    }
    assert_eq!(binding_count(&scope), binding_count(&fresh));
}

fn binding_count(ctx: &Context) -> usize {
    match ctx.local_node() {
        Node::Local(local) => local.len(),
        other => panic!("unexpected node {:?}", other),
    }
}

#[test]
fn exposed_sibling_is_visible_one_way() {
    let root = Context::root();
    let left = root.create_child("left");
    let right = root.create_child("right");
    right.bind_qualified::<String>("greeting", Implementation::value(Arc::new("hi".to_string())));

    left.expose(&right);
    assert_eq!(*left.get_required_qualified::<String>("greeting").unwrap(), "hi");
    assert!(left.has_binding_qualified::<String>("greeting"));
    assert!(!left.has_binding_local_qualified::<String>("greeting"));

    let bridges = left.bridges();
    assert_eq!(bridges.len(), 1);
    assert!(bridges[0].connects(right.local_node().id()));
    assert!(!bridges[0].connects(left.local_node().id()));
    assert!(right.bridges().is_empty());
}

#[test]
fn own_binding_beats_exposed_one() {
    let root = Context::root();
    let left = root.create_child("left");
    let right = root.create_child("right");
    left.bind::<String>(Implementation::value(Arc::new("left".to_string())));
    right.bind::<String>(Implementation::value(Arc::new("right".to_string())));
    left.expose(&right);

    assert_eq!(*left.get_required::<String>().unwrap(), "left");
}

#[test]
fn exposure_ends_with_the_exposed_scope() {
    let root = Context::root();
    let left = root.create_child("left");
    {
        let right = root.create_child("right");
        right.bind::<u32>(Implementation::value(Arc::new(3)));
        left.expose(&right);
        assert_eq!(*left.get_required::<u32>().unwrap(), 3);
    }
    assert!(left.get::<u32>().unwrap().is_none());
}

#[test]
fn root_reaches_other_branches_through_the_global_node() {
    let root = Context::root();
    let branch = root.create_child("branch");
    branch.bind::<u32>(Implementation::value(Arc::new(9)));

    assert_eq!(*root.get_required::<u32>().unwrap(), 9);
    let sibling = root.create_child("sibling");
    assert_eq!(*sibling.get_required::<u32>().unwrap(), 9);
}

#[test]
fn rebinding_replaces_in_place() {
    let root = Context::root();
    root.bind::<String>(Implementation::value(Arc::new("first".to_string())));
    root.bind::<String>(Implementation::value(Arc::new("second".to_string())));

    assert_eq!(*root.get_required::<String>().unwrap(), "second");
    assert_eq!(binding_count(&root), 1);
}

#[test]
fn clearing_bindings_by_capability_and_predicate() {
    let root = Context::root();
    root.bind_qualified::<String>("a", Implementation::value(Arc::new("a".to_string())));
    root.bind_qualified::<String>("b", Implementation::value(Arc::new("b".to_string())));
    root.bind::<u8>(Implementation::value(Arc::new(1)));

    assert_eq!(root.clear_bindings_where(|key, _| key.qualifier().as_str() == "a"), 1);
    assert!(!root.has_binding_qualified::<String>("a"));
    assert!(root.has_binding_qualified::<String>("b"));

    assert_eq!(root.clear_bindings_for::<String>(), 1);
    assert!(root.has_binding::<u8>());
    assert!(root.clear_binding::<u8>());
    assert!(!root.clear_binding::<u8>());
}

#[test]
fn scope_paths() {
    let root = Context::root();
    let child = root.create_child("tenant").create_child("request");
    assert_eq!(child.path(), "root/tenant/request");
    assert_eq!(child.depth(), 2);
    assert!(root.parent().is_none());
    assert!(child.clone().same_scope(&child));
}

struct Port(u32);
struct Missing;
struct Gateway;

fn port_needing_missing() -> Implementation<Port> {
    Implementation::from_fn(|deps| {
        deps.require::<Missing>(0)?;
        Ok(Arc::new(Port(0)))
    })
    .depends_on(Dependency::on::<Missing>())
}

#[test]
fn can_produce_falls_through_to_the_parent() {
    let root = Context::root();
    root.bind::<Port>(Implementation::from_fn(|_| Ok(Arc::new(Port(80)))));
    let child = root.create_child("child");
    child.bind::<Port>(port_needing_missing());

    assert!(!child.can_produce_instance_locally::<Port>());
    assert!(root.can_produce_instance::<Port>());
    assert!(child.can_produce_instance::<Port>());
}

#[test]
fn can_produce_checks_dependencies_all_the_way_down() {
    let root = Context::root();
    root.bind::<Port>(port_needing_missing());
    root.bind::<Gateway>(
        Implementation::from_fn(|deps| {
            deps.require::<Port>(0)?;
            Ok(Arc::new(Gateway))
        })
        .depends_on(Dependency::on::<Port>()),
    );

    assert!(root.has_binding::<Port>());
    assert!(!root.can_produce_instance::<Gateway>());
    assert!(root.get::<Gateway>().is_err());

    root.bind::<Missing>(Implementation::from_fn(|_| Ok(Arc::new(Missing))));
    assert!(root.can_produce_instance::<Gateway>());
    assert!(root.get::<Gateway>().unwrap().is_some());
}

#[test]
fn dependency_cycle_cannot_produce() {
    struct Left;
    struct Right;
    let root = Context::root();
    root.bind::<Left>(
        Implementation::from_fn(|deps| {
            deps.require::<Right>(0)?;
            Ok(Arc::new(Left))
        })
        .depends_on(Dependency::on::<Right>()),
    );
    root.bind::<Right>(
        Implementation::from_fn(|deps| {
            deps.require::<Left>(0)?;
            Ok(Arc::new(Right))
        })
        .depends_on(Dependency::on::<Left>()),
    );

    assert!(!root.can_produce_instance::<Left>());
    assert!(root.get::<Left>().is_err());
}

use ferrous_context::{ComponentDefinition, Context, ContextSettings, DiError, Dependency, Implementation, Resolver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

struct A;
struct B;

fn needs<T: Send + Sync + 'static, D: Send + Sync + 'static>(value: fn() -> T) -> Implementation<T> {
    Implementation::from_fn(move |deps| {
        deps.require::<D>(0)?;
        Ok(Arc::new(value()))
    })
    .depends_on(Dependency::on::<D>())
}

fn expect_cycle<T: Send + Sync + 'static>(scope: &Context) -> Vec<String> {
    match scope.get::<T>() {
        Err(DiError::Circular(path)) => path,
        other => panic!("expected a cycle, got {:?}", other.map(|v| v.is_some())),
    }
}

#[test]
fn self_dependency() {
    let root = Context::root();
    root.bind(needs::<A, A>(|| A));

    let path = expect_cycle::<A>(&root);
    assert_eq!(path.len(), 2);
    assert!(path.iter().all(|name| name.ends_with("A")));
}

#[test]
fn two_component_cycle_reports_the_full_path() {
    let root = Context::root();
    root.bind(needs::<A, B>(|| A));
    root.bind(needs::<B, A>(|| B));

    let path = expect_cycle::<A>(&root);
    assert_eq!(path.len(), 3);
    assert!(path[0].ends_with("A"));
    assert!(path[1].ends_with("B"));
    assert!(path[2].ends_with("A"));
}

#[test]
fn cycle_between_singletons_does_not_deadlock() {
    let root = Context::root();
    root.bind_definition(ComponentDefinition::builder::<A>().implementation(needs::<A, B>(|| A)).singleton().build());
    root.bind_definition(ComponentDefinition::builder::<B>().implementation(needs::<B, A>(|| B)).singleton().build());

    expect_cycle::<A>(&root);
    expect_cycle::<B>(&root);
    assert!(!root.has_local_instance::<A>());
    assert!(!root.has_local_instance::<B>());
}

#[test]
fn cycle_across_scopes() {
    let root = Context::root();
    let child = root.create_child("child");
    child.bind(needs::<A, B>(|| A));
    root.bind(needs::<B, A>(|| B));

    let path = expect_cycle::<A>(&child);
    assert_eq!(path.len(), 3);
}

#[test]
fn lazy_edge_breaks_the_cycle() {
    let root = Context::root();
    root.bind::<A>(
        Implementation::from_fn(|deps| {
            assert!(!deps.lazy::<B>(0).is_ready());
            Ok(Arc::new(A))
        })
        .depends_on(Dependency::on::<B>().lazy()),
    );
    root.bind(needs::<B, A>(|| B));

    assert!(root.get::<A>().unwrap().is_some());
}

#[test]
fn failure_leaves_the_stack_clean() {
    let root = Context::root();
    root.bind(needs::<A, A>(|| A));
    root.set_instance(Arc::new(7u8));

    expect_cycle::<A>(&root);
    expect_cycle::<A>(&root);
    assert_eq!(*root.get_required::<u8>().unwrap(), 7);
}

#[test]
fn deep_chains_hit_the_depth_limit() {
    let root = Context::with_settings(ContextSettings::new().max_depth(4));
    for level in 0..8u32 {
        let next = (level + 1).to_string();
        root.bind_qualified::<u32>(
            level.to_string(),
            Implementation::from_fn(move |deps| Ok(Arc::new(*deps.require::<u32>(0)? + 1)))
                .depends_on(Dependency::on::<u32>().qualified(next)),
        );
    }
    root.set_instance_qualified("8", Arc::new(0u32));

    assert!(matches!(root.get_qualified::<u32>("0"), Err(DiError::DepthExceeded(4))));
    assert_eq!(*root.get_required_qualified::<u32>("5").unwrap(), 3);
}

struct Gate;
struct X;
struct Y;

/// Depends on `Gate` first, then on `D`.
fn gated<T: Send + Sync + 'static, D: Send + Sync + 'static>(value: fn() -> T) -> Implementation<T> {
    Implementation::from_fn(move |deps| {
        deps.require::<Gate>(0)?;
        deps.require::<D>(1)?;
        Ok(Arc::new(value()))
    })
    .depends_on(Dependency::on::<Gate>())
    .depends_on(Dependency::on::<D>())
}

#[test]
fn singleton_cycle_started_on_two_threads_fails_on_both() {
    let root = Context::root();

    // The first two builds of Gate meet here, so each thread is inside its
    // own singleton before asking for the other one.
    let barrier = Arc::new(Barrier::new(2));
    let arrivals = Arc::new(AtomicUsize::new(0));
    root.bind::<Gate>(Implementation::from_fn(move |_| {
        if arrivals.fetch_add(1, Ordering::SeqCst) < 2 {
            barrier.wait();
        }
        Ok(Arc::new(Gate))
    }));
    root.bind_definition(ComponentDefinition::builder::<X>().implementation(gated::<X, Y>(|| X)).singleton().build());
    root.bind_definition(ComponentDefinition::builder::<Y>().implementation(gated::<Y, X>(|| Y)).singleton().build());

    let (tx, rx) = mpsc::channel();
    for first in [true, false] {
        let scope = root.clone();
        let tx = tx.clone();
        thread::spawn(move || {
            let outcome = if first {
                scope.get::<X>().map(|x| x.is_some())
            } else {
                scope.get::<Y>().map(|y| y.is_some())
            };
            tx.send(outcome).unwrap();
        });
    }

    for _ in 0..2 {
        let outcome = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("both threads return instead of blocking");
        assert!(matches!(outcome, Err(DiError::Circular(_))), "got {:?}", outcome);
    }
    assert!(!root.has_local_instance::<X>());
    assert!(!root.has_local_instance::<Y>());
}

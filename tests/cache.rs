use ferrous_context::{Capability, Context, ContextSettings, Implementation, Matcher, Resolver};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Port(u32);

fn port(value: u32) -> Implementation<Port> {
    Implementation::from_fn(move |_| Ok(Arc::new(Port(value))))
}

#[test]
fn sibling_binding_is_found_through_the_global_node() {
    let root = Context::root();
    let a = root.create_child("a");
    let b = root.create_child("b");
    b.bind(port(8080));

    assert_eq!(a.get_required::<Port>().unwrap().0, 8080);
    assert!(a.get_local::<Port>().unwrap().is_none());
}

#[test]
fn negative_answer_is_dropped_by_a_later_bind() {
    let root = Context::root();
    let a = root.create_child("a");
    let b = root.create_child("b");

    assert!(a.get::<Port>().unwrap().is_none());
    assert!(a.get::<Port>().unwrap().is_none());

    b.bind(port(1));
    assert_eq!(a.get_required::<Port>().unwrap().0, 1);
}

#[test]
fn rebinding_is_seen_immediately() {
    let root = Context::root();
    let a = root.create_child("a");
    let b = root.create_child("b");

    b.bind(port(1));
    assert_eq!(a.get_required::<Port>().unwrap().0, 1);

    b.bind(port(2));
    assert_eq!(a.get_required::<Port>().unwrap().0, 2);

    assert!(b.clear_binding::<Port>());
    assert!(a.get::<Port>().unwrap().is_none());
}

#[test]
fn dropped_scope_is_no_longer_reachable() {
    let root = Context::root();
    let a = root.create_child("a");
    let b = root.create_child("b");
    b.bind(port(3));
    assert!(a.has_binding::<Port>());

    drop(b);
    assert!(!a.has_binding::<Port>());
    assert!(a.get::<Port>().unwrap().is_none());
}

#[test]
fn repeated_lookups_hit_the_cache() {
    let root = Context::root();
    let a = root.create_child("a");
    let b = root.create_child("b");
    b.bind(port(4));

    for _ in 0..5 {
        assert!(a.has_binding::<Port>());
    }

    let stats = root.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 4);
    assert!(stats.hit_rate() > 0.5);
}

#[test]
fn the_origin_is_never_asked_twice() {
    let root = Context::root();
    let only = root.create_child("only");
    only.bind(port(5));

    // The root's own table is searched before the broadcast, which skips it.
    let calls = Arc::new(AtomicU32::new(0));
    let seen = calls.clone();
    let matcher = Matcher::custom(move |node| {
        seen.fetch_add(1, Ordering::SeqCst);
        node.key().capability() == Capability::of::<Port>()
    });

    assert!(root.lookup(&matcher).is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Cached: the predicate is not run again.
    assert!(root.lookup(&matcher).is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn cloned_matchers_share_entries_but_new_ones_do_not() {
    let root = Context::root();
    let child = root.create_child("child");
    child.bind(port(7));

    let first = Matcher::custom(|node| node.key().qualifier().as_str().contains("Port"));
    let again = first.clone();
    let other = Matcher::custom(|node| node.key().qualifier().as_str().contains("Port"));
    assert_eq!(first.key(), again.key());
    assert_ne!(first.key(), other.key());

    assert!(root.lookup(&first).is_some());
    assert!(root.lookup(&again).is_some());
    assert!(root.lookup(&other).is_some());
    let stats = root.cache_stats();
    assert_eq!((stats.hits, stats.misses), (1, 2));
}

#[test]
fn panicking_matcher_reports_not_found() {
    let root = Context::root();
    let child = root.create_child("child");
    child.bind(port(8));

    let matcher = Matcher::custom(|_| panic!("matcher blew up"));
    assert!(root.lookup(&matcher).is_none());
    assert_eq!(root.cache_stats().failures, 1);

    // Not cached: the next attempt runs again and fails again.
    assert!(root.lookup(&matcher).is_none());
    assert_eq!(root.cache_stats().failures, 2);
}

#[test]
fn small_cache_stays_correct() {
    let root = Context::with_settings(
        ContextSettings::new()
            .cache_capacity(2)
            .concurrency_level(1)
            .cache_idle(Duration::from_secs(30)),
    );
    let a = root.create_child("a");
    let b = root.create_child("b");
    b.bind_qualified("http", port(80));
    b.bind_qualified("https", port(443));
    b.bind_qualified("ssh", port(22));

    for _ in 0..3 {
        assert_eq!(a.get_required_qualified::<Port>("http").unwrap().0, 80);
        assert_eq!(a.get_required_qualified::<Port>("https").unwrap().0, 443);
        assert_eq!(a.get_required_qualified::<Port>("ssh").unwrap().0, 22);
    }
    assert!(root.cache_stats().evictions > 0);
}

#[test]
fn zero_idle_expires_every_entry() {
    let root = Context::with_settings(ContextSettings::new().cache_idle(Duration::ZERO));
    let a = root.create_child("a");
    let b = root.create_child("b");
    b.bind(port(9));

    assert!(a.has_binding::<Port>());
    std::thread::sleep(Duration::from_millis(5));
    assert!(a.has_binding::<Port>());
    assert!(root.cache_stats().expirations >= 1);
}

#[test]
fn short_lived_empty_scopes_keep_the_cache_warm() {
    let root = Context::root();
    let a = root.create_child("a");
    let b = root.create_child("b");
    b.bind(port(10));

    assert!(a.has_binding::<Port>());
    for i in 0..3 {
        let request = a.create_child(format!("request-{i}"));
        assert!(request.has_binding::<Port>());
    }

    let stats = root.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 3);
}

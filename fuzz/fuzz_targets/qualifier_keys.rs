#![no_main]

use ferrous_context::{Context, Implementation, Resolver};
use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;
use std::sync::Arc;

// Arbitrary qualifier strings must behave as opaque keys.
fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let root = Context::root();
    let child = root.create_child("child");
    let mut expected = HashMap::new();

    for (index, qualifier) in text.split('\0').take(32).enumerate() {
        let scope = if index % 2 == 0 { &root } else { &child };
        scope.bind_qualified::<usize>(qualifier, Implementation::from_fn(move |_| Ok(Arc::new(index))));
        expected.insert((index % 2, qualifier.to_string()), index);
    }

    for ((parity, qualifier), index) in &expected {
        let child_view = *child.get_required_qualified::<usize>(qualifier.as_str()).unwrap();
        if *parity == 1 {
            assert_eq!(child_view, *index);
        } else if !expected.contains_key(&(1, qualifier.clone())) {
            assert_eq!(child_view, *index);
        }

        if *parity == 0 {
            assert_eq!(*root.get_required_qualified::<usize>(qualifier.as_str()).unwrap(), *index);
        }
    }
});

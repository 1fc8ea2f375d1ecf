#![no_main]

use ferrous_context::{ComponentDefinition, Context, Implementation, LifecycleFlags, Resolver};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

const QUALIFIERS: [&str; 4] = ["a", "b", "c", "d"];

fn definition(qualifier: &str, value: u8, flags: u8) -> ComponentDefinition {
    ComponentDefinition::builder::<u8>()
        .qualifier(qualifier)
        .implementation(Implementation::from_fn(move |_| Ok(Arc::new(value))))
        .flags(LifecycleFlags::from_bits_truncate(u32::from(flags) & 0b1101))
        .build()
}

// Each pair of bytes is one operation on a small, growing scope tree.
fuzz_target!(|data: &[u8]| {
    let mut scopes = vec![Context::root()];

    for op in data.chunks_exact(2) {
        let (code, arg) = (op[0], op[1]);
        let scope = scopes[usize::from(arg) % scopes.len()].clone();
        let qualifier = QUALIFIERS[usize::from(code >> 4) % QUALIFIERS.len()];

        match code % 10 {
            0 if scopes.len() < 16 => {
                let child = scope.create_child(format!("s{}", scopes.len()));
                scopes.push(child);
            }
            1 => {
                scope.bind_definition(definition(qualifier, arg, code));
                // Own bindings always shadow everything else.
                let value = scope.get_qualified::<u8>(qualifier).unwrap();
                assert_eq!(value.map(|v| *v), Some(arg));
            }
            2 => {
                scope.clear_binding_qualified::<u8>(qualifier);
                assert!(!scope.has_binding_local_qualified::<u8>(qualifier));
            }
            3 => {
                scope.set_instance_qualified(qualifier, Arc::new(arg));
                assert_eq!(*scope.get_local_qualified::<u8>(qualifier).unwrap().unwrap(), arg);
            }
            4 => {
                scope.remove_instance_qualified::<u8>(qualifier);
                assert!(!scope.has_local_instance_qualified::<u8>(qualifier));
            }
            5 => {
                let other = scopes[usize::from(code) % scopes.len()].clone();
                scope.expose(&other);
            }
            6 => {
                scope.clear();
                assert!(scope.bridges().is_empty());
                assert!(!scope.has_binding_local_qualified::<u8>(qualifier));
            }
            7 if scopes.len() > 1 => {
                // Drops our handle; children keep their ancestors alive.
                let index = 1 + usize::from(arg) % (scopes.len() - 1);
                scopes.remove(index);
            }
            8 => {
                let _ = scope.initialize();
            }
            _ => {
                let found = scope.get_qualified::<u8>(qualifier).unwrap().is_some();
                assert_eq!(found, scope.has_binding_qualified::<u8>(qualifier) || scope.has_instance_qualified::<u8>(qualifier));
            }
        }
    }
});

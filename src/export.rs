//! Serializable snapshots of a scope, for debugging and tooling.

use serde::Serialize;

use crate::context::Context;
use crate::lifecycle::InitializationStrategy;

/// One binding of a scope as seen at snapshot time.
#[derive(Debug, Clone, Serialize)]
pub struct BindingSnapshot {
    pub capability: String,
    pub qualifier: String,
    /// The qualifier was set explicitly rather than derived
    pub qualified: bool,
    pub implementation: Option<String>,
    pub factory: Option<String>,
    pub flags: Vec<&'static str>,
    pub order: i32,
    pub strategy: InitializationStrategy,
    pub constraints: Vec<String>,
    /// Declared dependencies, by capability name
    pub dependencies: Vec<String>,
    pub has_instance: bool,
}

/// Point-in-time view of one scope.
///
/// ```rust
/// use ferrous_context::{Context, Implementation};
/// use std::sync::Arc;
///
/// let root = Context::root();
/// root.bind_qualified::<u16>("port", Implementation::value(Arc::new(8080)));
///
/// let snapshot = root.create_child("worker").snapshot();
/// assert_eq!(snapshot.path, "root/worker");
/// assert!(snapshot.bindings.is_empty());
///
/// let json = root.snapshot().to_json().unwrap();
/// assert!(json.contains("\"qualifier\": \"port\""));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ScopeSnapshot {
    pub label: String,
    pub path: String,
    pub depth: usize,
    pub bindings: Vec<BindingSnapshot>,
    pub bridges: usize,
}

impl ScopeSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Context {
    pub fn snapshot(&self) -> ScopeSnapshot {
        let bindings = self
            .local()
            .nodes()
            .iter()
            .map(|node| {
                let definition = node.definition();
                BindingSnapshot {
                    capability: node.key().capability().name().to_string(),
                    qualifier: node.key().qualifier().to_string(),
                    qualified: definition.is_qualified(),
                    implementation: definition.implementation_name().map(str::to_string),
                    factory: definition.factory_name().map(str::to_string),
                    flags: definition.flags().names(),
                    order: definition.order(),
                    strategy: definition.strategy(),
                    constraints: definition.constraints().iter().map(|m| m.name().to_string()).collect(),
                    dependencies: definition
                        .dependencies()
                        .iter()
                        .map(|d| d.capability().name().to_string())
                        .collect(),
                    has_instance: self.has_local_instance_key(node.key()),
                }
            })
            .collect();

        ScopeSnapshot {
            label: self.label().to_string(),
            path: self.path(),
            depth: self.depth(),
            bindings,
            bridges: self.bridges().len(),
        }
    }
}

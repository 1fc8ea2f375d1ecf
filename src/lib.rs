//! # ferrous-context
//!
//! Hierarchical dependency-resolution scopes for Rust.
//!
//! A tree of [`Context`] scopes binds capabilities (usually trait objects)
//! plus a qualifier string to component definitions. A lookup searches the
//! scope it was issued on first, then its ancestors, and finally every other
//! scope of the tree through a shared, cached routing node.
//!
//! ## Features
//!
//! - **Scoped precedence**: a child's binding shadows its parent's
//! - **Qualifiers**: several bindings of one capability, told apart by name
//! - **Lifecycle flags**: singleton, retained, always-fresh and instance-capped components
//! - **Eager initialization**: ordered, constraint-gated construction at scope start
//! - **Sibling exposure**: one-way bridges between unrelated scopes
//! - **Thread-safe**: every operation takes `&self`; singletons are built once under contention
//! - **Circular dependency detection**: failures carry the full path
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_context::{ComponentDefinition, Context, Dependency, Implementation, Resolver};
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let root = Context::root();
//! root.set_instance(Arc::new(Database { url: "postgres://localhost".into() }));
//! root.bind_definition(
//!     ComponentDefinition::builder::<UserService>()
//!         .implementation(
//!             Implementation::from_fn(|deps| Ok(Arc::new(UserService { db: deps.require::<Database>(0)? })))
//!                 .depends_on(Dependency::on::<Database>()),
//!         )
//!         .singleton()
//!         .build(),
//! );
//!
//! let request = root.create_child("request");
//! let users = request.get_required::<UserService>().unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! assert!(Arc::ptr_eq(&users, &root.get_required::<UserService>().unwrap()));
//! ```
//!
//! ## Lifecycles
//!
//! - **SINGLETON**: built once per owning scope, even when many threads ask at once
//! - **RETAIN**: kept once built; concurrent first requests may race, the first stored wins
//! - **DISPOSE**: a fresh instance on every request, never kept
//! - **LIMIT**: at most `n` live instances at a time
//! - no flags: transient
//!
//! ## Eager Initialization
//!
//! ```rust
//! use ferrous_context::{constraint_fn, ComponentDefinition, Context, ContextSettings, Implementation, Marker};
//! use std::sync::Arc;
//!
//! struct Metrics;
//!
//! let root = Context::with_settings(
//!     ContextSettings::new().constraint("feature", constraint_fn(|marker, _| marker.get("enabled") == Some("yes"))),
//! );
//! root.bind_definition(
//!     ComponentDefinition::builder::<Metrics>()
//!         .implementation(Implementation::from_fn(|_| Ok(Arc::new(Metrics))))
//!         .singleton()
//!         .eager()
//!         .constraint(Marker::new("feature").arg("enabled", "no"))
//!         .build(),
//! );
//!
//! let report = root.initialize();
//! assert_eq!(report.skipped.len(), 1);
//! assert!(!root.has_local_instance::<Metrics>());
//! ```

pub mod cache;
pub mod constraint;
pub mod context;
pub mod definition;
pub mod discovery;
pub mod eager;
pub mod error;
pub mod graph;
pub mod key;
pub mod lifecycle;
pub mod observer;
pub mod settings;
pub mod traits;

#[cfg(feature = "graph-export")]
pub mod export;

mod internal;

pub use cache::{CacheStats, ResolutionCache};
pub use constraint::{constraint_fn, Constraint, ConstraintRegistry, Marker, Verdict};
pub use context::{Context, Injectable, Provider};
pub use definition::{
    downcast, erase, AnyArc, ComponentDefinition, DefinitionBuilder, Dependencies, Dependency, Factory,
    FactoryDescriptor, Implementation, Lazy,
};
pub use discovery::{DefinitionBatch, Discovery};
pub use eager::{EagerReport, SkipReason, Skipped};
pub use error::{DiError, DiResult};
pub use graph::{BridgeNode, ComponentNode, GlobalNode, LocalNode, Matcher, MatcherKey, Node, NodeId};
pub use key::{BindingKey, Capability, CapabilityRegistry, DefaultQualifier, Qualifier};
pub use lifecycle::{InitializationStrategy, LifecycleFlags};
pub use observer::{ContextObserver, LoggingObserver};
pub use settings::ContextSettings;
pub use traits::{Dispose, Resolver, ResolverCore};

#[cfg(feature = "config")]
pub use settings::CacheSettings;

#[cfg(feature = "graph-export")]
pub use export::{BindingSnapshot, ScopeSnapshot};

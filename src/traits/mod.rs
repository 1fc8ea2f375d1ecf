//! Core traits for resolution and teardown.

mod dispose;
mod resolver;

pub use dispose::Dispose;
pub use resolver::{Resolver, ResolverCore};

//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod teardown_bag;

pub(crate) use circular::{BuildTracker, StackGuard};
pub(crate) use teardown_bag::TeardownBag;

#[cfg(feature = "ahash")]
pub(crate) type FastMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
#[cfg(not(feature = "ahash"))]
pub(crate) type FastMap<K, V> = std::collections::HashMap<K, V>;

#[cfg(feature = "ahash")]
pub(crate) type FastState = ahash::RandomState;
#[cfg(not(feature = "ahash"))]
pub(crate) type FastState = std::collections::hash_map::RandomState;

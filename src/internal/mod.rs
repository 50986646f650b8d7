//! Internal implementation details.

pub(crate) mod build_lock;
pub(crate) mod circular;

pub use circular::{CircularDependencyValidator, MAX_RESOLVE_DEPTH};
pub(crate) use build_lock::BuildLock;
pub(crate) use circular::ConstructionGuard;

#[cfg(feature = "ahash")]
pub(crate) type FastMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
#[cfg(not(feature = "ahash"))]
pub(crate) type FastMap<K, V> = std::collections::HashMap<K, V>;

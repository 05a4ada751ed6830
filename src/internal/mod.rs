//! Internal implementation details.

pub(crate) mod destroy_bag;
pub(crate) mod resolution;
pub(crate) mod waits;

pub(crate) use destroy_bag::{BoxFutureUnit, DestroyBag, DestroyEntry};
pub(crate) use resolution::ResolutionContext;

#[cfg(feature = "ahash")]
pub(crate) type Map<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
#[cfg(not(feature = "ahash"))]
pub(crate) type Map<K, V> = std::collections::HashMap<K, V>;

#[cfg(feature = "ahash")]
pub(crate) type Set<T> = std::collections::HashSet<T, ahash::RandomState>;
#[cfg(not(feature = "ahash"))]
pub(crate) type Set<T> = std::collections::HashSet<T>;

//! Component scope definitions.

use std::fmt;
use std::sync::Arc;

/// Name of the container-lifetime store.
pub const SINGLETON_SCOPE: &str = "singleton";

/// Scopes controlling instance reuse.
///
/// # Examples
///
/// ```rust
/// use ferrous_context::{ApplicationContext, Resolver, Scope};
/// use std::sync::Arc;
///
/// struct Connection;
/// struct Request;
///
/// let ctx = ApplicationContext::new();
/// ctx.bind::<Connection>().scope(Scope::Singleton).to(|_| Ok(Connection)).unwrap();
/// ctx.bind::<Request>().scope(Scope::named("request")).to(|_| Ok(Request)).unwrap();
///
/// let a = ctx.get::<Connection>().unwrap();
/// let b = ctx.get::<Connection>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// // Named scopes only resolve inside an active scope
/// assert!(ctx.get::<Request>().is_err());
/// let request = ctx.enter_scope("request");
/// assert!(request.get::<Request>().is_ok());
/// request.close();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One instance per key for the life of the context.
    ///
    /// Created lazily on first resolution; pre-destroy hooks run on
    /// `ApplicationContext::close` in reverse construction order.
    Singleton,
    /// New instance per request, never cached.
    ///
    /// The caller owns the instance; the context runs no destroy hooks for it.
    Prototype,
    /// One instance per active store of the given name (e.g. per request).
    ///
    /// The store is supplied by a [`ScopedContext`](crate::ScopedContext); resolving
    /// outside of one fails with `ScopeNotActive`.
    Named(Arc<str>),
}

impl Scope {
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Scope::Named(name.into())
    }

    /// Returns `true` if instances are cached in some store.
    #[inline]
    pub fn is_cached(&self) -> bool {
        !matches!(self, Scope::Prototype)
    }

    /// Store name backing this scope, `None` for prototypes.
    pub fn store_name(&self) -> Option<&str> {
        match self {
            Scope::Singleton => Some(SINGLETON_SCOPE),
            Scope::Prototype => None,
            Scope::Named(name) => Some(name),
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::Singleton
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Singleton => f.write_str("singleton"),
            Scope::Prototype => f.write_str("prototype"),
            Scope::Named(name) => write!(f, "scope({})", name),
        }
    }
}

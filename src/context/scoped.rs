//! Named-scope contexts.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::ApplicationContext;
use crate::error::ContainerResult;
use crate::instance::Instance;
use crate::key::ComponentKey;
use crate::store::ScopeStore;
use crate::traits::ResolverCore;

/// A resolver with one or more named scopes active.
///
/// Bindings in a named scope share one instance per open `ScopedContext`
/// for that name. Nested scopes see their parents' stores; the innermost
/// store wins when names repeat.
///
/// # Examples
///
/// ```
/// use ferrous_context::{ApplicationContext, Resolver};
/// use std::sync::Arc;
///
/// struct RequestId(u64);
///
/// let ctx = ApplicationContext::new();
/// ctx.bind::<RequestId>().in_scope("request").to(|_| Ok(RequestId(7))).unwrap();
///
/// let request = ctx.enter_scope("request");
/// let a = request.get::<RequestId>().unwrap();
/// let b = request.get::<RequestId>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// let other = ctx.enter_scope("request");
/// assert!(!Arc::ptr_eq(&a, &other.get::<RequestId>().unwrap()));
///
/// request.close();
/// other.close();
/// ```
pub struct ScopedContext {
    context: ApplicationContext,
    store: Arc<ScopeStore>,
    stores: Vec<Arc<ScopeStore>>,
}

impl ScopedContext {
    pub(crate) fn new(context: ApplicationContext, parents: &[Arc<ScopeStore>], name: Arc<str>) -> Self {
        let store = ScopeStore::new(name);
        let mut stores = parents.to_vec();
        stores.push(store.clone());
        debug!(scope = store.name(), depth = stores.len(), "scope opened");
        Self {
            context,
            store,
            stores,
        }
    }

    /// Name of the innermost scope.
    pub fn name(&self) -> &str {
        self.store.name()
    }

    pub fn store(&self) -> &Arc<ScopeStore> {
        &self.store
    }

    pub fn context(&self) -> &ApplicationContext {
        &self.context
    }

    /// Opens a nested scope that also sees this scope's stores.
    pub fn enter_scope(&self, name: impl Into<Arc<str>>) -> ScopedContext {
        ScopedContext::new(self.context.clone(), &self.stores, name.into())
    }

    /// Runs this scope's pre-destroy hooks in reverse construction order and
    /// releases its instances. Parent scopes stay open.
    pub fn close(&self) {
        self.store.close();
    }

    pub async fn close_async(&self) {
        self.store.close_async().await;
    }

    pub fn is_closed(&self) -> bool {
        self.store.is_closed()
    }
}

impl ResolverCore for ScopedContext {
    fn resolve_instance(&self, key: &ComponentKey, optional: bool) -> ContainerResult<Option<Instance>> {
        self.context.inner().resolve_root(key, optional, &self.stores)
    }
}

impl Drop for ScopedContext {
    fn drop(&mut self) {
        if self.store.is_closed() || !self.context.options().warn_on_unclosed {
            return;
        }
        let pending = self.store.pending_destroy();
        if pending > 0 {
            warn!(scope = self.store.name(), pending, "scope dropped without close(); pre-destroy hooks not run");
        }
    }
}

impl std::fmt::Debug for ScopedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedContext")
            .field("scopes", &self.stores.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("closed", &self.is_closed())
            .finish()
    }
}

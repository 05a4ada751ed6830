//! The application context facade.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::binding::{BindingBuilder, BindingRegistry, ConditionContext};
use crate::descriptors::BindingDescriptor;
use crate::error::{ContainerError, ContainerResult};
use crate::instance::Instance;
use crate::internal::ResolutionContext;
use crate::key::ComponentKey;
use crate::lifecycle::{LifecycleCoordinator, PostProcessor};
use crate::observer::{ContainerObserver, Observers};
use crate::options::ContextOptions;
use crate::properties::Properties;
use crate::proxy::ProxyFactory;
use crate::resolver::ComponentResolver;
use crate::scope::Scope;
use crate::store::{ScopeManager, ScopeStore};
use crate::traits::ResolverCore;
use crate::validation::{self, ValidationReport};

pub(crate) mod resolver_context;
mod scoped;

pub use resolver_context::ResolverContext;
pub use scoped::ScopedContext;

pub(crate) struct ContextInner {
    pub(crate) registry: BindingRegistry,
    pub(crate) scopes: ScopeManager,
    pub(crate) lifecycle: LifecycleCoordinator,
    pub(crate) proxies: ProxyFactory,
    pub(crate) properties: Properties,
    pub(crate) observers: Observers,
    pub(crate) options: ContextOptions,
    closed: AtomicBool,
}

impl ContextInner {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Entry point of every top-level resolution.
    pub(crate) fn resolve_root(
        &self,
        key: &ComponentKey,
        optional: bool,
        scopes: &[Arc<ScopeStore>],
    ) -> ContainerResult<Option<Instance>> {
        if self.is_closed() {
            return Err(ContainerError::Closed { key: key.clone() });
        }
        if self.options.seal_on_first_get {
            self.registry.seal();
        }
        let rc = ResolutionContext::new(self.options.max_depth, scopes);
        ComponentResolver::new(self).resolve(key, &rc, optional)
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        if self.options.warn_on_unclosed && !self.is_closed() {
            let pending = self.scopes.singletons().pending_destroy();
            if pending > 0 {
                warn!(pending, "application context dropped without close(); pre-destroy hooks not run");
            }
        }
    }
}

/// The container facade: binds components and resolves them.
///
/// Cloning is cheap and every clone shares the same bindings and instances.
/// Bind everything during startup, then resolve from any thread.
///
/// # Examples
///
/// ```
/// use ferrous_context::{ApplicationContext, Resolver};
/// use std::sync::Arc;
///
/// trait Clock: Send + Sync {
///     fn now(&self) -> u64;
/// }
///
/// struct SystemClock;
/// impl Clock for SystemClock {
///     fn now(&self) -> u64 { 1_700_000_000 }
/// }
///
/// struct Greeter {
///     clock: Arc<dyn Clock>,
/// }
///
/// let ctx = ApplicationContext::new();
/// ctx.bind::<dyn Clock>().singleton().to_arc(|_| Ok(Arc::new(SystemClock))).unwrap();
/// ctx.bind::<Greeter>()
///     .prototype()
///     .depends_on::<dyn Clock>()
///     .to(|r| Ok(Greeter { clock: r.get::<dyn Clock>()? }))
///     .unwrap();
///
/// let a = ctx.get::<Greeter>().unwrap();
/// let b = ctx.get::<Greeter>().unwrap();
/// assert!(!Arc::ptr_eq(&a, &b));
/// assert!(Arc::ptr_eq(&a.clock, &b.clock));
///
/// ctx.close();
/// ```
#[derive(Clone)]
pub struct ApplicationContext {
    inner: Arc<ContextInner>,
}

impl ApplicationContext {
    pub fn new() -> Self {
        Self::with_options(ContextOptions::default())
    }

    pub fn with_options(options: ContextOptions) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                registry: BindingRegistry::new(),
                scopes: ScopeManager::new(),
                lifecycle: LifecycleCoordinator::new(),
                proxies: ProxyFactory::new(),
                properties: Properties::new(),
                observers: Observers::default(),
                options,
                closed: AtomicBool::new(false),
            }),
        }
    }

    #[inline]
    pub(crate) fn inner(&self) -> &ContextInner {
        &self.inner
    }

    pub fn options(&self) -> &ContextOptions {
        &self.inner.options
    }

    /// Starts a binding for `T`, which may be a concrete type or `dyn Trait`.
    pub fn bind<T: ?Sized + Send + Sync + 'static>(&self) -> BindingBuilder<'_, T> {
        BindingBuilder::new(&self.inner)
    }

    /// Adds a post-processor to the lifecycle pipeline.
    pub fn add_post_processor<P: PostProcessor + 'static>(&self, processor: P) {
        self.inner.lifecycle.add(Arc::new(processor));
    }

    pub fn add_observer<O: ContainerObserver + 'static>(&self, observer: O) {
        self.inner.observers.add(Arc::new(observer));
    }

    /// Publishes an ambient value, under `V`'s type name when unnamed.
    ///
    /// The container never interprets these values itself; conditions and
    /// providers read them back.
    pub fn add_context<V: Send + Sync + 'static>(&self, name: Option<&str>, value: V) {
        self.inner.properties.insert(name, value);
    }

    /// Publishes a value whose `Display` form property conditions compare.
    pub fn add_context_display<V: std::fmt::Display + Send + Sync + 'static>(&self, name: Option<&str>, value: V) {
        self.inner.properties.insert_display(name, value);
    }

    /// Value published under `name`, if present and of type `V`.
    pub fn property<V: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<V>> {
        self.inner.properties.get::<V>(name)
    }

    /// Value published without a name for type `V`.
    pub fn context_value<V: Send + Sync + 'static>(&self) -> Option<Arc<V>> {
        self.inner.properties.get_typed::<V>()
    }

    pub fn properties(&self) -> &Properties {
        &self.inner.properties
    }

    pub fn registry(&self) -> &BindingRegistry {
        &self.inner.registry
    }

    pub fn proxy_factory(&self) -> &ProxyFactory {
        &self.inner.proxies
    }

    /// The container-lifetime store.
    pub fn singletons(&self) -> &Arc<ScopeStore> {
        self.inner.scopes.singletons()
    }

    /// Opens a store for the named scope.
    ///
    /// Resolutions through the returned context see the store; close it to
    /// run the scope's pre-destroy hooks.
    pub fn enter_scope(&self, name: impl Into<Arc<str>>) -> ScopedContext {
        ScopedContext::new(self.clone(), &[], name.into())
    }

    /// Constructs every eager singleton.
    ///
    /// Bindings are initialized by descending processing priority, then
    /// registration order. Returns how many instances were constructed.
    pub fn prewarm(&self) -> ContainerResult<usize> {
        let mut eager: Vec<_> = self
            .inner
            .registry
            .bindings()
            .into_iter()
            .filter(|b| b.eager && b.scope == Scope::Singleton)
            .collect();
        eager.sort_by(|a, b| {
            b.metadata
                .processing_priority
                .cmp(&a.metadata.processing_priority)
                .then_with(|| a.id.cmp(&b.id))
        });

        let resolver = ComponentResolver::new(&self.inner);
        let mut constructed = 0;
        for binding in &eager {
            if !binding.conditions_met(&ConditionContext {
                key: &binding.key,
                properties: &self.inner.properties,
                registry: &self.inner.registry,
            }) {
                debug!(key = %binding.key, "eager binding skipped, conditions not met");
                continue;
            }
            let rc = ResolutionContext::new(self.inner.options.max_depth, &[]);
            let (_, fresh) = resolver.resolve_binding(binding, &rc)?;
            if fresh {
                constructed += 1;
            }
        }
        debug!(eager = eager.len(), constructed, "prewarm finished");
        Ok(constructed)
    }

    /// Checks declared dependencies without constructing anything.
    pub fn validate(&self) -> ValidationReport {
        validation::validate(&self.inner.registry)
    }

    /// Snapshots of all bindings in registration order.
    pub fn descriptors(&self) -> Vec<BindingDescriptor> {
        self.inner
            .registry
            .bindings()
            .iter()
            .map(|b| BindingDescriptor::from(b.as_ref()))
            .collect()
    }

    /// Runs synchronous pre-destroy hooks of all singletons in reverse
    /// construction order and releases them. Later resolutions fail with
    /// `Closed`.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.scopes.singletons().close();
        debug!("application context closed");
    }

    /// Like [`close`](Self::close), also awaiting asynchronous hooks.
    pub async fn close_async(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.scopes.singletons().close_async().await;
        debug!("application context closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl Default for ApplicationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverCore for ApplicationContext {
    fn resolve_instance(&self, key: &ComponentKey, optional: bool) -> ContainerResult<Option<Instance>> {
        self.inner.resolve_root(key, optional, &[])
    }
}

impl std::fmt::Debug for ApplicationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationContext")
            .field("bindings", &self.inner.registry.len())
            .field("singletons", &self.inner.scopes.singletons().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

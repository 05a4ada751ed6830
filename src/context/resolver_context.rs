//! Resolver context handed to providers, processors and hooks.

use std::sync::Arc;

use crate::context::ContextInner;
use crate::error::ContainerResult;
use crate::instance::Instance;
use crate::internal::ResolutionContext;
use crate::key::ComponentKey;
use crate::properties::Properties;
use crate::proxy::ProxyFactory;
use crate::resolver::ComponentResolver;
use crate::traits::ResolverCore;

/// Declared dependencies resolved before a provider runs.
#[derive(Default)]
pub(crate) struct ResolvedDependencies {
    entries: Vec<(ComponentKey, Option<Instance>)>,
}

impl ResolvedDependencies {
    pub(crate) fn push(&mut self, key: ComponentKey, instance: Option<Instance>) {
        self.entries.push((key, instance));
    }

    fn lookup(&self, key: &ComponentKey) -> Option<&Option<Instance>> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, i)| i)
    }
}

/// Context passed to providers for resolving dependencies.
///
/// Resolutions made through it continue the caller's resolution, so cycles
/// through provider code are detected the same way as declared ones, and
/// named-scope bindings see the same active scopes.
///
/// # Examples
///
/// ```
/// use ferrous_context::{ApplicationContext, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let ctx = ApplicationContext::new();
/// ctx.bind::<Database>().to(|_| Ok(Database { url: "postgres://localhost".into() })).unwrap();
/// ctx.bind::<UserService>()
///     .depends_on::<Database>()
///     .to(|r| Ok(UserService { db: r.get::<Database>()? }))
///     .unwrap();
///
/// assert_eq!(ctx.get::<UserService>().unwrap().db.url, "postgres://localhost");
/// ```
pub struct ResolverContext<'a> {
    context: &'a ContextInner,
    resolution: &'a ResolutionContext<'a>,
    dependencies: &'a ResolvedDependencies,
    key: &'a ComponentKey,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(
        context: &'a ContextInner,
        resolution: &'a ResolutionContext<'a>,
        dependencies: &'a ResolvedDependencies,
        key: &'a ComponentKey,
    ) -> Self {
        Self {
            context,
            resolution,
            dependencies,
            key,
        }
    }

    /// Key of the component being constructed.
    pub fn key(&self) -> &ComponentKey {
        self.key
    }

    pub fn property<V: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<V>> {
        self.context.properties.get::<V>(name)
    }

    pub fn properties(&self) -> &Properties {
        &self.context.properties
    }

    pub fn proxy_factory(&self) -> &ProxyFactory {
        &self.context.proxies
    }

    /// Keys currently being resolved, outermost first.
    pub fn resolution_path(&self) -> Vec<ComponentKey> {
        self.resolution.trace().0
    }
}

impl ResolverCore for ResolverContext<'_> {
    fn resolve_instance(&self, key: &ComponentKey, optional: bool) -> ContainerResult<Option<Instance>> {
        match self.dependencies.lookup(key) {
            Some(Some(instance)) => return Ok(Some(instance.clone())),
            Some(None) if optional => return Ok(None),
            _ => {}
        }
        ComponentResolver::new(self.context).resolve(key, self.resolution, optional)
    }
}

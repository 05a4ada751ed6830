//! Bindings: rules mapping a component key to a provider, scope and conditions.
//!
//! A binding is created with [`ApplicationContext::bind`](crate::ApplicationContext::bind)
//! and is immutable once registered. The registry may hold several bindings for
//! overlapping keys; resolution selects at most one of them using the qualifier,
//! priority and registration-order rule implemented in [`registry`].

use std::fmt;
use std::sync::Arc;

use crate::context::ResolverContext;
use crate::error::{BoxError, ContainerResult};
use crate::instance::Instance;
use crate::internal::BoxFutureUnit;
use crate::key::ComponentKey;
use crate::properties::Properties;
use crate::proxy::ProxyFactory;
use crate::scope::Scope;

pub mod builder;
pub mod conditions;
pub mod registry;

pub use builder::BindingBuilder;
pub use registry::BindingRegistry;

/// Registration-order identifier of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingId(pub(crate) usize);

impl BindingId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) type ProviderFn =
    Arc<dyn Fn(&ResolverContext<'_>) -> Result<Instance, BoxError> + Send + Sync>;
pub(crate) type CastFn = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;
pub(crate) type PostConstructFn =
    Arc<dyn Fn(&Instance, &ResolverContext<'_>) -> Result<(), BoxError> + Send + Sync>;
pub(crate) type DestroyFn = Arc<dyn Fn(&Instance) + Send + Sync>;
pub(crate) type AsyncDestroyFn = Arc<dyn Fn(Instance) -> BoxFutureUnit + Send + Sync>;
pub(crate) type WrapFn =
    Arc<dyn Fn(&Instance, &ProxyFactory) -> ContainerResult<Instance> + Send + Sync>;

/// Activation predicate gating whether a binding may be selected.
pub type Condition = Arc<dyn Fn(&ConditionContext<'_>) -> bool + Send + Sync>;

/// What a condition can see while a binding is being considered.
pub struct ConditionContext<'a> {
    pub(crate) key: &'a ComponentKey,
    pub(crate) properties: &'a Properties,
    pub(crate) registry: &'a BindingRegistry,
}

impl<'a> ConditionContext<'a> {
    /// The key being resolved.
    pub fn key(&self) -> &ComponentKey {
        self.key
    }

    pub fn property<V: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<V>> {
        self.properties.get::<V>(name)
    }

    pub fn property_string(&self, name: &str) -> Option<String> {
        self.properties.get_string(name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains(name)
    }

    /// True when at least one binding could serve `key`, conditions aside.
    pub fn is_bound(&self, key: &ComponentKey) -> bool {
        self.registry.contains(key)
    }
}

/// A dependency declared on a binding and resolved before its provider runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    pub key: ComponentKey,
    pub optional: bool,
}

/// Flags read by the lifecycle coordinator and the proxy factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentMetadata {
    pub key: ComponentKey,
    /// Post-processors only run for enabled components.
    pub enabled: bool,
    /// Interception and virtual proxies require this flag.
    pub permit_proxying: bool,
    /// Higher values are initialized first by `prewarm`.
    pub processing_priority: i32,
}

impl ComponentMetadata {
    pub(crate) fn new(key: ComponentKey) -> Self {
        Self {
            key,
            enabled: true,
            permit_proxying: true,
            processing_priority: 0,
        }
    }
}

/// An additional type the binding can be resolved as.
#[derive(Clone)]
pub(crate) struct Exposure {
    pub(crate) key: ComponentKey,
    pub(crate) cast: CastFn,
}

/// How the binding produces instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Provider,
    Instance,
    VirtualProxy,
}

/// A registered binding.
pub struct Binding {
    pub(crate) id: BindingId,
    pub(crate) key: ComponentKey,
    pub(crate) kind: BindingKind,
    pub(crate) provider: ProviderFn,
    pub(crate) scope: Scope,
    pub(crate) conditions: Vec<Condition>,
    pub(crate) priority: i32,
    pub(crate) dependencies: Vec<DependencySpec>,
    pub(crate) metadata: ComponentMetadata,
    pub(crate) exposures: Vec<Exposure>,
    pub(crate) post_construct: Vec<PostConstructFn>,
    pub(crate) pre_destroy: Vec<DestroyFn>,
    pub(crate) pre_destroy_async: Vec<AsyncDestroyFn>,
    pub(crate) interception: Option<WrapFn>,
    pub(crate) eager: bool,
}

impl Binding {
    pub fn id(&self) -> BindingId {
        self.id
    }

    pub fn key(&self) -> &ComponentKey {
        &self.key
    }

    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn dependencies(&self) -> &[DependencySpec] {
        &self.dependencies
    }

    pub fn metadata(&self) -> &ComponentMetadata {
        &self.metadata
    }

    /// Keys of the extra types this binding is exposed as.
    pub fn exposed_as(&self) -> impl Iterator<Item = &ComponentKey> {
        self.exposures.iter().map(|e| &e.key)
    }

    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_intercepted(&self) -> bool {
        self.interception.is_some()
    }

    pub fn is_eager(&self) -> bool {
        self.eager
    }

    pub(crate) fn has_destroy_hooks(&self) -> bool {
        !self.pre_destroy.is_empty() || !self.pre_destroy_async.is_empty()
    }

    pub(crate) fn conditions_met(&self, ctx: &ConditionContext<'_>) -> bool {
        self.conditions.iter().all(|condition| condition(ctx))
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("scope", &self.scope)
            .field("priority", &self.priority)
            .field("conditions", &self.conditions.len())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} [{}, priority {}]", self.id, self.key, self.scope, self.priority)
    }
}

//! Fluent binding registration.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::binding::{
    AsyncDestroyFn, Binding, BindingId, BindingKind, CastFn, ComponentMetadata, Condition, ConditionContext,
    DependencySpec, DestroyFn, Exposure, PostConstructFn, ProviderFn, WrapFn,
};
use crate::context::{ContextInner, ResolverContext};
use crate::error::{BoxError, ContainerError, ContainerResult};
use crate::instance::Instance;
use crate::internal::BoxFutureUnit;
use crate::key::ComponentKey;
use crate::proxy::{ProxyDescriptor, ProxyFactory, ProxyTarget};
use crate::scope::Scope;
use crate::traits::{AsyncPreDestroy, PostConstruct, PreDestroy};

/// Builder returned by [`ApplicationContext::bind`](crate::ApplicationContext::bind).
///
/// Configure the binding, then register it with one of the terminal
/// methods: [`to`](Self::to), [`to_arc`](Self::to_arc),
/// [`to_instance`](Self::to_instance) or
/// [`to_virtual_proxy`](Self::to_virtual_proxy).
///
/// # Examples
///
/// ```
/// use ferrous_context::{conditions, ApplicationContext, Resolver, Scope};
/// use std::sync::Arc;
///
/// trait Mailer: Send + Sync {
///     fn transport(&self) -> &'static str;
/// }
///
/// struct Smtp;
/// impl Mailer for Smtp {
///     fn transport(&self) -> &'static str { "smtp" }
/// }
///
/// struct Outbox;
/// impl Mailer for Outbox {
///     fn transport(&self) -> &'static str { "outbox" }
/// }
///
/// let ctx = ApplicationContext::new();
/// ctx.bind::<Smtp>()
///     .exposes::<dyn Mailer, _>(|smtp| smtp as Arc<dyn Mailer>)
///     .to(|_| Ok(Smtp))
///     .unwrap();
/// ctx.bind::<dyn Mailer>()
///     .qualifier("test")
///     .scope(Scope::Prototype)
///     .to_arc(|_| Ok(Arc::new(Outbox)))
///     .unwrap();
///
/// assert_eq!(ctx.get::<dyn Mailer>().unwrap().transport(), "smtp");
/// assert_eq!(ctx.get_qualified::<dyn Mailer>("test").unwrap().transport(), "outbox");
/// ```
pub struct BindingBuilder<'a, T: ?Sized> {
    context: &'a ContextInner,
    key: ComponentKey,
    scope: Scope,
    conditions: Vec<Condition>,
    priority: i32,
    dependencies: Vec<DependencySpec>,
    enabled: bool,
    permit_proxying: bool,
    processing_priority: i32,
    exposures: Vec<Exposure>,
    post_construct: Vec<PostConstructFn>,
    pre_destroy: Vec<DestroyFn>,
    pre_destroy_async: Vec<AsyncDestroyFn>,
    interception: Option<WrapFn>,
    eager: bool,
    error: Option<ContainerError>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<'a, T: ?Sized + Send + Sync + 'static> BindingBuilder<'a, T> {
    pub(crate) fn new(context: &'a ContextInner) -> Self {
        Self {
            context,
            key: ComponentKey::of::<T>(),
            scope: Scope::Singleton,
            conditions: Vec::new(),
            priority: 0,
            dependencies: Vec::new(),
            enabled: true,
            permit_proxying: true,
            processing_priority: 0,
            exposures: Vec::new(),
            post_construct: Vec::new(),
            pre_destroy: Vec::new(),
            pre_destroy_async: Vec::new(),
            interception: None,
            eager: false,
            error: None,
            _marker: PhantomData,
        }
    }

    pub fn qualifier(mut self, qualifier: impl Into<Arc<str>>) -> Self {
        self.key = self.key.with_qualifier(qualifier);
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn singleton(self) -> Self {
        self.scope(Scope::Singleton)
    }

    pub fn prototype(self) -> Self {
        self.scope(Scope::Prototype)
    }

    pub fn in_scope(self, name: impl Into<Arc<str>>) -> Self {
        self.scope(Scope::named(name))
    }

    /// Higher priority wins among bindings with the same qualifier rank.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Adds an activation condition; all conditions must pass.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Adds an activation condition from a closure.
    pub fn when<F>(self, predicate: F) -> Self
    where
        F: Fn(&ConditionContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.condition(Arc::new(predicate))
    }

    /// Declares a dependency resolved before the provider runs.
    pub fn depends_on<D: ?Sized + 'static>(mut self) -> Self {
        self.dependencies.push(DependencySpec {
            key: ComponentKey::of::<D>(),
            optional: false,
        });
        self
    }

    pub fn depends_on_qualified<D: ?Sized + 'static>(mut self, qualifier: impl Into<Arc<str>>) -> Self {
        self.dependencies.push(DependencySpec {
            key: ComponentKey::qualified::<D>(qualifier),
            optional: false,
        });
        self
    }

    /// Declares a dependency that may be absent.
    pub fn depends_on_optional<D: ?Sized + 'static>(mut self) -> Self {
        self.dependencies.push(DependencySpec {
            key: ComponentKey::of::<D>(),
            optional: true,
        });
        self
    }

    /// Makes the binding resolvable as `I` as well, typically a trait the
    /// component implements.
    pub fn exposes<I, C>(mut self, cast: C) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        C: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        let cast: CastFn = Arc::new(move |instance: &Instance| instance.downcast::<T>().map(|t| Instance::new(cast(t))));
        self.exposures.push(Exposure {
            key: ComponentKey::of::<I>(),
            cast,
        });
        self
    }

    /// Runs `hook` on each new instance after post-processing.
    pub fn post_construct<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let hook = post_construct_fn(move |instance, _| {
            let target = instance.downcast::<T>().ok_or_else(|| {
                BoxError::from(format!(
                    "post-construct expected {}, found {}",
                    std::any::type_name::<T>(),
                    instance.type_name()
                ))
            })?;
            hook(target.as_ref())
        });
        self.post_construct.push(hook);
        self
    }

    /// Runs `hook` when the owning scope closes. Prototypes are never
    /// destroyed by the container.
    pub fn pre_destroy<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let hook: DestroyFn = Arc::new(move |instance: &Instance| {
            if let Some(target) = instance.downcast::<T>() {
                hook(target.as_ref());
            }
        });
        self.pre_destroy.push(hook);
        self
    }

    /// Asynchronous teardown, awaited by `close_async`.
    pub fn pre_destroy_async<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let hook: AsyncDestroyFn = Arc::new(move |instance: Instance| -> BoxFutureUnit {
            match instance.downcast::<T>() {
                Some(target) => Box::pin(hook(target)),
                None => Box::pin(async {}),
            }
        });
        self.pre_destroy_async.push(hook);
        self
    }

    /// Calls [`PostConstruct::post_construct`] on new instances.
    pub fn initializing(self) -> Self
    where
        T: PostConstruct,
    {
        self.post_construct(|target: &T| PostConstruct::post_construct(target))
    }

    /// Calls [`PreDestroy::pre_destroy`] when the owning scope closes.
    pub fn disposable(self) -> Self
    where
        T: PreDestroy,
    {
        self.pre_destroy(|target: &T| PreDestroy::pre_destroy(target))
    }

    /// Awaits [`AsyncPreDestroy::pre_destroy`] in `close_async`.
    pub fn async_disposable(self) -> Self
    where
        T: AsyncPreDestroy,
    {
        self.pre_destroy_async(|target: Arc<T>| async move { AsyncPreDestroy::pre_destroy(&*target).await })
    }

    /// Disabled components skip the post-processor pipeline.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn permit_proxying(mut self, permit: bool) -> Self {
        self.permit_proxying = permit;
        self
    }

    /// Order among eager singletons; higher initializes first.
    pub fn processing_priority(mut self, priority: i32) -> Self {
        self.processing_priority = priority;
        self
    }

    /// Marks the binding for construction by `prewarm`.
    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    /// Registers a provider returning a shared handle, for any `T`
    /// including trait objects.
    pub fn to_arc<F>(self, provider: F) -> ContainerResult<BindingId>
    where
        F: Fn(&ResolverContext<'_>) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        let provider = provider_fn(move |r| provider(r).map(Instance::new));
        self.finish(BindingKind::Provider, provider)
    }

    /// Registers an existing instance.
    pub fn to_instance(self, value: Arc<T>) -> ContainerResult<BindingId> {
        let provider = provider_fn(move |_| Ok(Instance::new(value.clone())));
        self.finish(BindingKind::Instance, provider)
    }

    fn finish(self, kind: BindingKind, provider: ProviderFn) -> ContainerResult<BindingId> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.context.is_closed() {
            return Err(ContainerError::Closed { key: self.key });
        }

        let metadata = ComponentMetadata {
            key: self.key.clone(),
            enabled: self.enabled,
            permit_proxying: self.permit_proxying,
            processing_priority: self.processing_priority,
        };
        if self.interception.is_some() {
            ProxyFactory::check_permitted(&metadata)?;
        }

        self.context.registry.register(Binding {
            id: BindingId(0),
            key: self.key,
            kind,
            provider,
            scope: self.scope,
            conditions: self.conditions,
            priority: self.priority,
            dependencies: self.dependencies,
            metadata,
            exposures: self.exposures,
            post_construct: self.post_construct,
            pre_destroy: self.pre_destroy,
            pre_destroy_async: self.pre_destroy_async,
            interception: self.interception,
            eager: self.eager,
        })
    }
}

impl<'a, T: Send + Sync + 'static> BindingBuilder<'a, T> {
    /// Registers a provider constructing `T` by value.
    pub fn to<F>(self, provider: F) -> ContainerResult<BindingId>
    where
        F: Fn(&ResolverContext<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let provider = provider_fn(move |r| provider(r).map(Instance::from_value));
        self.finish(BindingKind::Provider, provider)
    }

    /// Registers a value; it becomes the single instance.
    pub fn to_value(self, value: T) -> ContainerResult<BindingId> {
        self.to_instance(Arc::new(value))
    }
}

impl<'a, T: ?Sized + ProxyTarget> BindingBuilder<'a, T> {
    /// Wraps every new instance in a delegating proxy built from `descriptor`.
    ///
    /// Fails at registration when proxying is not permitted or the
    /// descriptor targets another type.
    pub fn intercept(mut self, descriptor: ProxyDescriptor) -> Self {
        if !descriptor.targets::<T>() {
            self.error = Some(ContainerError::ProxyConstraintViolation {
                type_name: std::any::type_name::<T>(),
                reason: format!("descriptor targets {}", descriptor.target_type_name()),
            });
            return self;
        }
        let wrap: WrapFn = Arc::new(move |instance: &Instance, factory: &ProxyFactory| {
            let delegate = instance.downcast::<T>().ok_or_else(|| ContainerError::TypeMismatch {
                key: ComponentKey::of::<T>(),
                expected: std::any::type_name::<T>(),
            })?;
            factory.create_proxy::<T>(Some(delegate), &descriptor).map(Instance::new)
        });
        self.interception = Some(wrap);
        self
    }

    /// Registers an interface implemented entirely by interceptors.
    ///
    /// Every declared method must be matched by an interceptor, the target
    /// must not be sealed and proxying must be permitted; otherwise this
    /// fails with `ProxyConstraintViolation` right here.
    pub fn to_virtual_proxy(self, descriptor: ProxyDescriptor) -> ContainerResult<BindingId> {
        ProxyFactory::check_permitted(&ComponentMetadata {
            key: self.key.clone(),
            enabled: self.enabled,
            permit_proxying: self.permit_proxying,
            processing_priority: self.processing_priority,
        })?;
        if !descriptor.targets::<T>() {
            return Err(ContainerError::ProxyConstraintViolation {
                type_name: std::any::type_name::<T>(),
                reason: format!("descriptor targets {}", descriptor.target_type_name()),
            });
        }
        ProxyFactory::check_virtual::<T>(&descriptor)?;

        let provider = provider_fn(move |r| {
            let proxy = r.proxy_factory().create_proxy::<T>(None, &descriptor)?;
            Ok(Instance::new(proxy))
        });
        self.finish(BindingKind::VirtualProxy, provider)
    }
}

fn provider_fn<F>(f: F) -> ProviderFn
where
    F: Fn(&ResolverContext<'_>) -> Result<Instance, BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn post_construct_fn<F>(f: F) -> PostConstructFn
where
    F: Fn(&Instance, &ResolverContext<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}

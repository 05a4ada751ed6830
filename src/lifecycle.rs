//! Post-processing of freshly constructed components.
//!
//! Every new instance passes through the registered [`PostProcessor`]s in
//! ascending priority order, then through the binding's post-construct
//! hooks. Cache hits never re-enter this pipeline. A failure anywhere aborts
//! construction and nothing is stored.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::binding::{Binding, ComponentMetadata};
use crate::context::ResolverContext;
use crate::error::BoxError;
use crate::instance::Instance;

/// A pipeline stage applied to every new instance it accepts.
///
/// Processors may resolve other components through `resolver`; those
/// resolutions share the in-flight stack of the component being processed,
/// so requesting that component again is reported as a circular dependency.
///
/// # Examples
///
/// ```
/// use ferrous_context::{
///     ApplicationContext, BoxError, ComponentMetadata, Instance, PostProcessor, Resolver, ResolverContext,
/// };
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Audit(AtomicUsize);
///
/// impl PostProcessor for Audit {
///     fn process(
///         &self,
///         instance: Instance,
///         _metadata: &ComponentMetadata,
///         _resolver: &ResolverContext<'_>,
///     ) -> Result<Instance, BoxError> {
///         self.0.fetch_add(1, Ordering::SeqCst);
///         Ok(instance)
///     }
/// }
///
/// let audit = Arc::new(Audit::default());
/// let ctx = ApplicationContext::new();
/// ctx.add_post_processor(audit.clone());
/// ctx.bind::<String>().to(|_| Ok("svc".to_string())).unwrap();
///
/// ctx.get::<String>().unwrap();
/// ctx.get::<String>().unwrap();
/// assert_eq!(audit.0.load(Ordering::SeqCst), 1);
/// ```
pub trait PostProcessor: Send + Sync {
    /// Lower runs first; ties keep registration order.
    fn priority(&self) -> i32 {
        0
    }

    fn applies_to(&self, metadata: &ComponentMetadata) -> bool {
        let _ = metadata;
        true
    }

    /// Enriches, validates, or replaces `instance`.
    fn process(
        &self,
        instance: Instance,
        metadata: &ComponentMetadata,
        resolver: &ResolverContext<'_>,
    ) -> Result<Instance, BoxError>;
}

/// Ordered post-processor pipeline plus post-construct hooks.
#[derive(Default)]
pub struct LifecycleCoordinator {
    processors: RwLock<Vec<Arc<dyn PostProcessor>>>,
}

impl LifecycleCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `processor` after every processor of equal or lower priority.
    pub fn add(&self, processor: Arc<dyn PostProcessor>) {
        let mut processors = self.processors.write();
        let priority = processor.priority();
        let at = processors
            .iter()
            .position(|p| p.priority() > priority)
            .unwrap_or(processors.len());
        processors.insert(at, processor);
    }

    pub fn len(&self) -> usize {
        self.processors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.read().is_empty()
    }

    /// Runs the pipeline for one freshly constructed instance.
    pub(crate) fn process(
        &self,
        binding: &Binding,
        instance: Instance,
        resolver: &ResolverContext<'_>,
    ) -> Result<Instance, BoxError> {
        let metadata = &binding.metadata;
        let mut instance = instance;

        if metadata.enabled {
            // Processors may register further processors; run against a snapshot.
            let processors = self.processors.read().clone();
            for processor in processors.iter().filter(|p| p.applies_to(metadata)) {
                instance = processor.process(instance, metadata, resolver)?;
            }
        } else {
            trace!(key = %metadata.key, "post-processing disabled");
        }

        for hook in &binding.post_construct {
            hook(&instance, resolver)?;
        }
        Ok(instance)
    }
}

impl<P: PostProcessor + ?Sized> PostProcessor for Arc<P> {
    fn priority(&self) -> i32 {
        (**self).priority()
    }

    fn applies_to(&self, metadata: &ComponentMetadata) -> bool {
        (**self).applies_to(metadata)
    }

    fn process(
        &self,
        instance: Instance,
        metadata: &ComponentMetadata,
        resolver: &ResolverContext<'_>,
    ) -> Result<Instance, BoxError> {
        (**self).process(instance, metadata, resolver)
    }
}

/// Typed post-processors for common tasks.
pub mod processors {
    use std::marker::PhantomData;
    use std::sync::Arc;

    use super::PostProcessor;
    use crate::binding::ComponentMetadata;
    use crate::context::ResolverContext;
    use crate::error::BoxError;
    use crate::instance::Instance;

    type Stage = Arc<dyn Fn(Instance, &ResolverContext<'_>) -> Result<Instance, BoxError> + Send + Sync>;

    /// Post-processor that only touches instances of `T`.
    pub struct TypedProcessor<T: ?Sized> {
        priority: i32,
        stage: Stage,
        _marker: PhantomData<fn() -> Arc<T>>,
    }

    impl<T: ?Sized> TypedProcessor<T> {
        fn new<F>(stage: F) -> Self
        where
            F: Fn(Instance, &ResolverContext<'_>) -> Result<Instance, BoxError> + Send + Sync + 'static,
        {
            Self {
                priority: 0,
                stage: Arc::new(stage),
                _marker: PhantomData,
            }
        }

        pub fn with_priority(mut self, priority: i32) -> Self {
            self.priority = priority;
            self
        }
    }

    impl<T: ?Sized + Send + Sync + 'static> PostProcessor for TypedProcessor<T> {
        fn priority(&self) -> i32 {
            self.priority
        }

        fn process(
            &self,
            instance: Instance,
            _metadata: &ComponentMetadata,
            resolver: &ResolverContext<'_>,
        ) -> Result<Instance, BoxError> {
            if instance.is::<T>() {
                (self.stage)(instance, resolver)
            } else {
                Ok(instance)
            }
        }
    }

    /// Field or setter injection through unique access to the new instance.
    ///
    /// Fails when the provider kept another handle to the component, since
    /// the instance cannot be mutated then.
    pub fn inject<T, F>(f: F) -> TypedProcessor<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&mut T, &ResolverContext<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        TypedProcessor::new(move |mut instance, resolver| {
            let target = instance.get_mut::<T>().ok_or_else(|| {
                BoxError::from(format!(
                    "cannot inject into {}: the instance is shared",
                    std::any::type_name::<T>()
                ))
            })?;
            f(target, resolver)?;
            Ok(instance)
        })
    }

    /// Rejects instances that fail `check`.
    pub fn validate<T, F>(check: F) -> TypedProcessor<T>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        TypedProcessor::new(move |instance, _| {
            if let Some(target) = instance.downcast::<T>() {
                check(target.as_ref())?;
            }
            Ok(instance)
        })
    }

    /// Wraps or replaces instances of `T`.
    pub fn decorate<T, F>(f: F) -> TypedProcessor<T>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>, &ResolverContext<'_>) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        TypedProcessor::new(move |instance, resolver| {
            match instance.downcast::<T>() {
                Some(target) => {
                    drop(instance);
                    f(target, resolver).map(Instance::new)
                }
                None => Ok(instance),
            }
        })
    }
}

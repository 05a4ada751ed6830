//! Resolver traits for component resolution.

use std::any::TypeId;
use std::sync::Arc;

use crate::error::{ContainerError, ContainerResult, ResolutionTrace};
use crate::instance::Instance;
use crate::key::ComponentKey;

/// Object-safe resolution entry point.
///
/// Implemented by [`ApplicationContext`](crate::ApplicationContext),
/// [`ScopedContext`](crate::ScopedContext) and the
/// [`ResolverContext`](crate::ResolverContext) handed to providers. Most code
/// uses the generic methods of [`Resolver`] instead.
pub trait ResolverCore {
    /// Resolves `key` to a type-erased instance.
    ///
    /// With `optional` set, a missing binding for exactly `key` yields
    /// `Ok(None)`; every other failure is still returned as an error.
    fn resolve_instance(&self, key: &ComponentKey, optional: bool) -> ContainerResult<Option<Instance>>;
}

/// Typed resolution methods.
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
/// struct Fixed;
/// impl Clock for Fixed {
///     fn now(&self) -> u64 { 42 }
/// }
///
/// let ctx = ApplicationContext::new();
/// ctx.bind::<dyn Clock>().to_arc(|_| Ok(Arc::new(Fixed))).unwrap();
/// ctx.bind::<dyn Clock>().qualifier("backup").to_arc(|_| Ok(Arc::new(Fixed))).unwrap();
///
/// assert_eq!(ctx.get::<dyn Clock>().unwrap().now(), 42);
/// assert!(ctx.get_qualified::<dyn Clock>("backup").is_ok());
/// assert!(ctx.get_optional::<String>().unwrap().is_none());
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves `T` under the default qualifier.
    fn get<T: ?Sized + Send + Sync + 'static>(&self) -> ContainerResult<Arc<T>> {
        self.get_key(&ComponentKey::of::<T>())
    }

    /// Resolves `T` under `qualifier`.
    ///
    /// A binding with exactly that qualifier wins; otherwise the default
    /// binding for `T` is used.
    fn get_qualified<T: ?Sized + Send + Sync + 'static>(&self, qualifier: &str) -> ContainerResult<Arc<T>> {
        self.get_key(&ComponentKey::qualified::<T>(qualifier))
    }

    /// Like [`get`](Self::get), but `Ok(None)` when nothing is bound for `T`.
    ///
    /// Circular, ambiguous and construction failures are still errors.
    fn get_optional<T: ?Sized + Send + Sync + 'static>(&self) -> ContainerResult<Option<Arc<T>>> {
        self.get_optional_key(&ComponentKey::of::<T>())
    }

    fn get_optional_qualified<T: ?Sized + Send + Sync + 'static>(
        &self,
        qualifier: &str,
    ) -> ContainerResult<Option<Arc<T>>> {
        self.get_optional_key(&ComponentKey::qualified::<T>(qualifier))
    }

    /// Resolves an explicit key; its type must be `T`.
    fn get_key<T: ?Sized + Send + Sync + 'static>(&self, key: &ComponentKey) -> ContainerResult<Arc<T>> {
        check_type::<T>(key)?;
        match self.resolve_instance(key, false)? {
            Some(instance) => downcast(key, &instance),
            None => Err(ContainerError::ComponentResolution {
                key: key.clone(),
                reason: "no binding registered".into(),
                trace: ResolutionTrace::default(),
            }),
        }
    }

    fn get_optional_key<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: &ComponentKey,
    ) -> ContainerResult<Option<Arc<T>>> {
        check_type::<T>(key)?;
        self.resolve_instance(key, true)?
            .map(|instance| downcast(key, &instance))
            .transpose()
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}

fn check_type<T: ?Sized + 'static>(key: &ComponentKey) -> ContainerResult<()> {
    if key.type_id() == TypeId::of::<T>() {
        Ok(())
    } else {
        Err(ContainerError::TypeMismatch {
            key: key.clone(),
            expected: std::any::type_name::<T>(),
        })
    }
}

fn downcast<T: ?Sized + Send + Sync + 'static>(key: &ComponentKey, instance: &Instance) -> ContainerResult<Arc<T>> {
    instance.downcast::<T>().ok_or_else(|| ContainerError::TypeMismatch {
        key: key.clone(),
        expected: std::any::type_name::<T>(),
    })
}

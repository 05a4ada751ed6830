//! Type-erased component instances.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A constructed component, erased to `Any`.
///
/// Internally this holds an `Arc<Arc<T>>` so that unsized targets such as
/// `dyn Trait` survive type erasure. Cloning is a reference count bump.
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Instance {
    /// Wraps a shared component.
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Wraps an owned component.
    pub fn from_value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::new(Arc::new(value))
    }

    /// Shared handle to the component if it was created as `T`.
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    /// Unique access to the component.
    ///
    /// Only succeeds while nobody else holds the instance or the component,
    /// which is the case for fresh instances inside the post-processor
    /// pipeline.
    pub fn get_mut<T: ?Sized + Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        let outer = Arc::get_mut(&mut self.value)?;
        let inner = outer.downcast_mut::<Arc<T>>()?;
        Arc::get_mut(inner)
    }

    pub fn is<T: ?Sized + Send + Sync + 'static>(&self) -> bool {
        self.value.is::<Arc<T>>()
    }

    /// Name of the type the instance was created as.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// True when both handles share the same allocation.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").field("type", &self.type_name).finish()
    }
}

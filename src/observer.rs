//! Resolution observers.
//!
//! Observers receive a callback when a key starts resolving, when it was
//! resolved (with the elapsed time and whether an instance was constructed)
//! and when resolution failed. They run synchronously on the resolving
//! thread, so implementations should stay cheap.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::ContainerError;
use crate::key::ComponentKey;

/// Observer of resolution events.
///
/// # Examples
///
/// ```
/// use ferrous_context::{ApplicationContext, ComponentKey, ContainerObserver, Resolver};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Constructions(AtomicUsize);
///
/// impl ContainerObserver for Constructions {
///     fn resolved(&self, _key: &ComponentKey, _elapsed: Duration, constructed: bool) {
///         if constructed {
///             self.0.fetch_add(1, Ordering::SeqCst);
///         }
///     }
/// }
///
/// let ctx = ApplicationContext::new();
/// let counter = Arc::new(Constructions::default());
/// ctx.add_observer(counter.clone());
/// ctx.bind::<u32>().to(|_| Ok(7)).unwrap();
///
/// ctx.get::<u32>().unwrap();
/// ctx.get::<u32>().unwrap();
/// assert_eq!(counter.0.load(Ordering::SeqCst), 1);
/// ```
pub trait ContainerObserver: Send + Sync {
    /// Called before a key is looked up.
    fn resolving(&self, key: &ComponentKey) {
        let _ = key;
    }

    /// Called after `key` was resolved; `constructed` is false for cache hits.
    fn resolved(&self, key: &ComponentKey, elapsed: Duration, constructed: bool) {
        let _ = (key, elapsed, constructed);
    }

    /// Called when resolving `key` failed.
    fn failed(&self, key: &ComponentKey, error: &ContainerError) {
        let _ = (key, error);
    }
}

impl<O: ContainerObserver + ?Sized> ContainerObserver for Arc<O> {
    fn resolving(&self, key: &ComponentKey) {
        (**self).resolving(key)
    }

    fn resolved(&self, key: &ComponentKey, elapsed: Duration, constructed: bool) {
        (**self).resolved(key, elapsed, constructed)
    }

    fn failed(&self, key: &ComponentKey, error: &ContainerError) {
        (**self).failed(key, error)
    }
}

/// Observer that forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ContainerObserver for TracingObserver {
    fn resolving(&self, key: &ComponentKey) {
        trace!(key = %key, "resolving");
    }

    fn resolved(&self, key: &ComponentKey, elapsed: Duration, constructed: bool) {
        debug!(key = %key, ?elapsed, constructed, "resolved");
    }

    fn failed(&self, key: &ComponentKey, error: &ContainerError) {
        debug!(key = %key, error = %error, "resolution failed");
    }
}

/// Registered observers.
#[derive(Default)]
pub(crate) struct Observers {
    observers: RwLock<Vec<Arc<dyn ContainerObserver>>>,
}

impl Observers {
    pub(crate) fn add(&self, observer: Arc<dyn ContainerObserver>) {
        self.observers.write().push(observer);
    }

    fn snapshot(&self) -> Option<Vec<Arc<dyn ContainerObserver>>> {
        let observers = self.observers.read();
        (!observers.is_empty()).then(|| observers.clone())
    }

    #[inline]
    pub(crate) fn resolving(&self, key: &ComponentKey) {
        for observer in self.snapshot().into_iter().flatten() {
            observer.resolving(key);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, key: &ComponentKey, elapsed: Duration, constructed: bool) {
        for observer in self.snapshot().into_iter().flatten() {
            observer.resolved(key, elapsed, constructed);
        }
    }

    #[inline]
    pub(crate) fn failed(&self, key: &ComponentKey, error: &ContainerError) {
        for observer in self.snapshot().into_iter().flatten() {
            observer.failed(key, error);
        }
    }
}

//! Lifecycle callback traits.

use crate::error::BoxError;

/// Initialization callback, run after post-processors.
///
/// Wire it with [`BindingBuilder::initializing`](crate::BindingBuilder::initializing).
/// An error aborts construction and nothing is cached.
pub trait PostConstruct: Send + Sync + 'static {
    fn post_construct(&self) -> Result<(), BoxError>;
}

/// Synchronous teardown, run when the owning scope closes.
///
/// # Examples
///
/// ```
/// use ferrous_context::{ApplicationContext, PreDestroy, Resolver};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// static FLUSHED: AtomicBool = AtomicBool::new(false);
///
/// struct Cache;
///
/// impl PreDestroy for Cache {
///     fn pre_destroy(&self) {
///         FLUSHED.store(true, Ordering::SeqCst);
///     }
/// }
///
/// let ctx = ApplicationContext::new();
/// ctx.bind::<Cache>().disposable().to(|_| Ok(Cache)).unwrap();
/// ctx.get::<Cache>().unwrap();
/// ctx.close();
/// assert!(FLUSHED.load(Ordering::SeqCst));
/// ```
pub trait PreDestroy: Send + Sync + 'static {
    fn pre_destroy(&self);
}

/// Asynchronous teardown, run by `close_async`.
///
/// A plain `close` skips these hooks and logs a warning for each.
#[async_trait::async_trait]
pub trait AsyncPreDestroy: Send + Sync + 'static {
    async fn pre_destroy(&self);
}

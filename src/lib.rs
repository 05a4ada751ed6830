//! # ferrous-context
//!
//! An application context for Rust: components are bound to keys, built by
//! providers, cached by scope, post-processed through a lifecycle pipeline
//! and optionally wrapped in interception proxies.
//!
//! ## Features
//!
//! - **Qualified bindings**: several bindings per type, selected by qualifier,
//!   priority and registration order, gated by activation conditions
//! - **Scopes**: singleton, prototype and named scopes with exactly-once
//!   construction under concurrent access
//! - **Circular dependency detection**: failures carry the full path, e.g.
//!   `A -> B -> A`
//! - **Lifecycle**: post-processors, post-construct hooks and pre-destroy
//!   hooks run in reverse construction order on close
//! - **Interception**: delegating and virtual proxies for trait objects with
//!   ordered around-advice interceptors
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_context::{ApplicationContext, Resolver};
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let ctx = ApplicationContext::new();
//! ctx.add_context(Some("db.url"), "postgres://localhost".to_string());
//!
//! ctx.bind::<Database>()
//!     .to(|r| {
//!         let url = r.property::<String>("db.url").ok_or("db.url is not set")?;
//!         Ok(Database { url: url.to_string() })
//!     })
//!     .unwrap();
//! ctx.bind::<UserService>()
//!     .prototype()
//!     .depends_on::<Database>()
//!     .to(|r| Ok(UserService { db: r.get::<Database>()? }))
//!     .unwrap();
//!
//! let users = ctx.get::<UserService>().unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! ctx.close();
//! ```
//!
//! ## Qualifiers and Priorities
//!
//! ```rust
//! use ferrous_context::{ApplicationContext, ComponentKey, ContainerError, Resolver};
//!
//! let ctx = ApplicationContext::new();
//! ctx.bind::<String>().to_value("default".to_string()).unwrap();
//! ctx.bind::<String>().qualifier("primary").to_value("primary".to_string()).unwrap();
//! ctx.bind::<u8>().to_value(1).unwrap();
//! ctx.bind::<u8>().priority(10).to_value(2).unwrap();
//!
//! assert_eq!(*ctx.get_qualified::<String>("primary").unwrap(), "primary");
//! assert_eq!(*ctx.get::<String>().unwrap(), "default");
//! assert_eq!(*ctx.get::<u8>().unwrap(), 2);
//!
//! assert!(ctx.get_optional::<u64>().unwrap().is_none());
//! assert!(matches!(ctx.get::<u64>(), Err(ContainerError::ComponentResolution { .. })));
//! ```
//!
//! ## Scopes
//!
//! - **Singleton**: one instance per context, destroyed on `close`
//! - **Prototype**: a new instance per request, never tracked
//! - **Named**: one instance per open [`ScopedContext`] of that name
//!
//! All errors are reported as [`ContainerError`]; providers and processors
//! return [`BoxError`] and their failures surface as
//! [`ContainerError::Application`].

pub mod binding;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod instance;
pub mod key;
pub mod lifecycle;
pub mod observer;
pub mod options;
pub mod properties;
pub mod proxy;
pub mod scope;
pub mod store;
pub mod traits;
pub mod validation;

mod internal;
mod resolver;

pub use binding::{
    conditions, Binding, BindingBuilder, BindingId, BindingKind, BindingRegistry, ComponentMetadata, Condition,
    ConditionContext, DependencySpec,
};
pub use context::{ApplicationContext, ResolverContext, ScopedContext};
pub use descriptors::BindingDescriptor;
pub use error::{BoxError, ContainerError, ContainerResult, ResolutionTrace};
pub use instance::Instance;
pub use key::ComponentKey;
pub use lifecycle::{processors, LifecycleCoordinator, PostProcessor};
pub use observer::{ContainerObserver, TracingObserver};
pub use options::{ContextOptions, DEFAULT_MAX_DEPTH};
pub use properties::Properties;
pub use proxy::{
    interceptor_fn, Arguments, Interceptor, Invocation, InvocationError, InvocationResult, LoggingInterceptor,
    MethodMatcher, MethodSignature, Proceed, Proxy, ProxyDescriptor, ProxyFactory, ProxyTarget, ReturnValue,
};
pub use scope::{Scope, SINGLETON_SCOPE};
pub use store::{ScopeManager, ScopeStore};
pub use traits::{AsyncPreDestroy, PostConstruct, PreDestroy, Resolver, ResolverCore};
pub use validation::{ValidationIssue, ValidationReport};

//! Core traits for the application context.

mod lifecycle;
mod resolver;

pub use lifecycle::{AsyncPreDestroy, PostConstruct, PreDestroy};
pub use resolver::{Resolver, ResolverCore};

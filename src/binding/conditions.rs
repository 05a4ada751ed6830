//! Reusable activation conditions.
//!
//! ```rust
//! use ferrous_context::{conditions, ApplicationContext, Resolver};
//!
//! trait Store: Send + Sync { fn kind(&self) -> &'static str; }
//! struct Memory;
//! struct Disk;
//! impl Store for Memory { fn kind(&self) -> &'static str { "memory" } }
//! impl Store for Disk { fn kind(&self) -> &'static str { "disk" } }
//!
//! let ctx = ApplicationContext::new();
//! ctx.add_context(Some("store"), "disk".to_string());
//! ctx.bind::<dyn Store>()
//!     .priority(10)
//!     .condition(conditions::on_property("store", "memory"))
//!     .to_arc(|_| Ok(std::sync::Arc::new(Memory)))
//!     .unwrap();
//! ctx.bind::<dyn Store>().to_arc(|_| Ok(std::sync::Arc::new(Disk))).unwrap();
//!
//! assert_eq!(ctx.get::<dyn Store>().unwrap().kind(), "disk");
//! ```

use std::sync::Arc;

use crate::binding::{Condition, ConditionContext};
use crate::key::ComponentKey;

/// Passes when the string rendering of property `name` equals `expected`.
pub fn on_property(name: impl Into<String>, expected: impl Into<String>) -> Condition {
    let name = name.into();
    let expected = expected.into();
    Arc::new(move |ctx: &ConditionContext<'_>| {
        ctx.property_string(&name).as_deref() == Some(expected.as_str())
    })
}

/// Passes when property `name` was published at all.
pub fn on_property_present(name: impl Into<String>) -> Condition {
    let name = name.into();
    Arc::new(move |ctx: &ConditionContext<'_>| ctx.has_property(&name))
}

/// Passes when something is bound for `T`.
pub fn on_bound<T: ?Sized + 'static>() -> Condition {
    let key = ComponentKey::of::<T>();
    Arc::new(move |ctx: &ConditionContext<'_>| ctx.is_bound(&key))
}

/// Passes when nothing is bound for `T`.
pub fn on_missing<T: ?Sized + 'static>() -> Condition {
    not(on_bound::<T>())
}

pub fn not(condition: Condition) -> Condition {
    Arc::new(move |ctx: &ConditionContext<'_>| !condition(ctx))
}

pub fn all(conditions: Vec<Condition>) -> Condition {
    Arc::new(move |ctx: &ConditionContext<'_>| conditions.iter().all(|c| c(ctx)))
}

pub fn any(conditions: Vec<Condition>) -> Condition {
    Arc::new(move |ctx: &ConditionContext<'_>| conditions.iter().any(|c| c(ctx)))
}

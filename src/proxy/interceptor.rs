//! Method interception: signatures, arguments and interceptor chains.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use smallvec::SmallVec;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::BoxError;

/// Static description of one interface method.
///
/// Declared as constants next to the interface so that proxies and
/// interceptors can refer to the same value.
///
/// ```rust
/// use ferrous_context::proxy::MethodSignature;
///
/// const NOW: MethodSignature = MethodSignature::new("now", &[], "u64");
/// assert_eq!(NOW.to_string(), "now() -> u64");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub returns: &'static str,
}

impl MethodSignature {
    pub const fn new(
        name: &'static str,
        params: &'static [&'static str],
        returns: &'static str,
    ) -> Self {
        Self {
            name,
            params,
            returns,
        }
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) -> {}", self.name, self.params.join(", "), self.returns)
    }
}

/// Type-erased, positional call arguments.
#[derive(Default)]
pub struct Arguments {
    values: SmallVec<[Box<dyn Any + Send>; 4]>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an argument.
    pub fn with<V: Send + 'static>(mut self, value: V) -> Self {
        self.values.push(Box::new(value));
        self
    }

    pub fn get<V: 'static>(&self, index: usize) -> Option<&V> {
        self.values.get(index)?.downcast_ref::<V>()
    }

    pub fn get_mut<V: 'static>(&mut self, index: usize) -> Option<&mut V> {
        self.values.get_mut(index)?.downcast_mut::<V>()
    }

    /// Replaces argument `index`; returns `false` when out of range.
    pub fn set<V: Send + 'static>(&mut self, index: usize, value: V) -> bool {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = Box::new(value);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments").field("len", &self.len()).finish()
    }
}

/// Builds [`Arguments`] from a list of values.
#[macro_export]
macro_rules! arguments {
    () => {
        $crate::proxy::Arguments::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::proxy::Arguments::new()$(.with($value))+
    };
}

/// Type-erased return value of an intercepted call.
pub type ReturnValue = Box<dyn Any + Send>;

pub type InvocationResult = Result<ReturnValue, InvocationError>;

/// Failures raised while dispatching a proxied call.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The chain of a virtual proxy ended without producing a value.
    #[error("no implementation for {method} on virtual proxy of {target}")]
    NoImplementation {
        target: &'static str,
        method: &'static str,
    },

    #[error("argument {index} of {method} is not a {expected}")]
    ArgumentType {
        method: &'static str,
        index: usize,
        expected: &'static str,
    },

    #[error("{method} produced a value that is not a {expected}")]
    ReturnType {
        method: &'static str,
        expected: &'static str,
    },

    /// An interceptor refused the call.
    #[error("call to {method} rejected: {reason}")]
    Rejected { method: &'static str, reason: String },

    /// The target method itself failed.
    #[error("{method} failed: {source}")]
    Failed {
        method: &'static str,
        #[source]
        source: BoxError,
    },
}

impl InvocationError {
    pub fn rejected(method: &MethodSignature, reason: impl Into<String>) -> Self {
        InvocationError::Rejected {
            method: method.name,
            reason: reason.into(),
        }
    }
}

/// One call travelling through an interceptor chain.
#[derive(Debug)]
pub struct Invocation {
    method: &'static MethodSignature,
    target: &'static str,
    pub args: Arguments,
}

impl Invocation {
    pub(crate) fn new(method: &'static MethodSignature, target: &'static str, args: Arguments) -> Self {
        Self {
            method,
            target,
            args,
        }
    }

    pub fn method(&self) -> &'static MethodSignature {
        self.method
    }

    /// Type name of the proxied interface.
    pub fn target_type(&self) -> &'static str {
        self.target
    }

    /// Typed argument, or `ArgumentType` naming the position.
    pub fn arg<V: 'static>(&self, index: usize) -> Result<&V, InvocationError> {
        self.args.get::<V>(index).ok_or(InvocationError::ArgumentType {
            method: self.method.name,
            index,
            expected: std::any::type_name::<V>(),
        })
    }
}

pub(crate) type Terminal<'c> = dyn Fn(&mut Invocation) -> InvocationResult + 'c;

/// Continuation handed to an interceptor.
///
/// Calling [`proceed`](Self::proceed) runs the rest of the chain and then the
/// target; dropping it short-circuits the call.
pub struct Proceed<'c> {
    chain: &'c [Arc<dyn Interceptor>],
    terminal: &'c Terminal<'c>,
}

impl<'c> Proceed<'c> {
    pub(crate) fn new(chain: &'c [Arc<dyn Interceptor>], terminal: &'c Terminal<'c>) -> Self {
        Self { chain, terminal }
    }

    pub fn proceed(self, invocation: &mut Invocation) -> InvocationResult {
        match self.chain.split_first() {
            Some((next, rest)) => next.invoke(
                invocation,
                Proceed {
                    chain: rest,
                    terminal: self.terminal,
                },
            ),
            None => (self.terminal)(invocation),
        }
    }

    /// Interceptors still ahead of the target.
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }
}

/// Around-advice for proxied method calls.
pub trait Interceptor: Send + Sync {
    fn invoke(&self, invocation: &mut Invocation, proceed: Proceed<'_>) -> InvocationResult;
}

struct FnInterceptor<F>(F);

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(&mut Invocation, Proceed<'_>) -> InvocationResult + Send + Sync,
{
    fn invoke(&self, invocation: &mut Invocation, proceed: Proceed<'_>) -> InvocationResult {
        (self.0)(invocation, proceed)
    }
}

/// Interceptor from a closure.
pub fn interceptor_fn<F>(f: F) -> Arc<dyn Interceptor>
where
    F: Fn(&mut Invocation, Proceed<'_>) -> InvocationResult + Send + Sync + 'static,
{
    Arc::new(FnInterceptor(f))
}

/// Logs entry and exit of every intercepted call through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingInterceptor;

impl Interceptor for LoggingInterceptor {
    fn invoke(&self, invocation: &mut Invocation, proceed: Proceed<'_>) -> InvocationResult {
        let method = invocation.method().name;
        let target = invocation.target_type();
        debug!(target_type = target, method, args = invocation.args.len(), "calling");

        let started = Instant::now();
        let result = proceed.proceed(invocation);
        match &result {
            Ok(_) => debug!(target_type = target, method, elapsed = ?started.elapsed(), "returned"),
            Err(err) => warn!(target_type = target, method, error = %err, "call failed"),
        }
        result
    }
}

/// Selects the methods an interceptor applies to.
#[derive(Clone)]
pub enum MethodMatcher {
    Any,
    Named(Arc<str>),
    Predicate(Arc<dyn Fn(&MethodSignature) -> bool + Send + Sync>),
}

impl MethodMatcher {
    pub fn any() -> Self {
        MethodMatcher::Any
    }

    pub fn named(name: impl Into<Arc<str>>) -> Self {
        MethodMatcher::Named(name.into())
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&MethodSignature) -> bool + Send + Sync + 'static,
    {
        MethodMatcher::Predicate(Arc::new(f))
    }

    pub fn matches(&self, method: &MethodSignature) -> bool {
        match self {
            MethodMatcher::Any => true,
            MethodMatcher::Named(name) => &**name == method.name,
            MethodMatcher::Predicate(p) => p(method),
        }
    }
}

impl fmt::Debug for MethodMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodMatcher::Any => f.write_str("Any"),
            MethodMatcher::Named(name) => f.debug_tuple("Named").field(name).finish(),
            MethodMatcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

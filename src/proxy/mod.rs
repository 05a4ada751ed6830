//! Interception proxies.
//!
//! A proxy for an interface `I` is a [`Proxy<dyn I>`](Proxy) that implements
//! `I` itself; each method forwards through [`Proxy::invoke`], which runs the
//! interceptors matched to that method and then calls the delegate. Without a
//! delegate the proxy is *virtual* and its interceptors must produce every
//! result.
//!
//! The wrapper impl is written once per interface:
//!
//! ```rust
//! use ferrous_context::proxy::{
//!     interceptor_fn, LoggingInterceptor, MethodMatcher, MethodSignature, Proxy, ProxyDescriptor,
//!     ProxyFactory, ProxyTarget, InvocationError,
//! };
//! use ferrous_context::arguments;
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self, name: &str) -> Result<String, InvocationError>;
//! }
//!
//! const GREET: MethodSignature = MethodSignature::new("greet", &["&str"], "String");
//!
//! impl ProxyTarget for dyn Greeter {
//!     fn methods() -> &'static [MethodSignature] {
//!         &[GREET]
//!     }
//!     fn into_proxy(proxy: Proxy<Self>) -> Arc<Self> {
//!         Arc::new(proxy)
//!     }
//! }
//!
//! impl Greeter for Proxy<dyn Greeter> {
//!     fn greet(&self, name: &str) -> Result<String, InvocationError> {
//!         self.invoke(&GREET, arguments![name.to_string()], |target, args| {
//!             target.greet(args.get::<String>(0).map(String::as_str).unwrap_or_default())
//!         })
//!     }
//! }
//!
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self, name: &str) -> Result<String, InvocationError> {
//!         Ok(format!("Hello, {}", name))
//!     }
//! }
//!
//! let descriptor = ProxyDescriptor::new::<dyn Greeter>()
//!     .intercept(MethodMatcher::any(), LoggingInterceptor)
//!     .intercept_fn(MethodMatcher::named("greet"), |inv, proceed| {
//!         let greeting = proceed.proceed(inv)?;
//!         let text = greeting.downcast::<String>().map(|s| *s).unwrap_or_default();
//!         Ok(Box::new(format!("{}!", text)))
//!     });
//!
//! let factory = ProxyFactory::new();
//! let delegate: Arc<dyn Greeter> = Arc::new(English);
//! let greeter = factory.create_proxy(Some(delegate), &descriptor).unwrap();
//! assert_eq!(greeter.greet("Ada").unwrap(), "Hello, Ada!");
//! ```

use std::any::TypeId;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::binding::ComponentMetadata;
use crate::error::{ContainerError, ContainerResult};
use crate::internal::Map;

pub mod interceptor;

pub use interceptor::{
    interceptor_fn, Arguments, Interceptor, Invocation, InvocationError, InvocationResult,
    LoggingInterceptor, MethodMatcher, MethodSignature, Proceed, ReturnValue,
};

/// Target type plus its ordered interceptors.
#[derive(Clone)]
pub struct ProxyDescriptor {
    target: TypeId,
    target_name: &'static str,
    interceptors: Vec<(MethodMatcher, Arc<dyn Interceptor>)>,
}

impl ProxyDescriptor {
    pub fn new<T: ?Sized + 'static>() -> Self {
        Self {
            target: TypeId::of::<T>(),
            target_name: std::any::type_name::<T>(),
            interceptors: Vec::new(),
        }
    }

    /// Appends `interceptor` for the methods selected by `matcher`.
    ///
    /// Interceptors run in the order they were added.
    pub fn intercept(self, matcher: MethodMatcher, interceptor: impl Interceptor + 'static) -> Self {
        self.intercept_arc(matcher, Arc::new(interceptor))
    }

    pub fn intercept_arc(mut self, matcher: MethodMatcher, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push((matcher, interceptor));
        self
    }

    pub fn intercept_fn<F>(self, matcher: MethodMatcher, f: F) -> Self
    where
        F: Fn(&mut Invocation, Proceed<'_>) -> InvocationResult + Send + Sync + 'static,
    {
        self.intercept_arc(matcher, interceptor_fn(f))
    }

    pub fn target_type_name(&self) -> &'static str {
        self.target_name
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub(crate) fn targets<T: ?Sized + 'static>(&self) -> bool {
        self.target == TypeId::of::<T>()
    }

    fn chain_for(&self, method: &MethodSignature) -> Vec<Arc<dyn Interceptor>> {
        self.interceptors
            .iter()
            .filter(|(matcher, _)| matcher.matches(method))
            .map(|(_, interceptor)| interceptor.clone())
            .collect()
    }

    /// Declared methods no interceptor applies to.
    pub fn uncovered(&self, methods: &[MethodSignature]) -> Vec<&'static str> {
        methods
            .iter()
            .filter(|m| !self.interceptors.iter().any(|(matcher, _)| matcher.matches(m)))
            .map(|m| m.name)
            .collect()
    }
}

impl fmt::Debug for ProxyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyDescriptor")
            .field("target", &self.target_name)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

/// An interface that can be proxied.
///
/// Implemented on `dyn Interface`, together with `impl Interface for
/// Proxy<dyn Interface>` that forwards every method through
/// [`Proxy::invoke`].
pub trait ProxyTarget: Send + Sync + 'static {
    /// Sealed targets cannot be proxied without a delegate.
    const SEALED: bool = false;

    /// Every method of the interface.
    fn methods() -> &'static [MethodSignature];

    /// Erases the proxy to the interface type.
    fn into_proxy(proxy: Proxy<Self>) -> Arc<Self>;
}

type Chain = Arc<[Arc<dyn Interceptor>]>;

/// Bind-time wrapper that dispatches calls through interceptors.
pub struct Proxy<T: ?Sized> {
    delegate: Option<Arc<T>>,
    target: &'static str,
    dispatch: Map<&'static str, Chain>,
}

impl<T: ?Sized + Send + Sync + 'static> Proxy<T> {
    fn build(delegate: Option<Arc<T>>, descriptor: &ProxyDescriptor, methods: &[MethodSignature]) -> Self {
        let dispatch = methods
            .iter()
            .filter_map(|method| {
                let chain = descriptor.chain_for(method);
                (!chain.is_empty()).then(|| (method.name, Chain::from(chain)))
            })
            .collect();
        Self {
            delegate,
            target: std::any::type_name::<T>(),
            dispatch,
        }
    }

    /// The wrapped component; `None` for virtual proxies.
    pub fn delegate(&self) -> Option<&Arc<T>> {
        self.delegate.as_ref()
    }

    pub fn is_virtual(&self) -> bool {
        self.delegate.is_none()
    }

    /// Number of interceptors applied to `method`.
    pub fn interceptors_for(&self, method: &MethodSignature) -> usize {
        self.dispatch.get(method.name).map_or(0, |chain| chain.len())
    }

    /// Dispatches one call.
    ///
    /// Runs the interceptors for `method` in order; the innermost `proceed`
    /// calls `call` with the delegate and the (possibly rewritten)
    /// arguments. A virtual proxy whose chain proceeds past its last
    /// interceptor yields `NoImplementation`.
    pub fn invoke<R, F>(
        &self,
        method: &'static MethodSignature,
        args: Arguments,
        call: F,
    ) -> Result<R, InvocationError>
    where
        R: Send + 'static,
        F: Fn(&T, &Arguments) -> Result<R, InvocationError>,
    {
        let terminal = |invocation: &mut Invocation| -> InvocationResult {
            match &self.delegate {
                Some(delegate) => call(delegate, &invocation.args).map(|r| Box::new(r) as ReturnValue),
                None => Err(InvocationError::NoImplementation {
                    target: self.target,
                    method: method.name,
                }),
            }
        };

        let mut invocation = Invocation::new(method, self.target, args);
        let result = match self.dispatch.get(method.name) {
            Some(chain) => Proceed::new(chain, &terminal).proceed(&mut invocation),
            None => terminal(&mut invocation),
        }?;

        result
            .downcast::<R>()
            .map(|value| *value)
            .map_err(|_| InvocationError::ReturnType {
                method: method.name,
                expected: std::any::type_name::<R>(),
            })
    }
}

impl<T: ?Sized> fmt::Debug for Proxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("target", &self.target)
            .field("virtual", &self.delegate.is_none())
            .field("methods", &self.dispatch.len())
            .finish()
    }
}

/// Creates delegating and virtual proxies and enforces proxying constraints.
#[derive(Debug, Default)]
pub struct ProxyFactory {
    created: AtomicUsize,
}

impl ProxyFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `delegate` (or nothing, for a virtual proxy) in a proxy for `T`.
    pub fn create_proxy<T>(
        &self,
        delegate: Option<Arc<T>>,
        descriptor: &ProxyDescriptor,
    ) -> ContainerResult<Arc<T>>
    where
        T: ?Sized + ProxyTarget,
    {
        if !descriptor.targets::<T>() {
            return Err(violation::<T>(format!(
                "descriptor targets {}",
                descriptor.target_type_name()
            )));
        }
        if delegate.is_none() {
            Self::check_virtual::<T>(descriptor)?;
        }

        let proxy = Proxy::build(delegate, descriptor, T::methods());
        let created = self.created.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            target_type = std::any::type_name::<T>(),
            virtual_proxy = proxy.is_virtual(),
            intercepted_methods = proxy.dispatch.len(),
            created,
            "proxy created"
        );
        Ok(T::into_proxy(proxy))
    }

    /// Checks that a virtual proxy for `T` can serve every call.
    pub fn check_virtual<T: ?Sized + ProxyTarget>(descriptor: &ProxyDescriptor) -> ContainerResult<()> {
        if T::SEALED {
            return Err(violation::<T>("sealed type cannot be proxied without a delegate"));
        }
        let uncovered = descriptor.uncovered(T::methods());
        if !uncovered.is_empty() {
            return Err(violation::<T>(format!(
                "virtual proxy has no interceptor for {}",
                uncovered.join(", ")
            )));
        }
        Ok(())
    }

    pub(crate) fn check_permitted(metadata: &ComponentMetadata) -> ContainerResult<()> {
        if metadata.permit_proxying {
            Ok(())
        } else {
            Err(ContainerError::ProxyConstraintViolation {
                type_name: metadata.key.type_name(),
                reason: "proxying is not permitted for this component".into(),
            })
        }
    }

    /// Proxies created so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

fn violation<T: ?Sized>(reason: impl Into<String>) -> ContainerError {
    ContainerError::ProxyConstraintViolation {
        type_name: std::any::type_name::<T>(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    trait Counter: Send + Sync {
        fn add(&self, n: u32) -> Result<u32, InvocationError>;
        fn reset(&self) -> Result<(), InvocationError>;
    }

    const ADD: MethodSignature = MethodSignature::new("add", &["u32"], "u32");
    const RESET: MethodSignature = MethodSignature::new("reset", &[], "()");

    impl ProxyTarget for dyn Counter {
        fn methods() -> &'static [MethodSignature] {
            &[ADD, RESET]
        }
        fn into_proxy(proxy: Proxy<Self>) -> Arc<Self> {
            Arc::new(proxy)
        }
    }

    impl Counter for Proxy<dyn Counter> {
        fn add(&self, n: u32) -> Result<u32, InvocationError> {
            self.invoke(&ADD, crate::arguments![n], |target, args| {
                target.add(args.get::<u32>(0).copied().unwrap_or_default())
            })
        }
        fn reset(&self) -> Result<(), InvocationError> {
            self.invoke(&RESET, Arguments::new(), |target, _| target.reset())
        }
    }

    struct Plus(Mutex<u32>);

    impl Counter for Plus {
        fn add(&self, n: u32) -> Result<u32, InvocationError> {
            let mut total = self.0.lock().unwrap();
            *total += n;
            Ok(*total)
        }
        fn reset(&self) -> Result<(), InvocationError> {
            *self.0.lock().unwrap() = 0;
            Ok(())
        }
    }

    struct Sealed;
    trait Locked: Send + Sync {}
    impl ProxyTarget for dyn Locked {
        const SEALED: bool = true;
        fn methods() -> &'static [MethodSignature] {
            &[]
        }
        fn into_proxy(proxy: Proxy<Self>) -> Arc<Self> {
            Arc::new(proxy)
        }
    }
    impl Locked for Proxy<dyn Locked> {}
    impl Locked for Sealed {}

    #[test]
    fn delegating_proxy_can_rewrite_arguments() {
        let doubler = ProxyDescriptor::new::<dyn Counter>().intercept_fn(MethodMatcher::named("add"), |inv, proceed| {
            if let Some(n) = inv.args.get_mut::<u32>(0) {
                *n *= 2;
            }
            proceed.proceed(inv)
        });
        let factory = ProxyFactory::new();
        let delegate: Arc<dyn Counter> = Arc::new(Plus(Mutex::new(0)));
        let counter = factory.create_proxy(Some(delegate), &doubler).unwrap();

        assert_eq!(counter.add(3).unwrap(), 6);
        assert_eq!(counter.add(1).unwrap(), 8);
        counter.reset().unwrap();
        assert_eq!(factory.created(), 1);
    }

    #[test]
    fn virtual_proxy_requires_full_coverage() {
        let partial = ProxyDescriptor::new::<dyn Counter>()
            .intercept_fn(MethodMatcher::named("add"), |inv, _| Ok(Box::new(*inv.arg::<u32>(0)?)));
        match ProxyFactory::new().create_proxy::<dyn Counter>(None, &partial) {
            Err(ContainerError::ProxyConstraintViolation { reason, .. }) => assert!(reason.contains("reset")),
            _ => panic!("expected constraint violation"),
        }

        let full = partial.intercept_fn(MethodMatcher::named("reset"), |_, _| Ok(Box::new(())));
        let counter = ProxyFactory::new().create_proxy::<dyn Counter>(None, &full).unwrap();
        assert_eq!(counter.add(4).unwrap(), 4);
        counter.reset().unwrap();
    }

    #[test]
    fn virtual_chain_that_proceeds_has_no_implementation() {
        let passthrough = ProxyDescriptor::new::<dyn Counter>()
            .intercept_fn(MethodMatcher::any(), |inv, proceed| proceed.proceed(inv));
        let counter = ProxyFactory::new().create_proxy::<dyn Counter>(None, &passthrough).unwrap();
        assert!(matches!(counter.add(1), Err(InvocationError::NoImplementation { .. })));
    }

    #[test]
    fn sealed_targets_need_a_delegate() {
        let descriptor = ProxyDescriptor::new::<dyn Locked>();
        let factory = ProxyFactory::new();
        assert!(factory.create_proxy::<dyn Locked>(None, &descriptor).is_err());

        let delegate: Arc<dyn Locked> = Arc::new(Sealed);
        assert!(factory.create_proxy(Some(delegate), &descriptor).is_ok());
    }

    #[test]
    fn descriptor_must_match_target() {
        let descriptor = ProxyDescriptor::new::<dyn Locked>();
        let delegate: Arc<dyn Counter> = Arc::new(Plus(Mutex::new(0)));
        assert!(ProxyFactory::new().create_proxy(Some(delegate), &descriptor).is_err());
    }

    #[test]
    fn permission_flag() {
        let mut metadata = ComponentMetadata::new(crate::key::ComponentKey::of::<dyn Counter>());
        assert!(ProxyFactory::check_permitted(&metadata).is_ok());
        metadata.permit_proxying = false;
        assert!(ProxyFactory::check_permitted(&metadata).is_err());
    }
}

use ferrous_context::{
    arguments, ApplicationContext, ContainerError, Interceptor, Invocation, InvocationError, InvocationResult,
    LoggingInterceptor, MethodMatcher, MethodSignature, Proceed, Proxy, ProxyDescriptor, ProxyTarget, Resolver,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

trait Calculator: Send + Sync {
    fn add(&self, a: i64, b: i64) -> Result<i64, InvocationError>;
    fn describe(&self) -> Result<String, InvocationError>;
}

const ADD: MethodSignature = MethodSignature::new("add", &["i64", "i64"], "i64");
const DESCRIBE: MethodSignature = MethodSignature::new("describe", &[], "String");

impl ProxyTarget for dyn Calculator {
    fn methods() -> &'static [MethodSignature] {
        &[ADD, DESCRIBE]
    }

    fn into_proxy(proxy: Proxy<Self>) -> Arc<Self> {
        Arc::new(proxy)
    }
}

impl Calculator for Proxy<dyn Calculator> {
    fn add(&self, a: i64, b: i64) -> Result<i64, InvocationError> {
        self.invoke(&ADD, arguments![a, b], |target, args| {
            target.add(
                args.get::<i64>(0).copied().unwrap_or_default(),
                args.get::<i64>(1).copied().unwrap_or_default(),
            )
        })
    }

    fn describe(&self) -> Result<String, InvocationError> {
        self.invoke(&DESCRIBE, arguments![], |target, _| target.describe())
    }
}

type Log = Arc<Mutex<Vec<String>>>;

struct Basic {
    log: Log,
}

impl Calculator for Basic {
    fn add(&self, a: i64, b: i64) -> Result<i64, InvocationError> {
        self.log.lock().unwrap().push(format!("target add({}, {})", a, b));
        Ok(a + b)
    }

    fn describe(&self) -> Result<String, InvocationError> {
        Ok("basic".to_string())
    }
}

struct Recording {
    name: &'static str,
    log: Log,
}

impl Interceptor for Recording {
    fn invoke(&self, invocation: &mut Invocation, proceed: Proceed<'_>) -> InvocationResult {
        let method = invocation.method().name;
        self.log.lock().unwrap().push(format!("{} before {}", self.name, method));
        let result = proceed.proceed(invocation);
        self.log.lock().unwrap().push(format!("{} after {}", self.name, method));
        result
    }
}

fn bind_basic(ctx: &ApplicationContext, log: &Log, descriptor: ProxyDescriptor) {
    let target_log = log.clone();
    ctx.bind::<dyn Calculator>()
        .intercept(descriptor)
        .to_arc(move |_| Ok(Arc::new(Basic { log: target_log.clone() })))
        .unwrap();
}

#[test]
fn test_interceptors_wrap_the_target_in_order() {
    let log: Log = Arc::default();
    let descriptor = ProxyDescriptor::new::<dyn Calculator>()
        .intercept(MethodMatcher::any(), LoggingInterceptor)
        .intercept(MethodMatcher::any(), Recording { name: "outer", log: log.clone() })
        .intercept(MethodMatcher::named("add"), Recording { name: "inner", log: log.clone() });

    let ctx = ApplicationContext::new();
    bind_basic(&ctx, &log, descriptor);

    let calculator = ctx.get::<dyn Calculator>().unwrap();
    assert_eq!(calculator.add(2, 3).unwrap(), 5);
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "outer before add",
            "inner before add",
            "target add(2, 3)",
            "inner after add",
            "outer after add",
        ]
    );

    log.lock().unwrap().clear();
    assert_eq!(calculator.describe().unwrap(), "basic");
    assert_eq!(*log.lock().unwrap(), vec!["outer before describe", "outer after describe"]);
}

#[test]
fn test_intercepted_singleton_is_one_proxy() {
    let log: Log = Arc::default();
    let ctx = ApplicationContext::new();
    bind_basic(&ctx, &log, ProxyDescriptor::new::<dyn Calculator>());

    let a = ctx.get::<dyn Calculator>().unwrap();
    let b = ctx.get::<dyn Calculator>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(ctx.proxy_factory().created(), 1);
    assert!(ctx.descriptors()[0].intercepted);
}

#[test]
fn test_interceptor_can_rewrite_arguments_and_results() {
    let log: Log = Arc::default();
    let descriptor = ProxyDescriptor::new::<dyn Calculator>().intercept_fn(MethodMatcher::named("add"), |inv, proceed| {
        inv.args.set(1, 10i64);
        let sum = proceed.proceed(inv)?;
        let sum = *sum.downcast::<i64>().map_err(|_| InvocationError::ReturnType {
            method: "add",
            expected: "i64",
        })?;
        Ok(Box::new(sum * 2))
    });

    let ctx = ApplicationContext::new();
    bind_basic(&ctx, &log, descriptor);

    assert_eq!(ctx.get::<dyn Calculator>().unwrap().add(1, 2).unwrap(), 22);
    assert_eq!(*log.lock().unwrap(), vec!["target add(1, 10)"]);
}

#[test]
fn test_short_circuit_skips_the_target() {
    let log: Log = Arc::default();
    let descriptor = ProxyDescriptor::new::<dyn Calculator>().intercept_fn(MethodMatcher::named("add"), |inv, _| {
        Err(InvocationError::rejected(inv.method(), "read-only mode"))
    });

    let ctx = ApplicationContext::new();
    bind_basic(&ctx, &log, descriptor);

    let calculator = ctx.get::<dyn Calculator>().unwrap();
    match calculator.add(1, 1) {
        Err(InvocationError::Rejected { method, reason }) => {
            assert_eq!(method, "add");
            assert_eq!(reason, "read-only mode");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(calculator.describe().unwrap(), "basic");
}

#[test]
fn test_virtual_proxy_binding() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let descriptor = ProxyDescriptor::new::<dyn Calculator>()
        .intercept_fn(MethodMatcher::named("add"), move |inv, _| {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(inv.arg::<i64>(0)? * inv.arg::<i64>(1)?))
        })
        .intercept_fn(MethodMatcher::named("describe"), |_, _| Ok(Box::new("virtual".to_string())));

    let ctx = ApplicationContext::new();
    ctx.bind::<dyn Calculator>().to_virtual_proxy(descriptor).unwrap();

    let calculator = ctx.get::<dyn Calculator>().unwrap();
    assert_eq!(calculator.add(6, 7).unwrap(), 42);
    assert_eq!(calculator.describe().unwrap(), "virtual");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_virtual_proxy_must_cover_every_method() {
    let descriptor = ProxyDescriptor::new::<dyn Calculator>()
        .intercept_fn(MethodMatcher::named("add"), |_, _| Ok(Box::new(0i64)));

    let ctx = ApplicationContext::new();
    match ctx.bind::<dyn Calculator>().to_virtual_proxy(descriptor) {
        Err(ContainerError::ProxyConstraintViolation { reason, .. }) => assert!(reason.contains("describe")),
        other => panic!("expected ProxyConstraintViolation, got {:?}", other),
    }
    assert!(ctx.registry().is_empty());
}

#[test]
fn test_virtual_proxy_reaching_the_end_of_the_chain() {
    let descriptor = ProxyDescriptor::new::<dyn Calculator>()
        .intercept_fn(MethodMatcher::any(), |inv, proceed| proceed.proceed(inv));

    let ctx = ApplicationContext::new();
    ctx.bind::<dyn Calculator>().to_virtual_proxy(descriptor).unwrap();

    assert!(matches!(
        ctx.get::<dyn Calculator>().unwrap().add(1, 2),
        Err(InvocationError::NoImplementation { method: "add", .. })
    ));
}

#[test]
fn test_sealed_target_cannot_be_virtual() {
    trait Vault: Send + Sync {}

    impl ProxyTarget for dyn Vault {
        const SEALED: bool = true;

        fn methods() -> &'static [MethodSignature] {
            &[]
        }

        fn into_proxy(proxy: Proxy<Self>) -> Arc<Self> {
            Arc::new(proxy)
        }
    }

    impl Vault for Proxy<dyn Vault> {}

    struct Safe;
    impl Vault for Safe {}

    let ctx = ApplicationContext::new();
    assert!(matches!(
        ctx.bind::<dyn Vault>().to_virtual_proxy(ProxyDescriptor::new::<dyn Vault>()),
        Err(ContainerError::ProxyConstraintViolation { .. })
    ));

    // A sealed target can still be wrapped around a real delegate.
    ctx.bind::<dyn Vault>()
        .intercept(ProxyDescriptor::new::<dyn Vault>())
        .to_arc(|_| Ok(Arc::new(Safe)))
        .unwrap();
    ctx.get::<dyn Vault>().unwrap();
}

#[test]
fn test_proxying_not_permitted() {
    let ctx = ApplicationContext::new();
    let log: Log = Arc::default();
    let target_log = log.clone();

    let result = ctx
        .bind::<dyn Calculator>()
        .permit_proxying(false)
        .intercept(ProxyDescriptor::new::<dyn Calculator>())
        .to_arc(move |_| Ok(Arc::new(Basic { log: target_log.clone() })));
    assert!(matches!(result, Err(ContainerError::ProxyConstraintViolation { .. })));

    let virtual_result = ctx
        .bind::<dyn Calculator>()
        .permit_proxying(false)
        .to_virtual_proxy(
            ProxyDescriptor::new::<dyn Calculator>().intercept_fn(MethodMatcher::any(), |_, _| Ok(Box::new(0i64))),
        );
    assert!(matches!(virtual_result, Err(ContainerError::ProxyConstraintViolation { .. })));
}

#[test]
fn test_descriptor_for_another_interface_is_rejected() {
    trait Other: Send + Sync {}

    let ctx = ApplicationContext::new();
    let log: Log = Arc::default();
    let target_log = log.clone();

    let result = ctx
        .bind::<dyn Calculator>()
        .intercept(ProxyDescriptor::new::<dyn Other>())
        .to_arc(move |_| Ok(Arc::new(Basic { log: target_log.clone() })));
    assert!(matches!(result, Err(ContainerError::ProxyConstraintViolation { .. })));
}

use ferrous_context::{ApplicationContext, ComponentKey, ContainerError, ContextOptions, Resolver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

struct FixedClock(u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

struct Greeter {
    clock: Arc<dyn Clock>,
}

impl Greeter {
    fn greet(&self, name: &str) -> String {
        format!("Hello {} at {}", name, self.clock.now())
    }
}

#[test]
fn test_singleton_identity() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let ctx = ApplicationContext::new();
    ctx.bind::<String>()
        .to(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("hello".to_string())
        })
        .unwrap();

    let a = ctx.get::<String>().unwrap();
    let b = ctx.get::<String>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.singletons().len(), 1);
}

#[test]
fn test_prototype_creates_new_instances() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let ctx = ApplicationContext::new();
    ctx.bind::<usize>()
        .prototype()
        .to(move |_| Ok(counter.fetch_add(1, Ordering::SeqCst)))
        .unwrap();

    assert_eq!(*ctx.get::<usize>().unwrap(), 0);
    assert_eq!(*ctx.get::<usize>().unwrap(), 1);
    assert_eq!(*ctx.get::<usize>().unwrap(), 2);
    assert!(ctx.singletons().is_empty());
}

#[test]
fn test_clock_greeter_scenario() {
    let ctx = ApplicationContext::new();
    ctx.bind::<dyn Clock>()
        .singleton()
        .to_arc(|_| Ok(Arc::new(FixedClock(1_000))))
        .unwrap();
    ctx.bind::<Greeter>()
        .prototype()
        .depends_on::<dyn Clock>()
        .to(|r| Ok(Greeter { clock: r.get::<dyn Clock>()? }))
        .unwrap();

    let first = ctx.get::<Greeter>().unwrap();
    let second = ctx.get::<Greeter>().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first.clock, &second.clock));
    assert_eq!(first.greet("Ada"), "Hello Ada at 1000");
}

#[test]
fn test_exposed_interface_shares_the_singleton() {
    struct Service;
    impl Clock for Service {
        fn now(&self) -> u64 {
            7
        }
    }

    let ctx = ApplicationContext::new();
    ctx.bind::<Service>()
        .exposes::<dyn Clock, _>(|s| s as Arc<dyn Clock>)
        .to(|_| Ok(Service))
        .unwrap();

    let concrete = ctx.get::<Service>().unwrap();
    let clock = ctx.get::<dyn Clock>().unwrap();
    assert_eq!(clock.now(), 7);
    assert_eq!(
        Arc::as_ptr(&concrete) as *const u8,
        Arc::as_ptr(&clock) as *const () as *const u8
    );
}

#[test]
fn test_to_instance_and_to_value() {
    let ctx = ApplicationContext::new();
    let shared = Arc::new(FixedClock(3));
    ctx.bind::<FixedClock>().to_instance(shared.clone()).unwrap();
    ctx.bind::<u32>().to_value(99).unwrap();

    assert!(Arc::ptr_eq(&ctx.get::<FixedClock>().unwrap(), &shared));
    assert_eq!(*ctx.get::<u32>().unwrap(), 99);
}

#[test]
fn test_unbound_required_fails_with_key_and_trace() {
    struct Missing;
    struct Needs;

    let ctx = ApplicationContext::new();
    ctx.bind::<Needs>()
        .to(|r| {
            r.get::<Missing>()?;
            Ok(Needs)
        })
        .unwrap();

    match ctx.get::<Needs>() {
        Err(ContainerError::ComponentResolution { key, trace, .. }) => {
            assert_eq!(key, ComponentKey::of::<Missing>());
            assert_eq!(trace.keys(), &[ComponentKey::of::<Needs>(), ComponentKey::of::<Missing>()]);
            assert!(trace.to_string().contains("Needs"));
        }
        other => panic!("expected ComponentResolution, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_get_key_checks_the_type() {
    let ctx = ApplicationContext::new();
    ctx.bind::<u32>().to_value(1).unwrap();

    let err = ctx.get_key::<u64>(&ComponentKey::of::<u32>()).unwrap_err();
    assert!(matches!(err, ContainerError::TypeMismatch { .. }));
    assert_eq!(*ctx.get_key::<u32>(&ComponentKey::of::<u32>()).unwrap(), 1);
}

#[test]
fn test_rebinding_a_resolved_type_fails() {
    let ctx = ApplicationContext::new();
    ctx.bind::<u8>().to_value(1).unwrap();
    ctx.get::<u8>().unwrap();

    let err = ctx.bind::<u8>().priority(5).to_value(2).unwrap_err();
    assert!(matches!(err, ContainerError::BindingAfterResolution { .. }));

    // Unrelated types can still be added.
    ctx.bind::<u16>().to_value(2).unwrap();
    assert_eq!(*ctx.get::<u16>().unwrap(), 2);
}

#[test]
fn test_seal_on_first_get() {
    let ctx = ApplicationContext::with_options(ContextOptions::new().seal_on_first_get(true));
    ctx.bind::<u8>().to_value(1).unwrap();
    ctx.get::<u8>().unwrap();

    assert!(ctx.registry().is_sealed());
    assert!(matches!(
        ctx.bind::<u16>().to_value(2),
        Err(ContainerError::Sealed { .. })
    ));
}

#[test]
fn test_closed_context_rejects_everything() {
    let ctx = ApplicationContext::new();
    ctx.bind::<u8>().to_value(1).unwrap();
    ctx.get::<u8>().unwrap();

    ctx.close();
    assert!(ctx.is_closed());
    match ctx.get::<u8>() {
        Err(err @ ContainerError::Closed { .. }) => assert_eq!(err.key(), Some(&ComponentKey::of::<u8>())),
        other => panic!("expected Closed, got {:?}", other.map(|_| ())),
    }
    assert!(matches!(ctx.bind::<u16>().to_value(2), Err(ContainerError::Closed { .. })));

    // Closing twice is harmless.
    ctx.close();
}

#[test]
fn test_clones_share_state() {
    let ctx = ApplicationContext::new();
    let other = ctx.clone();
    other.bind::<String>().to_value("shared".to_string()).unwrap();

    assert!(Arc::ptr_eq(&ctx.get::<String>().unwrap(), &other.get::<String>().unwrap()));
}

#[test]
fn test_context_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ApplicationContext>();
    assert_send_sync::<ferrous_context::ScopedContext>();
}

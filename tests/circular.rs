use ferrous_context::{
    ApplicationContext, ComponentKey, ComponentMetadata, ContainerError, ContextOptions, Instance, PostProcessor,
    Resolver, ResolverContext, BoxError,
};
use std::sync::Arc;

struct A;
struct B;
struct C;

fn circular_path(err: ContainerError) -> Vec<ComponentKey> {
    match err {
        ContainerError::CircularDependency { path } => path,
        other => panic!("expected CircularDependency, got {}", other),
    }
}

#[test]
fn test_two_node_cycle_reports_full_path() {
    let ctx = ApplicationContext::new();
    ctx.bind::<A>()
        .to(|r| {
            r.get::<B>()?;
            Ok(A)
        })
        .unwrap();
    ctx.bind::<B>()
        .to(|r| {
            r.get::<A>()?;
            Ok(B)
        })
        .unwrap();

    let path = circular_path(ctx.get::<A>().err().unwrap());
    assert_eq!(
        path,
        vec![ComponentKey::of::<A>(), ComponentKey::of::<B>(), ComponentKey::of::<A>()]
    );
}

#[test]
fn test_self_dependency() {
    let ctx = ApplicationContext::new();
    ctx.bind::<A>()
        .to(|r| {
            r.get::<A>()?;
            Ok(A)
        })
        .unwrap();

    let path = circular_path(ctx.get::<A>().err().unwrap());
    assert_eq!(path, vec![ComponentKey::of::<A>(), ComponentKey::of::<A>()]);
}

#[test]
fn test_declared_cycle_starts_from_first_occurrence() {
    let ctx = ApplicationContext::new();
    ctx.bind::<A>().depends_on::<B>().to(|_| Ok(A)).unwrap();
    ctx.bind::<B>().depends_on::<C>().to(|_| Ok(B)).unwrap();
    ctx.bind::<C>().depends_on::<B>().to(|_| Ok(C)).unwrap();

    let err = ctx.get::<A>().err().unwrap();
    assert!(err.to_string().contains(" -> "));
    assert_eq!(
        circular_path(err),
        vec![ComponentKey::of::<B>(), ComponentKey::of::<C>(), ComponentKey::of::<B>()]
    );
}

#[test]
fn test_cycle_through_an_exposed_interface() {
    trait Port: Send + Sync {}
    struct Adapter;
    impl Port for Adapter {}

    let ctx = ApplicationContext::new();
    ctx.bind::<Adapter>()
        .exposes::<dyn Port, _>(|a| a as Arc<dyn Port>)
        .to(|r| {
            r.get::<dyn Port>()?;
            Ok(Adapter)
        })
        .unwrap();

    let path = circular_path(ctx.get::<dyn Port>().err().unwrap());
    assert_eq!(
        path,
        vec![
            ComponentKey::of::<dyn Port>(),
            ComponentKey::of::<Adapter>(),
            ComponentKey::of::<dyn Port>(),
        ]
    );
}

#[test]
fn test_post_processor_cannot_reintroduce_the_key() {
    struct Reentrant;

    impl PostProcessor for Reentrant {
        fn applies_to(&self, metadata: &ComponentMetadata) -> bool {
            metadata.key == ComponentKey::of::<A>()
        }

        fn process(
            &self,
            instance: Instance,
            _metadata: &ComponentMetadata,
            resolver: &ResolverContext<'_>,
        ) -> Result<Instance, BoxError> {
            resolver.get::<A>()?;
            Ok(instance)
        }
    }

    let ctx = ApplicationContext::new();
    ctx.add_post_processor(Reentrant);
    ctx.bind::<A>().to(|_| Ok(A)).unwrap();

    let path = circular_path(ctx.get::<A>().err().unwrap());
    assert_eq!(path, vec![ComponentKey::of::<A>(), ComponentKey::of::<A>()]);
}

#[test]
fn test_optional_resolution_propagates_cycles() {
    let ctx = ApplicationContext::new();
    ctx.bind::<A>()
        .to(|r| {
            r.get_optional::<A>()?;
            Ok(A)
        })
        .unwrap();

    assert!(matches!(
        ctx.get_optional::<A>(),
        Err(ContainerError::CircularDependency { .. })
    ));
}

#[test]
fn test_failed_cycle_leaves_nothing_cached() {
    let ctx = ApplicationContext::new();
    ctx.bind::<A>()
        .to(|r| {
            r.get::<B>()?;
            Ok(A)
        })
        .unwrap();
    ctx.bind::<B>()
        .to(|r| {
            r.get::<A>()?;
            Ok(B)
        })
        .unwrap();
    ctx.bind::<C>().to(|_| Ok(C)).unwrap();

    assert!(ctx.get::<A>().is_err());
    assert!(ctx.get::<B>().is_err());
    assert!(ctx.singletons().is_empty());

    // Unrelated components still resolve.
    ctx.get::<C>().unwrap();
    assert_eq!(ctx.singletons().len(), 1);
}

#[test]
fn test_depth_limit() {
    let ctx = ApplicationContext::with_options(ContextOptions::new().max_depth(2));
    ctx.bind::<A>().depends_on::<B>().to(|_| Ok(A)).unwrap();
    ctx.bind::<B>().depends_on::<C>().to(|_| Ok(B)).unwrap();
    ctx.bind::<C>().to(|_| Ok(C)).unwrap();

    match ctx.get::<A>() {
        Err(ContainerError::DepthExceeded { key, depth }) => {
            assert_eq!(key, ComponentKey::of::<C>());
            assert_eq!(depth, 2);
        }
        other => panic!("expected DepthExceeded, got {:?}", other.map(|_| ())),
    }
    ctx.get::<B>().unwrap();
}

trait Handler: Send + Sync {
    fn handle(&self) -> String;
}

struct Chain {
    name: &'static str,
    next: Option<Arc<dyn Handler>>,
}

impl Handler for Chain {
    fn handle(&self) -> String {
        match &self.next {
            Some(next) => format!("{} -> {}", self.name, next.handle()),
            None => self.name.to_string(),
        }
    }
}

fn bind_outer_chain(ctx: &ApplicationContext) {
    ctx.bind::<dyn Handler>()
        .to_arc(|r| {
            let next = r.get_optional_qualified::<dyn Handler>("delegate")?;
            Ok(Arc::new(Chain { name: "outer", next }))
        })
        .unwrap();
}

#[test]
fn test_self_delegate_without_a_delegate_binding_is_absent() {
    let ctx = ApplicationContext::new();
    bind_outer_chain(&ctx);

    // The default binding is in flight, so it cannot serve as its own delegate.
    assert_eq!(ctx.get::<dyn Handler>().unwrap().handle(), "outer");
}

#[test]
fn test_self_delegate_resolves_a_distinct_binding() {
    let ctx = ApplicationContext::new();
    bind_outer_chain(&ctx);
    ctx.bind::<dyn Handler>()
        .qualifier("delegate")
        .to_arc(|_| Ok(Arc::new(Chain { name: "inner", next: None })))
        .unwrap();

    assert_eq!(ctx.get::<dyn Handler>().unwrap().handle(), "outer -> inner");
}

#[test]
fn test_required_self_delegate_is_missing_not_circular() {
    let ctx = ApplicationContext::new();
    ctx.bind::<dyn Handler>()
        .to_arc(|r| {
            let next = r.get_qualified::<dyn Handler>("delegate")?;
            Ok(Arc::new(Chain { name: "outer", next: Some(next) }))
        })
        .unwrap();

    match ctx.get::<dyn Handler>() {
        Err(ContainerError::ComponentResolution { key, .. }) => {
            assert_eq!(key, ComponentKey::qualified::<dyn Handler>("delegate"));
        }
        other => panic!("expected ComponentResolution, got {:?}", other.map(|_| ())),
    }
}

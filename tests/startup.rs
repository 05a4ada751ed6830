use ferrous_context::{
    ApplicationContext, ComponentKey, ContainerError, ContainerObserver, Resolver, TracingObserver, ValidationIssue,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Database;
struct Cache;
struct Metrics;
struct Lazy;

type Log = Arc<Mutex<Vec<&'static str>>>;

#[test]
fn test_prewarm_orders_by_processing_priority() {
    let log: Log = Arc::default();
    let ctx = ApplicationContext::new();

    let l = log.clone();
    ctx.bind::<Cache>()
        .eager()
        .to(move |_| {
            l.lock().unwrap().push("cache");
            Ok(Cache)
        })
        .unwrap();
    let l = log.clone();
    ctx.bind::<Database>()
        .eager()
        .processing_priority(10)
        .to(move |_| {
            l.lock().unwrap().push("database");
            Ok(Database)
        })
        .unwrap();
    let l = log.clone();
    ctx.bind::<Metrics>()
        .eager()
        .to(move |_| {
            l.lock().unwrap().push("metrics");
            Ok(Metrics)
        })
        .unwrap();
    let l = log.clone();
    ctx.bind::<Lazy>()
        .to(move |_| {
            l.lock().unwrap().push("lazy");
            Ok(Lazy)
        })
        .unwrap();

    assert_eq!(ctx.prewarm().unwrap(), 3);
    assert_eq!(*log.lock().unwrap(), vec!["database", "cache", "metrics"]);

    // Already constructed singletons are not counted again.
    assert_eq!(ctx.prewarm().unwrap(), 0);
    ctx.get::<Lazy>().unwrap();
    assert_eq!(log.lock().unwrap().len(), 4);
}

#[test]
fn test_prewarm_skips_disabled_conditions_and_reports_failures() {
    let ctx = ApplicationContext::new();
    ctx.bind::<Cache>()
        .eager()
        .when(|c| c.has_property("cache.enabled"))
        .to(|_| Ok(Cache))
        .unwrap();
    assert_eq!(ctx.prewarm().unwrap(), 0);

    ctx.bind::<Database>()
        .eager()
        .to(|_| Err("connection refused".into()))
        .unwrap();
    assert!(matches!(ctx.prewarm(), Err(ContainerError::Application { .. })));
}

#[test]
fn test_validate_reports_configuration_issues() {
    let ctx = ApplicationContext::new();
    ctx.bind::<Database>().in_scope("request").to(|_| Ok(Database)).unwrap();
    ctx.bind::<Cache>().depends_on::<Database>().to(|_| Ok(Cache)).unwrap();
    ctx.bind::<Metrics>().depends_on::<Lazy>().to(|_| Ok(Metrics)).unwrap();

    let report = ctx.validate();
    assert_eq!(report.bindings_checked(), 3);
    assert!(report.issues().contains(&ValidationIssue::CaptiveDependency {
        singleton: ComponentKey::of::<Cache>(),
        dependency: ComponentKey::of::<Database>(),
        scope: "request".into(),
    }));
    assert!(report.issues().contains(&ValidationIssue::MissingDependency {
        binding: ComponentKey::of::<Metrics>(),
        dependency: ComponentKey::of::<Lazy>(),
    }));

    let err = report.into_result().unwrap_err();
    assert!(err.to_string().contains("2 issue(s)"));
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl ContainerObserver for Recorder {
    fn resolving(&self, key: &ComponentKey) {
        self.events.lock().unwrap().push(format!("resolving {}", short(key)));
    }

    fn resolved(&self, key: &ComponentKey, _elapsed: Duration, constructed: bool) {
        self.events
            .lock()
            .unwrap()
            .push(format!("resolved {} constructed={}", short(key), constructed));
    }

    fn failed(&self, key: &ComponentKey, _error: &ContainerError) {
        self.events.lock().unwrap().push(format!("failed {}", short(key)));
    }
}

fn short(key: &ComponentKey) -> &'static str {
    key.type_name().rsplit("::").next().unwrap_or_default()
}

#[test]
fn test_observers_see_nested_resolutions() {
    let recorder = Arc::new(Recorder::default());
    let ctx = ApplicationContext::new();
    ctx.add_observer(recorder.clone());
    ctx.add_observer(TracingObserver);

    ctx.bind::<Database>().to(|_| Ok(Database)).unwrap();
    ctx.bind::<Cache>().depends_on::<Database>().to(|_| Ok(Cache)).unwrap();

    ctx.get::<Cache>().unwrap();
    ctx.get::<Cache>().unwrap();
    assert!(ctx.get::<Lazy>().is_err());

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec![
            "resolving Cache",
            "resolving Database",
            "resolved Database constructed=true",
            "resolved Cache constructed=true",
            "resolving Cache",
            "resolved Cache constructed=false",
            "resolving Lazy",
            "failed Lazy",
        ]
    );
}

#[test]
fn test_descriptors_reflect_bindings() {
    let ctx = ApplicationContext::new();
    ctx.bind::<Database>().eager().processing_priority(3).to(|_| Ok(Database)).unwrap();
    ctx.bind::<Cache>().prototype().depends_on::<Database>().to(|_| Ok(Cache)).unwrap();

    let descriptors = ctx.descriptors();
    assert_eq!(descriptors.len(), 2);
    assert!(descriptors[0].eager);
    assert_eq!(descriptors[0].processing_priority, 3);
    assert_eq!(descriptors[1].dependencies[0].key, ComponentKey::of::<Database>());
    assert!(descriptors[1].to_string().contains("prototype"));
}

//! Hooks are process-wide, so everything touching them lives in one test.

use std::sync::{Arc, Mutex};

use failures::{Failure, Handler, Reporter, Scope, details, hooks};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
#[error("quota exceeded")]
struct QuotaExceeded;

#[test]
fn registered_hooks_shape_capture_and_dispatch() {
    assert!(hooks::registered().is_empty());

    hooks::register_detail_collector("service", || "billing");
    hooks::register_detail_collector("region", || json!(null));
    hooks::register_detail_collector("attempt", || 1);

    let reporter = Reporter::builder("charge")
        .detail("attempt", 2)
        .build()
        .unwrap();
    reporter
        .report_with(QuotaExceeded, details! { "customer" => "c-42" })
        .unwrap();

    let failure = &reporter.failures()[0];
    assert_eq!(failure.details().get("service"), Some(&json!("billing")));
    assert_eq!(failure.details().get("attempt"), Some(&json!(2)));
    assert_eq!(failure.details().get("customer"), Some(&json!("c-42")));
    assert!(!failure.details().contains_key("region"));

    let defaults = Arc::new(Mutex::new(Vec::new()));
    hooks::register_default_handler({
        let defaults = defaults.clone();
        move |failure: &Failure| defaults.lock().unwrap().push(failure.source().to_owned())
    });

    let registered = hooks::registered();
    assert_eq!(registered.len(), 4);
    assert!(registered[0].starts_with("Default failure handler"));
    assert!(registered.iter().all(|line| line.contains("tests/hooks.rs")));

    Handler::new().handle_reporter(&reporter);
    let swallowed = Scope::new("sync")
        .unwrap()
        .with_handler(Handler::new())
        .run(|_| Err::<(), _>(QuotaExceeded));
    assert_eq!(swallowed, None);
    assert_eq!(*defaults.lock().unwrap(), ["charge", "sync"]);

    hooks::reset_default_handler();
    hooks::clear_detail_collectors();
    assert!(hooks::registered().is_empty());

    let plain = Reporter::new("plain").unwrap();
    plain.report(QuotaExceeded).unwrap();
    assert!(plain.failures()[0].details().is_empty());
}

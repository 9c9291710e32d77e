use std::sync::{Arc, Mutex};

use failures::prelude::*;
use failures::{FailureStore, InvalidLabelError, label};

#[derive(Debug, thiserror::Error)]
#[error("key error: {0}")]
struct KeyError(&'static str);

#[derive(Debug, thiserror::Error)]
#[error("value error")]
struct ValueError;

#[derive(Debug, thiserror::Error)]
#[error("type error")]
struct TypeError;

#[derive(Debug, thiserror::Error)]
#[error("cache miss")]
struct CacheMiss;

#[derive(Clone, Default)]
struct Seen(Arc<Mutex<Vec<String>>>);

impl Seen {
    fn recorder(&self) -> impl Fn(&Failure) + Send + Sync + 'static {
        let seen = self.0.clone();
        move |failure: &Failure| seen.lock().unwrap().push(failure.source().to_owned())
    }

    fn sources(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[test]
fn child_labels_extend_the_parent_label() {
    let root = Reporter::new("user").unwrap();
    for name in ["get", "email", "items[0]", "fetch(remote)", "a-b"] {
        let child = root.child(name).unwrap();
        assert_eq!(child.label(), format!("user.{name}"));
        assert_eq!(child.name(), name);
    }

    let get = root.child("get").unwrap();
    let nested = get.child("email").unwrap();
    assert_eq!(nested.label(), "user.get.email");
    assert_eq!(nested.parent().unwrap().label(), "user.get");

    drop(get);
    assert!(nested.parent().is_none());
    assert_eq!(nested.label(), "user.get.email");
}

#[test]
fn invalid_labels_are_rejected_everywhere() {
    for name in ["", ".a", "a.", "a..b", "a b", "a[", "a[]", "a[b)", "a[b]c", "a/b"] {
        let error: InvalidLabelError = Reporter::new(name).unwrap_err();
        assert_eq!(error.label(), name);
        assert!(!label::is_valid(name));
        assert!(Scope::new(name).is_err());
        assert!(Scoped::new(name, |_: &Reporter, (): ()| Ok::<_, BoxError>(())).is_err());
    }

    let root = Reporter::new("root").unwrap();
    assert!(root.child("bad name").is_err());
}

#[test]
fn every_node_shares_one_store() {
    let root = Reporter::new("root").unwrap();
    let a = root.child("a").unwrap();
    let b = a.child("b").unwrap();
    assert!(FailureStore::ptr_eq(root.store(), a.store()));
    assert!(FailureStore::ptr_eq(root.store(), b.store()));

    let other = Reporter::new("root").unwrap();
    assert!(!FailureStore::ptr_eq(root.store(), other.store()));
}

#[test]
fn safe_records_normal_and_drops_optional() {
    let root = Reporter::new("root").unwrap();
    assert_eq!(root.safe(|| Ok::<_, ValueError>(3)).unwrap(), Some(3));
    assert_eq!(root.safe(|| Err::<i32, _>(ValueError)).unwrap(), None);
    assert_eq!(root.failures().len(), 1);

    let optional = root
        .child_builder("cache")
        .severity(Severity::Optional)
        .build()
        .unwrap();
    assert_eq!(optional.safe(|| Err::<i32, _>(ValueError)).unwrap(), None);
    assert_eq!(root.failures().len(), 1);
}

#[test]
fn required_propagates_the_original_error() {
    let root = Reporter::new("root").unwrap();
    let reporter = root.child("parse").unwrap();
    let error = reporter
        .required(|| Err::<(), _>(KeyError("id")))
        .unwrap_err();

    assert_eq!(error.failure().source(), "root.parse");
    assert_eq!(
        error.failure().downcast_ref::<KeyError>().unwrap().0,
        "id"
    );
    assert_eq!(error.to_string(), "failure at `root.parse`: key error: id");
    assert!(root.failures().is_empty());
}

fn inner() -> Result<(), FailureError> {
    Scope::new("inner")
        .unwrap()
        .run(|_| Err::<(), _>(KeyError("inner")))
}

fn middle() -> Result<(), FailureError> {
    Scope::new("middle").unwrap().run(|_| inner())
}

fn outer() -> Result<(), FailureError> {
    Scope::new("outer").unwrap().run(|_| middle())
}

#[test]
fn unrelated_scopes_compose_one_label() {
    let error = outer().unwrap_err();
    assert_eq!(error.failure().source(), "outer.middle.inner");
    assert!(error.failure().is::<KeyError>());
    assert!(error.store().is_empty());
}

#[test]
fn label_filter_selects_matching_sources() {
    let seen = Seen::default();
    let handler = Handler::builder()
        .on_matching("a.*", seen.recorder())
        .build()
        .unwrap();

    for source in ["a.b", "a.c", "z"] {
        handler.handle(&Failure::new(source, KeyError("x"), Details::new()));
    }
    assert_eq!(seen.sources(), ["a.b", "a.c"]);
}

#[test]
fn negated_error_filter_skips_that_type() {
    let seen = Seen::default();
    let handler = Handler::builder()
        .on_matching(Filter::not([Filter::error::<ValueError>()]), seen.recorder())
        .build()
        .unwrap();

    handler.handle(&Failure::new("value", ValueError, Details::new()));
    handler.handle(&Failure::new("type", TypeError, Details::new()));
    assert_eq!(seen.sources(), ["type"]);
}

#[test]
fn root_report_stores_one_undetailed_failure() {
    let root = Reporter::new("root").unwrap();
    root.report(KeyError("k")).unwrap();

    let failures = root.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].source(), "root");
    assert!(failures[0].details().is_empty());
}

#[test]
fn siblings_share_ordered_failures() {
    let root = Reporter::new("root").unwrap();
    let a = root.child("a").unwrap();
    let b = root.child("b").unwrap();
    a.report(KeyError("a")).unwrap();
    b.report(KeyError("b")).unwrap();

    for node in [&root, &a, &b] {
        let sources: Vec<_> = node
            .failures()
            .iter()
            .map(|failure| failure.source().to_owned())
            .collect();
        assert_eq!(sources, ["root.a", "root.b"]);
    }
}

#[test]
fn handled_root_collects_recorded_and_raised_failures() {
    let seen = Seen::default();
    let scope = Scope::new("user").unwrap().with_handler(seen.recorder());

    let result = scope.run(|reporter| {
        let cache = reporter
            .child_builder("cache")
            .severity(Severity::Normal)
            .build()
            .unwrap();
        report!(cache, CacheMiss);
        reporter
            .child("email")
            .unwrap()
            .required(|| Err::<String, _>(KeyError("email")))
    });

    assert_eq!(result, None);
    assert_eq!(seen.sources(), ["user.cache", "user.email"]);
}

#[test]
fn handled_scope_routes_by_filter() {
    let not_found = Seen::default();
    let everything_else = Seen::default();
    let handler = Handler::builder()
        .on_matching(Filter::error::<KeyError>(), not_found.recorder())
        .on_matching(!Filter::error::<KeyError>(), everything_else.recorder())
        .build()
        .unwrap();

    let scope = Scope::new("batch").unwrap().with_handler(handler);
    for index in 0..3 {
        let row = scope.child(&format!("row[{index}]")).unwrap();
        let output = row.run(|_| match index {
            0 => Ok(index),
            1 => Err(BoxError::from(KeyError("row"))),
            _ => Err(BoxError::from(ValueError)),
        });
        assert_eq!(output.is_some(), index == 0);
    }

    assert_eq!(not_found.sources(), ["batch.row[1]"]);
    assert_eq!(everything_else.sources(), ["batch.row[2]"]);
}

#[test]
fn handled_rows_dispatch_what_they_recorded() {
    let seen = Seen::default();
    let scope = Scope::new("batch").unwrap().with_handler(seen.recorder());

    for index in 0..2 {
        let row = scope.child(&format!("row[{index}]")).unwrap();
        let output = row.run(|reporter| {
            if index == 1 {
                let cache = reporter
                    .child_builder("cache")
                    .severity(Severity::Normal)
                    .build()
                    .unwrap();
                report!(cache, CacheMiss);
            }
            Ok::<_, FailureError>(index)
        });
        assert_eq!(output, Some(index));
    }

    assert_eq!(seen.sources(), ["batch.row[1].cache"]);
    assert_eq!(scope.reporter().failures().len(), 1);
}

#[test]
fn graded_scope_follows_reporter_severity() {
    let root = Reporter::new("sync").unwrap();
    let scope = Scope::from_reporter(root.child("remote").unwrap());
    assert_eq!(scope.run(|_| Err::<(), _>(ValueError)).unwrap(), None);
    assert_eq!(root.failures()[0].source(), "sync.remote");

    let required = Reporter::builder("strict")
        .severity(Severity::Required)
        .build()
        .unwrap();
    let error = Scope::from_reporter(required)
        .run(|_| Err::<(), _>(ValueError))
        .unwrap_err();
    assert_eq!(error.failure().source(), "strict");
}

#[test]
fn scoped_functions_attach_to_their_caller() {
    let fetch = Scoped::new("fetch", |reporter: &Reporter, id: u32| {
        reporter
            .child("decode")
            .unwrap()
            .required(|| if id == 0 { Err(KeyError("id")) } else { Ok(id * 2) })
    })
    .unwrap();

    let root = Reporter::new("api").unwrap();
    assert_eq!(fetch.call(Some(&root), 4).unwrap(), 8);
    assert_eq!(
        fetch.call(Some(&root), 0).unwrap_err().failure().source(),
        "api.fetch.decode"
    );
    assert_eq!(
        fetch.call(None, 0).unwrap_err().failure().source(),
        "fetch.decode"
    );
}

#[test]
fn guard_dispatches_failures_and_returns_other_errors() {
    let seen = Seen::default();
    let handler = Handler::from(seen.recorder());
    let reporter = Reporter::new("task").unwrap();

    let handled: Result<Option<()>, BoxError> =
        handler.guard(|| Ok(reporter.required(|| Err::<(), _>(ValueError))?));
    assert!(matches!(handled, Ok(None)));

    let passed: Result<Option<()>, BoxError> = handler.guard(|| Err(TypeError.into()));
    assert!(passed.unwrap_err().is::<TypeError>());
    assert_eq!(seen.sources(), ["task"]);
}

#[test]
fn replaying_a_reporter_keeps_insertion_order() {
    let root = Reporter::new("import").unwrap();
    for (index, name) in ["a", "b", "c"].into_iter().enumerate() {
        root.child(name)
            .unwrap()
            .report_with(ValueError, details! { "index" => index })
            .unwrap();
    }

    let seen = Seen::default();
    Handler::from(seen.recorder()).handle_reporter(&root);
    assert_eq!(seen.sources(), ["import.a", "import.b", "import.c"]);
    assert_eq!(root.failures().len(), 3);
}

#[test]
fn details_layer_from_node_to_call_site() {
    let root = Reporter::builder("job")
        .detail("attempt", 1)
        .detail("host", "a")
        .build()
        .unwrap();
    let step = root
        .child_builder("step")
        .detail("host", "b")
        .build()
        .unwrap();
    step.report_with(ValueError, details! { "row" => 7 }).unwrap();

    let failure = &step.failures()[0];
    assert_eq!(
        failure.details().to_string(),
        r#"{attempt=1, host="b", row=7}"#
    );
}

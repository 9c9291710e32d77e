use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use failures::prelude::*;

#[derive(Debug, thiserror::Error)]
#[error("timed out after {0:?}")]
struct Timeout(Duration);

#[derive(Debug, thiserror::Error)]
#[error("bad status {0}")]
struct BadStatus(u16);

async fn fetch(status: u16) -> Result<String, BadStatus> {
    tokio::task::yield_now().await;
    match status {
        200 => Ok("ok".to_owned()),
        status => Err(BadStatus(status)),
    }
}

#[tokio::test]
async fn async_helpers_follow_severity() {
    let root = Reporter::new("client").unwrap();
    let get = root.child("get").unwrap();

    assert_eq!(get.safe_async(fetch(200)).await.unwrap().as_deref(), Some("ok"));
    assert_eq!(get.safe_async(fetch(500)).await.unwrap(), None);
    assert_eq!(get.optional_async(fetch(404)).await, None);

    let error = get.required_async(fetch(503)).await.unwrap_err();
    assert_eq!(error.failure().source(), "client.get");
    assert!(error.failure().is::<BadStatus>());

    let failures = root.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].error().to_string(), "bad status 500");
}

#[tokio::test]
async fn async_scope_labels_body_errors() {
    let scope = Scope::new("sync").unwrap();
    let result = scope
        .run_async(|reporter| async move {
            let remote = reporter.child("remote").unwrap();
            remote
                .required_async(async { Err::<(), _>(Timeout(Duration::from_secs(3))) })
                .await
        })
        .await;

    let error = result.unwrap_err();
    assert_eq!(error.failure().source(), "sync.remote");
    assert_eq!(error.failure().error().to_string(), "timed out after 3s");
}

#[tokio::test]
async fn async_handled_scope_across_tasks() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = Handler::from({
        let seen = seen.clone();
        move |failure: &Failure| seen.lock().unwrap().push(failure.source().to_owned())
    });
    let scope = Scope::new("batch").unwrap().with_handler(handler);

    let output = scope
        .run_async(|reporter| async move {
            let mut tasks = Vec::new();
            for status in [200, 500, 200] {
                let worker = reporter
                    .child_builder(format!("item[{status}]"))
                    .severity(Severity::Normal)
                    .build()
                    .unwrap();
                tasks.push(tokio::spawn(async move { worker.safe_async(fetch(status)).await }));
            }
            let mut fetched = 0;
            for task in tasks {
                if task.await.unwrap()?.is_some() {
                    fetched += 1;
                }
            }
            Ok::<_, FailureError>(fetched)
        })
        .await;

    assert_eq!(output, Some(2));
    assert_eq!(*seen.lock().unwrap(), ["batch.item[500]"]);
}

#[tokio::test]
async fn scoped_async_functions() {
    let lookup = Scoped::new("lookup", |reporter: Reporter, status: u16| async move {
        reporter.required_async(fetch(status)).await
    })
    .unwrap();

    let root = Reporter::new("api").unwrap();
    assert_eq!(lookup.call_async(Some(&root), 200).await.unwrap(), "ok");
    let error = lookup.call_async(Some(&root), 418).await.unwrap_err();
    assert_eq!(error.failure().source(), "api.lookup");
}

#[tokio::test]
async fn guard_async_handles_raised_failures() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = Handler::from({
        let seen = seen.clone();
        move |failure: &Failure| seen.lock().unwrap().push(failure.to_string())
    });
    let reporter = Reporter::new("poller").unwrap();

    let result = handler
        .guard_async(reporter.required_async(fetch(502)))
        .await;
    assert!(matches!(result, Ok(None)));
    assert_eq!(*seen.lock().unwrap(), ["poller: bad status 502"]);
}

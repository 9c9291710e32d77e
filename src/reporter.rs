//! Reporter trees.
//!
//! A [`Reporter`] is a named node in a tree that mirrors the logical nesting
//! of an operation. Each node knows its fully qualified label, the details it
//! inherited from its ancestors and its [`Severity`]. All nodes of one tree
//! share a single [`FailureStore`].
//!
//! Reporting an error through a node turns it into a [`Failure`] labeled with
//! the node's path and then, depending on the severity:
//!
//! | severity   | effect                                         |
//! |------------|------------------------------------------------|
//! | `Required` | returned as `Err(FailureError)`                |
//! | `Normal`   | recorded in the shared store                   |
//! | `Optional` | discarded                                      |
//!
//! # Examples
//!
//! ```
//! use failures::{Reporter, Severity};
//!
//! let root = Reporter::new("import").unwrap();
//! let rows = root.child("rows").unwrap();
//!
//! rows.report("row 3 is malformed").unwrap();
//! rows.report("row 9 is malformed").unwrap();
//!
//! let failures = root.failures();
//! assert_eq!(failures.len(), 2);
//! assert_eq!(failures[0].source(), "import.rows");
//!
//! let strict = root.child_builder("header").severity(Severity::Required).build().unwrap();
//! let error = strict.report("missing header").unwrap_err();
//! assert_eq!(error.failure().source(), "import.header");
//! ```

use alloc::{
    string::String,
    sync::{Arc, Weak},
    vec::Vec,
};
use core::{fmt, future::IntoFuture};

use serde_json::Value;
use tracing::{debug, trace};

use crate::{
    BoxError, Details, Failure, FailureError, FailureStore, hooks,
    label::{self, InvalidLabelError},
};

/// What happens to failures reported through a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Severity {
    /// The failure propagates as `Err(FailureError)`.
    Required,
    /// The failure is recorded in the tree's store.
    #[default]
    Normal,
    /// The failure is discarded.
    Optional,
}

/// A node of a reporter tree.
///
/// Cloning a `Reporter` yields another handle to the same node.
#[derive(Clone)]
pub struct Reporter(Arc<Node>);

struct Node {
    name: String,
    label: String,
    parent: Weak<Node>,
    severity: Severity,
    details: Details,
    store: FailureStore,
}

impl Reporter {
    /// Creates a root reporter with [`Severity::Normal`].
    pub fn new(name: &str) -> Result<Self, InvalidLabelError> {
        Self::builder(name).build()
    }

    /// Starts building a root reporter.
    pub fn builder(name: impl Into<String>) -> ReporterBuilder {
        ReporterBuilder::new(name.into(), None)
    }

    /// Creates a child node that inherits this node's severity.
    pub fn child(&self, name: &str) -> Result<Self, InvalidLabelError> {
        self.child_builder(name).build()
    }

    /// Starts building a child node.
    pub fn child_builder(&self, name: impl Into<String>) -> ReporterBuilder {
        ReporterBuilder::new(name.into(), Some(self.clone()))
    }

    /// Builds a node from an already validated name.
    pub(crate) fn from_parts(
        name: String,
        parent: Option<&Reporter>,
        severity: Option<Severity>,
        details: Details,
    ) -> Self {
        let node = match parent {
            Some(parent) => Node {
                label: label::join(&parent.0.label, &name),
                parent: Arc::downgrade(&parent.0),
                severity: severity.unwrap_or(parent.0.severity),
                details: parent.0.details.merged(&details),
                store: parent.0.store.clone(),
                name,
            },
            None => Node {
                label: name.clone(),
                parent: Weak::new(),
                severity: severity.unwrap_or_default(),
                details,
                store: FailureStore::new(),
                name,
            },
        };
        Self(Arc::new(node))
    }

    /// The node's own name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The fully qualified label, from the root down to this node.
    pub fn label(&self) -> &str {
        &self.0.label
    }

    /// The node's severity.
    pub fn severity(&self) -> Severity {
        self.0.severity
    }

    /// The node's details, including the inherited ones.
    pub fn details(&self) -> &Details {
        &self.0.details
    }

    /// The parent node, if it exists and is still alive.
    ///
    /// Children do not keep their parent alive: once every handle to the
    /// parent has been dropped this returns `None`, while the child keeps its
    /// label, details and store.
    pub fn parent(&self) -> Option<Reporter> {
        self.0.parent.upgrade().map(Reporter)
    }

    /// The store shared by the whole tree.
    pub fn store(&self) -> &FailureStore {
        &self.0.store
    }

    /// The failures recorded so far by the whole tree, in order.
    pub fn failures(&self) -> Vec<Failure> {
        self.0.store.snapshot()
    }

    /// Reports an error with the node's severity.
    pub fn report<E>(&self, error: E) -> Result<(), FailureError>
    where
        E: Into<BoxError>,
    {
        self.report_with(error, Details::new())
    }

    /// Reports an error with extra call-site details.
    pub fn report_with<E>(&self, error: E, details: Details) -> Result<(), FailureError>
    where
        E: Into<BoxError>,
    {
        let failure = self.capture(error.into(), &details);
        self.settle(failure)
    }

    /// Runs `f`, propagating its error as a failure of this node whatever the
    /// node's severity.
    ///
    /// ```
    /// use failures::Reporter;
    ///
    /// let reporter = Reporter::new("parse").unwrap();
    /// let error = reporter
    ///     .required(|| "x".parse::<u32>())
    ///     .unwrap_err();
    /// assert_eq!(error.failure().source(), "parse");
    /// assert!(reporter.failures().is_empty());
    /// ```
    pub fn required<T, E, F>(&self, f: F) -> Result<T, FailureError>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<BoxError>,
    {
        f().map_err(|error| self.raise(error.into()))
    }

    /// Runs `f`, reporting its error with the node's severity.
    ///
    /// Returns `Ok(None)` when the error was recorded or discarded.
    pub fn safe<T, E, F>(&self, f: F) -> Result<Option<T>, FailureError>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<BoxError>,
    {
        self.graded(f())
    }

    /// Runs `f`, discarding its error.
    pub fn optional<T, E, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.suppressed(f())
    }

    /// Async version of [`required`](Self::required).
    pub async fn required_async<T, E, F>(&self, future: F) -> Result<T, FailureError>
    where
        F: IntoFuture<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        future.await.map_err(|error| self.raise(error.into()))
    }

    /// Async version of [`safe`](Self::safe).
    pub async fn safe_async<T, E, F>(&self, future: F) -> Result<Option<T>, FailureError>
    where
        F: IntoFuture<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        self.graded(future.await)
    }

    /// Async version of [`optional`](Self::optional).
    pub async fn optional_async<T, E, F>(&self, future: F) -> Option<T>
    where
        F: IntoFuture<Output = Result<T, E>>,
    {
        self.suppressed(future.await)
    }

    fn graded<T, E>(&self, outcome: Result<T, E>) -> Result<Option<T>, FailureError>
    where
        E: Into<BoxError>,
    {
        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(error) => self.report(error).map(|()| None),
        }
    }

    fn suppressed<T, E>(&self, outcome: Result<T, E>) -> Option<T> {
        if outcome.is_err() {
            trace!(source = %self.0.label, "failure suppressed");
        }
        outcome.ok()
    }

    pub(crate) fn settle(&self, failure: Failure) -> Result<(), FailureError> {
        match self.0.severity {
            Severity::Required => Err(FailureError::new(failure, self.0.store.clone())),
            Severity::Normal => {
                trace!(source = %failure.source(), "failure recorded");
                self.0.store.push(failure);
                Ok(())
            }
            Severity::Optional => {
                trace!(source = %failure.source(), "failure discarded");
                Ok(())
            }
        }
    }

    /// Captures `error` and wraps it for propagation.
    pub(crate) fn raise(&self, error: BoxError) -> FailureError {
        FailureError::new(self.capture(error, &Details::new()), self.0.store.clone())
    }

    /// Turns `error` into a failure of this node.
    pub(crate) fn capture(&self, error: BoxError, details: &Details) -> Failure {
        let failure = match error.downcast::<FailureError>() {
            Ok(raised) => self.adopt(*raised, details),
            Err(error) => {
                let mut merged = hooks::collect_details();
                merged.extend_from(&self.0.details);
                merged.extend_from(details);
                Failure::from_shared(self.0.label.clone(), Arc::from(error), merged)
            }
        };
        debug!(
            source = %failure.source(),
            severity = ?self.0.severity,
            error = %failure.error(),
            "failure captured"
        );
        failure
    }

    /// Takes over a failure raised by a reporter, qualifying it if it comes
    /// from another tree.
    fn adopt(&self, raised: FailureError, details: &Details) -> Failure {
        let (failure, store) = raised.into_parts();
        if FailureStore::ptr_eq(&store, &self.0.store) {
            return failure;
        }

        let recorded = store.snapshot();
        if !recorded.is_empty() {
            trace!(
                from = %failure.source(),
                into = %self.0.label,
                count = recorded.len(),
                "re-homing recorded failures"
            );
            let empty = Details::new();
            self.0.store.extend(
                recorded
                    .iter()
                    .map(|recorded| recorded.within(&self.0.label, &empty)),
            );
        }

        failure.within(&self.0.label, &self.0.details.merged(details))
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reporter").field(&self.0.label).finish()
    }
}

/// Builder for [`Reporter`] nodes, see [`Reporter::builder`] and
/// [`Reporter::child_builder`].
#[must_use]
pub struct ReporterBuilder {
    name: String,
    parent: Option<Reporter>,
    severity: Option<Severity>,
    details: Details,
}

impl ReporterBuilder {
    fn new(name: String, parent: Option<Reporter>) -> Self {
        Self {
            name,
            parent,
            severity: None,
            details: Details::new(),
        }
    }

    /// Sets the severity. Without it, a child inherits its parent's severity
    /// and a root uses [`Severity::Normal`].
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Adds one detail.
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key, value);
        self
    }

    /// Adds several details.
    pub fn details(mut self, details: Details) -> Self {
        self.details.extend_from(&details);
        self
    }

    /// Validates the name and creates the node.
    pub fn build(self) -> Result<Reporter, InvalidLabelError> {
        label::validate(&self.name)?;
        Ok(Reporter::from_parts(
            self.name,
            self.parent.as_ref(),
            self.severity,
            self.details,
        ))
    }
}

impl fmt::Debug for ReporterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReporterBuilder")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("severity", &self.severity)
            .field("details", &self.details)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::details;

    #[derive(Debug, thiserror::Error)]
    #[error("value error")]
    struct ValueError;

    #[derive(Debug, thiserror::Error)]
    #[error("key error")]
    struct KeyError;

    #[test]
    fn test_labels() {
        let root = Reporter::new("root").unwrap();
        let sub = root.child("sub").unwrap();
        let leaf = sub.child("iteration[5]").unwrap();

        assert_eq!(root.label(), "root");
        assert_eq!(sub.label(), "root.sub");
        assert_eq!(leaf.label(), "root.sub.iteration[5]");
        assert_eq!(leaf.name(), "iteration[5]");
        assert_eq!(leaf.parent().unwrap().label(), "root.sub");
        assert!(root.parent().is_none());
        assert_eq!(format!("{leaf:?}"), r#"Reporter("root.sub.iteration[5]")"#);
    }

    #[test]
    fn test_parent_link_does_not_own() {
        let root = Reporter::new("root").unwrap();
        let leaf = root.child("sub").unwrap().child("leaf").unwrap();

        assert!(leaf.parent().is_none());
        assert_eq!(leaf.label(), "root.sub.leaf");
        leaf.report(KeyError).unwrap();
        assert_eq!(root.failures()[0].source(), "root.sub.leaf");
    }

    #[test]
    fn test_invalid_names() {
        assert!(Reporter::new("").is_err());
        assert!(Reporter::new("name..sub").is_err());
        let root = Reporter::new("root").unwrap();
        assert!(root.child("a b").is_err());
    }

    #[test]
    fn test_shared_store() {
        let root = Reporter::new("root").unwrap();
        let a = root.child("a").unwrap();
        let b = root.child("b").unwrap();
        let deep = a.child("x").unwrap().child("y").unwrap();

        for node in [&a, &b, &deep] {
            assert!(FailureStore::ptr_eq(root.store(), node.store()));
        }

        a.report(ValueError).unwrap();
        b.report(KeyError).unwrap();

        let sources: Vec<_> = b.failures().iter().map(|f| f.source().to_owned()).collect();
        assert_eq!(sources, ["root.a", "root.b"]);
        assert_eq!(deep.failures().len(), 2);
    }

    #[test]
    fn test_details_inheritance() {
        let root = Reporter::builder("root")
            .detail("a", 1)
            .detail("b", 1)
            .build()
            .unwrap();
        let child = root
            .child_builder("child")
            .details(details! { "b" => 2, "c" => 2 })
            .build()
            .unwrap();

        assert_eq!(child.details(), &details! { "a" => 1, "b" => 2, "c" => 2 });
        assert_eq!(root.details().len(), 2);

        child
            .report_with(ValueError, details! { "c" => 3 })
            .unwrap();
        let failure = &root.failures()[0];
        assert_eq!(failure.details().get("a"), Some(&json!(1)));
        assert_eq!(failure.details().get("b"), Some(&json!(2)));
        assert_eq!(failure.details().get("c"), Some(&json!(3)));
    }

    #[test]
    fn test_report_root_without_details() {
        let root = Reporter::new("root").unwrap();
        root.report(KeyError).unwrap();

        let failures = root.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].source(), "root");
        assert!(failures[0].is::<KeyError>());
        assert!(failures[0].details().is_empty());
    }

    #[test]
    fn test_severity() {
        let root = Reporter::new("root").unwrap();
        assert_eq!(root.severity(), Severity::Normal);

        let required = root
            .child_builder("required")
            .severity(Severity::Required)
            .build()
            .unwrap();
        let optional = root
            .child_builder("optional")
            .severity(Severity::Optional)
            .build()
            .unwrap();
        assert_eq!(required.child("inner").unwrap().severity(), Severity::Required);

        let error = required.report(ValueError).unwrap_err();
        assert_eq!(error.failure().source(), "root.required");
        assert!(optional.report(ValueError).is_ok());
        assert!(root.failures().is_empty());
    }

    #[test]
    fn test_safe() {
        let root = Reporter::new("root").unwrap();
        assert_eq!(root.safe(|| Ok::<_, ValueError>(5)).unwrap(), Some(5));
        assert_eq!(root.safe(|| Err::<i32, _>(ValueError)).unwrap(), None);
        assert_eq!(root.failures().len(), 1);

        let optional = root
            .child_builder("opt")
            .severity(Severity::Optional)
            .build()
            .unwrap();
        assert_eq!(optional.safe(|| Err::<i32, _>(ValueError)).unwrap(), None);
        assert_eq!(root.failures().len(), 1);
    }

    #[test]
    fn test_required() {
        let root = Reporter::new("root").unwrap();
        let sub = root.child("sub").unwrap();

        assert_eq!(sub.required(|| Ok::<_, ValueError>("ok")).unwrap(), "ok");
        let error = sub.required(|| Err::<(), _>(ValueError)).unwrap_err();
        assert_eq!(error.failure().source(), "root.sub");
        assert!(error.failure().is::<ValueError>());
        assert!(root.failures().is_empty());
    }

    #[test]
    fn test_optional() {
        let root = Reporter::new("root").unwrap();
        assert_eq!(root.optional(|| Err::<i32, _>(ValueError)), None);
        assert_eq!(root.optional(|| Ok::<_, ValueError>(1)), Some(1));
        assert!(root.failures().is_empty());
    }

    #[test]
    fn test_same_tree_failure_is_not_relabeled() {
        let root = Reporter::new("root").unwrap();
        let inner = root
            .child_builder("inner")
            .severity(Severity::Required)
            .build()
            .unwrap();

        let raised = inner.report(ValueError).unwrap_err();
        root.report(raised).unwrap();

        let failures = root.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].source(), "root.inner");
    }

    #[test]
    fn test_other_tree_failure_is_qualified() {
        let outer = Reporter::builder("outer")
            .detail("scope", "outer")
            .build()
            .unwrap();

        let other = Reporter::builder("other")
            .detail("scope", "other")
            .build()
            .unwrap();
        other.child("recorded").unwrap().report(KeyError).unwrap();
        let raised = other
            .child_builder("raised")
            .severity(Severity::Required)
            .build()
            .unwrap()
            .report(ValueError)
            .unwrap_err();

        outer.report(raised).unwrap();

        let failures = outer.failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].source(), "outer.other.recorded");
        assert_eq!(failures[1].source(), "outer.other.raised");
        assert_eq!(failures[1].details().get("scope"), Some(&json!("other")));
        assert!(failures[1].is::<ValueError>());
    }
}

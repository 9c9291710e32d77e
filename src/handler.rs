//! Routing failures to handler functions.
//!
//! A [`Handler`] is an ordered list of entries. Each entry pairs a
//! [`FailureHandler`] (usually a closure) with an optional [`Filter`]; a
//! failure is passed to every entry whose filter matches it, in the order the
//! entries were added. An entry without a filter receives every failure.
//!
//! A handler with no entries at all falls back to the process-wide default
//! handler registered through [`hooks::register_default_handler`], and to
//! [`print_failure`] when none is registered.
//!
//! [`hooks::register_default_handler`]: crate::hooks::register_default_handler
//!
//! # Examples
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use failures::{Failure, Handler, Reporter};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let handler = Handler::builder()
//!     .on_matching("import.*", {
//!         let seen = seen.clone();
//!         move |failure: &Failure| seen.lock().unwrap().push(failure.source().to_owned())
//!     })
//!     .build()
//!     .unwrap();
//!
//! let root = Reporter::new("import").unwrap();
//! root.child("rows").unwrap().report("bad row").unwrap();
//! root.report("bad file").unwrap();
//!
//! handler.handle_reporter(&root);
//! assert_eq!(*seen.lock().unwrap(), ["import.rows"]);
//! ```

use alloc::{format, string::String, vec::Vec};
use core::{fmt, future::IntoFuture, panic::Location};

use tracing::trace;
use triomphe::Arc;
use unsize::CoerceUnsize;

use crate::{
    Failure, Reporter, TryIntoFailure, hooks,
    filter::{Filter, InvalidFilterError},
};

/// Something that can receive failures.
///
/// Implemented for every `Fn(&Failure)` closure that is `Send + Sync`, and for
/// [`Handler`] itself so handlers can be nested.
pub trait FailureHandler: 'static + Send + Sync {
    /// Receives one failure.
    fn handle(&self, failure: &Failure);
}

impl<F> FailureHandler for F
where
    F: Fn(&Failure) + Send + Sync + 'static,
{
    fn handle(&self, failure: &Failure) {
        self(failure)
    }
}

struct Entry {
    handler: Arc<dyn FailureHandler>,
    filter: Option<Filter>,
    type_name: &'static str,
    added_at: &'static Location<'static>,
}

impl Entry {
    #[track_caller]
    fn new<H: FailureHandler>(handler: H, filter: Option<Filter>) -> Self {
        Self {
            handler: Arc::new(handler).unsize(unsize::Coercion!(to dyn FailureHandler)),
            filter,
            type_name: core::any::type_name::<H>(),
            added_at: Location::caller(),
        }
    }

    fn accepts(&self, failure: &Failure) -> bool {
        self.filter
            .as_ref()
            .is_none_or(|filter| filter.matches(failure))
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("handler", &self.type_name)
            .field("filter", &self.filter)
            .field(
                "added_at",
                &format_args!("{}:{}", self.added_at.file(), self.added_at.line()),
            )
            .finish()
    }
}

/// Dispatches failures to filtered handler functions.
///
/// Cloning a `Handler` is cheap; the entries are shared.
#[derive(Clone, Debug)]
pub struct Handler(Arc<Vec<Entry>>);

impl Handler {
    /// Creates a handler without entries, which uses the default handler.
    pub fn new() -> Self {
        Self(Arc::new(Vec::new()))
    }

    /// Starts building a handler.
    pub fn builder() -> HandlerBuilder {
        HandlerBuilder::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the handler has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Passes `failure` to every matching entry.
    pub fn handle(&self, failure: &Failure) {
        self.dispatch(failure);
    }

    /// Passes each failure to [`handle`](Self::handle), in order.
    pub fn handle_all<'a>(&self, failures: impl IntoIterator<Item = &'a Failure>) {
        for failure in failures {
            self.dispatch(failure);
        }
    }

    /// Handles every failure recorded so far by `reporter`'s tree.
    pub fn handle_reporter(&self, reporter: &Reporter) {
        self.handle_all(&reporter.failures());
    }

    /// Dispatches `failure` and returns how many entries received it.
    pub(crate) fn dispatch(&self, failure: &Failure) -> usize {
        if self.0.is_empty() {
            hooks::run_default_handler(failure);
            return 1;
        }

        let mut matched = 0;
        for entry in self.0.iter().filter(|entry| entry.accepts(failure)) {
            entry.handler.handle(failure);
            matched += 1;
        }
        trace!(source = %failure.source(), matched, "failure dispatched");
        matched
    }

    /// Runs `body`, handling the failure it returns.
    ///
    /// If the error carries a failure it is dispatched and the result is
    /// `Ok(None)`. Any other error is returned untouched.
    ///
    /// ```
    /// use failures::{Failure, FailureError, Handler, Reporter};
    ///
    /// let handler = Handler::from(|failure: &Failure| assert_eq!(failure.source(), "task"));
    /// let reporter = Reporter::new("task").unwrap();
    ///
    /// let result: Result<Option<()>, FailureError> =
    ///     handler.guard(|| reporter.required(|| Err("boom")));
    /// assert!(matches!(result, Ok(None)));
    /// ```
    pub fn guard<T, E, F>(&self, body: F) -> Result<Option<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: TryIntoFailure,
    {
        self.absorb(body())
    }

    /// Async version of [`guard`](Self::guard).
    pub async fn guard_async<T, E, F>(&self, body: F) -> Result<Option<T>, E>
    where
        F: IntoFuture<Output = Result<T, E>>,
        E: TryIntoFailure,
    {
        self.absorb(body.await)
    }

    fn absorb<T, E: TryIntoFailure>(&self, outcome: Result<T, E>) -> Result<Option<T>, E> {
        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(error) => {
                let raised = error.try_into_failure()?;
                self.dispatch(raised.failure());
                Ok(None)
            }
        }
    }
}

impl Default for Handler {
    fn default() -> Self {
        Self::new()
    }
}

impl FailureHandler for Handler {
    fn handle(&self, failure: &Failure) {
        self.dispatch(failure);
    }
}

impl<F> From<F> for Handler
where
    F: Fn(&Failure) + Send + Sync + 'static,
{
    #[track_caller]
    fn from(handler: F) -> Self {
        Self(Arc::new(alloc::vec![Entry::new(handler, None)]))
    }
}

/// Builder for [`Handler`].
#[must_use]
#[derive(Debug, Default)]
pub struct HandlerBuilder {
    entries: Vec<Entry>,
}

impl HandlerBuilder {
    /// Adds an entry that receives every failure.
    #[track_caller]
    pub fn on<H: FailureHandler>(mut self, handler: H) -> Self {
        self.entries.push(Entry::new(handler, None));
        self
    }

    /// Adds an entry that receives the failures matched by `filter`.
    ///
    /// Strings are accepted as label patterns.
    #[track_caller]
    pub fn on_matching<H: FailureHandler>(mut self, filter: impl Into<Filter>, handler: H) -> Self {
        self.entries.push(Entry::new(handler, Some(filter.into())));
        self
    }

    /// Checks every filter and creates the handler.
    pub fn build(self) -> Result<Handler, InvalidFilterError> {
        for filter in self.entries.iter().filter_map(|entry| entry.filter.as_ref()) {
            filter.check()?;
        }
        Ok(Handler(Arc::new(self.entries)))
    }
}

/// Writes `[FAILURE] <source> :: <error debug>(<error>) <local time>` to
/// stderr.
///
/// This is the handler of last resort for handlers without entries.
pub fn print_failure(failure: &Failure) {
    let time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    std::eprintln!("{}", failure_line(failure, time));
}

fn failure_line(failure: &Failure, time: impl fmt::Display) -> String {
    format!(
        "[FAILURE] {} :: {:?}({}) {}",
        failure.source(),
        failure.error(),
        failure.error(),
        time
    )
}

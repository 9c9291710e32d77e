//! Marker types selecting how a [`Scope`](crate::Scope) ends.
//!
//! The mode of a scope is a type parameter, so the return type of
//! [`Scope::run`](crate::Scope::run) follows from how the scope was created:
//!
//! | mode          | created with               | `run` returns                     |
//! |---------------|----------------------------|-----------------------------------|
//! | [`Propagate`] | [`Scope::new`]             | `Result<T, FailureError>`         |
//! | [`Graded`]    | [`Scope::from_reporter`]   | `Result<Option<T>, FailureError>` |
//! | [`Handled`]   | [`Scope::with_handler`]    | `Option<T>`                       |
//!
//! [`Scope::new`]: crate::Scope::new
//! [`Scope::from_reporter`]: crate::Scope::from_reporter
//! [`Scope::with_handler`]: crate::Scope::with_handler
//! [`FailureError`]: crate::FailureError
//!
//! # Examples
//!
//! ```
//! use failures::{Failure, FailureError, Scope, markers};
//!
//! let scope: Scope<markers::Propagate> = Scope::new("load").unwrap();
//! let result: Result<u8, FailureError> = scope.run(|_| "7".parse::<u8>());
//! assert_eq!(result.unwrap(), 7);
//!
//! let handled: Scope<markers::Handled> = scope.with_handler(|_: &Failure| {});
//! let result: Option<u8> = handled.run(|_| "x".parse::<u8>());
//! assert_eq!(result, None);
//! ```

use tracing::warn;

use crate::{BoxError, Details, Failure, FailureError, FailureStore, Handler, Reporter, label};

/// Errors escaping the scope propagate as [`FailureError`]s, whatever the
/// severity of the scope's reporter.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Hash)]
pub struct Propagate;

/// Errors escaping the scope are reported with the severity of the scope's
/// reporter.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Hash)]
pub struct Graded;

/// Errors escaping the scope are dispatched to a [`Handler`] and swallowed.
///
/// A handled run that is not nested in another handled run over the same
/// subtree also dispatches the failures recorded below its label while it
/// ran. Handled runs nested inside one only dispatch the failures they
/// catch, so nothing is handled twice.
#[derive(Clone, Debug)]
pub struct Handled {
    handler: Handler,
}

impl Handled {
    pub(crate) fn new(handler: Handler) -> Self {
        Self { handler }
    }

    /// The handler receiving the scope's failures.
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    fn deliver(&self, failure: &Failure) {
        if self.handler.dispatch(failure) == 0 {
            warn!(
                source = %failure.source(),
                error = %failure.error(),
                "failure swallowed without a matching handler entry"
            );
        }
    }
}

/// A running handled scope, registered with its tree's store until dropped.
#[doc(hidden)]
#[derive(Debug)]
pub struct HandledRun<'r> {
    store: &'r FailureStore,
    id: u64,
    recorded_from: usize,
    outermost: bool,
}

impl<'r> HandledRun<'r> {
    fn begin(reporter: &'r Reporter) -> Self {
        let store = reporter.store();
        let recorded_from = store.len();
        let (id, outermost) = store.begin_handled_run(reporter.label());
        Self {
            store,
            id,
            recorded_from,
            outermost,
        }
    }
}

impl Drop for HandledRun<'_> {
    fn drop(&mut self) {
        self.store.end_handled_run(self.id);
    }
}

mod sealed_scope_mode {
    pub trait Sealed: 'static {}

    impl Sealed for super::Propagate {}
    impl Sealed for super::Graded {}
    impl Sealed for super::Handled {}
}

/// How a scope turns the outcome of its body into its return value.
///
/// This trait is sealed; the implementations are [`Propagate`], [`Graded`]
/// and [`Handled`].
pub trait ScopeMode: sealed_scope_mode::Sealed + Clone {
    /// The return type of [`Scope::run`](crate::Scope::run) for a body
    /// producing a `T`.
    type Output<T>;

    /// Called before the body runs.
    #[doc(hidden)]
    fn enter<'r>(&self, _reporter: &'r Reporter) -> Option<HandledRun<'r>> {
        None
    }

    /// Settles the outcome of a body.
    #[doc(hidden)]
    fn finish<T>(
        &self,
        reporter: &Reporter,
        run: Option<HandledRun<'_>>,
        outcome: Result<T, BoxError>,
    ) -> Self::Output<T>;
}

impl ScopeMode for Propagate {
    type Output<T> = Result<T, FailureError>;

    fn finish<T>(
        &self,
        reporter: &Reporter,
        _: Option<HandledRun<'_>>,
        outcome: Result<T, BoxError>,
    ) -> Self::Output<T> {
        outcome.map_err(|error| reporter.raise(error))
    }
}

impl ScopeMode for Graded {
    type Output<T> = Result<Option<T>, FailureError>;

    fn finish<T>(
        &self,
        reporter: &Reporter,
        _: Option<HandledRun<'_>>,
        outcome: Result<T, BoxError>,
    ) -> Self::Output<T> {
        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(error) => reporter
                .settle(reporter.capture(error, &Details::new()))
                .map(|()| None),
        }
    }
}

impl ScopeMode for Handled {
    type Output<T> = Option<T>;

    fn enter<'r>(&self, reporter: &'r Reporter) -> Option<HandledRun<'r>> {
        Some(HandledRun::begin(reporter))
    }

    fn finish<T>(
        &self,
        reporter: &Reporter,
        run: Option<HandledRun<'_>>,
        outcome: Result<T, BoxError>,
    ) -> Self::Output<T> {
        let raised = outcome.map_err(|error| reporter.capture(error, &Details::new()));

        if let Some(run) = run.filter(|run| run.outermost) {
            for recorded in reporter
                .failures()
                .iter()
                .skip(run.recorded_from)
                .filter(|recorded| label::is_within(recorded.source(), reporter.label()))
            {
                self.deliver(recorded);
            }
        }

        match raised {
            Ok(value) => Some(value),
            Err(failure) => {
                self.deliver(&failure);
                None
            }
        }
    }
}

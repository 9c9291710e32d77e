//! Scoped execution.
//!
//! A [`Scope`] runs a body with a [`Reporter`] and decides what happens to the
//! error the body returns. Every error leaving a scope is labeled with the
//! scope's label; an error that already carries a failure from an unrelated
//! scope is qualified with it instead, so decoupled scopes compose into one
//! dotted path:
//!
//! ```
//! use failures::{BoxError, Scope};
//!
//! fn parse(raw: &str) -> Result<u16, BoxError> {
//!     let scope = Scope::new("parse")?;
//!     Ok(scope.run(|_| raw.parse::<u16>())?)
//! }
//!
//! fn load(raw: &str) -> Result<u16, BoxError> {
//!     let scope = Scope::new("config")?.child("port")?;
//!     Ok(scope.run(|_| parse(raw))?)
//! }
//!
//! let error = load("http").unwrap_err();
//! let failure = error.downcast_ref::<failures::FailureError>().unwrap().failure();
//! assert_eq!(failure.source(), "config.port.parse");
//! ```

use alloc::string::String;
use core::{fmt, future::Future};

use crate::{
    BoxError, Details, FailureError, Handler, Reporter, Severity,
    label::{self, InvalidLabelError},
    markers::{Graded, Handled, Propagate, ScopeMode},
};

/// A reporter together with a rule for settling the errors of a body.
///
/// See [`markers`](crate::markers) for the available modes.
#[derive(Clone)]
pub struct Scope<M: ScopeMode = Propagate> {
    reporter: Reporter,
    mode: M,
}

impl Scope<Propagate> {
    /// Creates a root scope whose failures always propagate.
    pub fn new(label: &str) -> Result<Self, InvalidLabelError> {
        Self::with_details(label, Details::new())
    }

    /// Creates a root scope with details inherited by everything below it.
    pub fn with_details(label: &str, details: Details) -> Result<Self, InvalidLabelError> {
        let reporter = Reporter::builder(label)
            .severity(Severity::Required)
            .details(details)
            .build()?;
        Ok(Self {
            reporter,
            mode: Propagate,
        })
    }

    /// Handles the scope's failures instead of propagating them.
    pub fn with_handler(self, handler: impl Into<Handler>) -> Scope<Handled> {
        Scope {
            reporter: self.reporter,
            mode: Handled::new(handler.into()),
        }
    }
}

impl Scope<Graded> {
    /// Creates a scope over an existing reporter, honouring its severity.
    pub fn from_reporter(reporter: Reporter) -> Self {
        Self {
            reporter,
            mode: Graded,
        }
    }
}

impl<M: ScopeMode> Scope<M> {
    /// The scope's reporter.
    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// The scope's fully qualified label.
    pub fn label(&self) -> &str {
        self.reporter.label()
    }

    /// Derives a child scope of the same mode. Children of a handled scope
    /// use the same handler; run on their own, they dispatch the failures
    /// recorded below them like a root would.
    pub fn child(&self, name: &str) -> Result<Self, InvalidLabelError> {
        Ok(Self {
            reporter: self.reporter.child(name)?,
            mode: self.mode.clone(),
        })
    }

    /// Derives a child scope that handles its failures with `handler`.
    pub fn child_with_handler(
        &self,
        name: &str,
        handler: impl Into<Handler>,
    ) -> Result<Scope<Handled>, InvalidLabelError> {
        Ok(Scope {
            reporter: self.reporter.child(name)?,
            mode: Handled::new(handler.into()),
        })
    }

    /// Runs `body` and settles its error according to the scope's mode.
    pub fn run<T, E, F>(&self, body: F) -> M::Output<T>
    where
        F: FnOnce(&Reporter) -> Result<T, E>,
        E: Into<BoxError>,
    {
        let run = self.mode.enter(&self.reporter);
        let outcome = body(&self.reporter).map_err(Into::into);
        self.mode.finish(&self.reporter, run, outcome)
    }

    /// Async version of [`run`](Self::run). The body receives its own handle
    /// to the reporter so the future does not borrow the scope.
    pub async fn run_async<T, E, F, Fut>(&self, body: F) -> M::Output<T>
    where
        F: FnOnce(Reporter) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        let run = self.mode.enter(&self.reporter);
        let outcome = body(self.reporter.clone()).await.map_err(Into::into);
        self.mode.finish(&self.reporter, run, outcome)
    }
}

impl<M: ScopeMode + fmt::Debug> fmt::Debug for Scope<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("label", &self.reporter.label())
            .field("mode", &self.mode)
            .finish()
    }
}

/// A function bound to a label.
///
/// `Scoped` plays the part of a decorator: every call runs the function in a
/// fresh REQUIRED reporter named after it, either as a child of the caller's
/// reporter or as a new root. The reporter is handed to the function
/// explicitly.
///
/// # Examples
///
/// ```
/// use failures::{Reporter, Scoped};
///
/// let fetch = Scoped::new("fetch", |reporter: &Reporter, id: u32| {
///     if id == 0 {
///         return Err("no such user");
///     }
///     Ok(reporter.label().to_owned())
/// })
/// .unwrap();
///
/// let parent = Reporter::new("user").unwrap();
/// assert_eq!(fetch.call(Some(&parent), 1).unwrap(), "user.fetch");
///
/// let error = fetch.call(None, 0).unwrap_err();
/// assert_eq!(error.failure().source(), "fetch");
/// ```
#[derive(Clone)]
pub struct Scoped<F> {
    name: String,
    func: F,
}

impl<F> Scoped<F> {
    /// Binds `func` to `name`, validating the name once.
    pub fn new(name: &str, func: F) -> Result<Self, InvalidLabelError> {
        label::validate(name)?;
        Ok(Self {
            name: name.into(),
            func,
        })
    }

    /// The label segment added by each call.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn reporter(&self, parent: Option<&Reporter>) -> Reporter {
        Reporter::from_parts(
            self.name.clone(),
            parent,
            Some(Severity::Required),
            Details::new(),
        )
    }

    /// Calls the function under `parent` (or under a new root).
    pub fn call<A, T, E>(&self, parent: Option<&Reporter>, args: A) -> Result<T, FailureError>
    where
        F: Fn(&Reporter, A) -> Result<T, E>,
        E: Into<BoxError>,
    {
        let reporter = self.reporter(parent);
        (self.func)(&reporter, args).map_err(|error| reporter.raise(error.into()))
    }

    /// Async version of [`call`](Self::call).
    pub async fn call_async<A, T, E, Fut>(
        &self,
        parent: Option<&Reporter>,
        args: A,
    ) -> Result<T, FailureError>
    where
        F: Fn(Reporter, A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        let reporter = self.reporter(parent);
        (self.func)(reporter.clone(), args)
            .await
            .map_err(|error| reporter.raise(error.into()))
    }
}

impl<F> fmt::Debug for Scoped<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scoped")
            .field("name", &self.name)
            .field("func", &core::any::type_name::<F>())
            .finish()
    }
}

//! Captured failures and the error that carries them.

use alloc::{boxed::Box, string::String, sync::Arc as StdArc};
use core::{error::Error, fmt};

use triomphe::Arc;

use crate::{Details, FailureStore, label};

/// A type-erased error that can cross threads.
///
/// Everything that is `Into<BoxError>` can be reported: concrete error types,
/// `String` and `&str` messages, and other boxed errors.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

pub(crate) type SharedError = StdArc<dyn Error + Send + Sync + 'static>;

/// A labeled failure.
///
/// A failure pairs an error with the label of the operation it happened in
/// (its *source*) and the details that were in effect there. Failures are
/// immutable; cloning one is a reference count increment.
///
/// # Examples
///
/// ```
/// use failures::{Failure, details};
///
/// let failure = Failure::new(
///     "user.retrieve",
///     "connection refused",
///     details! { "user_id" => 7 },
/// );
/// assert_eq!(failure.source(), "user.retrieve");
/// assert_eq!(failure.to_string(), "user.retrieve: connection refused");
/// ```
#[derive(Clone)]
pub struct Failure(Arc<FailureData>);

struct FailureData {
    source: String,
    error: SharedError,
    details: Details,
}

impl Failure {
    /// Creates a failure from its parts.
    pub fn new(source: impl Into<String>, error: impl Into<BoxError>, details: Details) -> Self {
        Self::from_shared(source.into(), StdArc::from(error.into()), details)
    }

    pub(crate) fn from_shared(source: String, error: SharedError, details: Details) -> Self {
        Self(Arc::new(FailureData {
            source,
            error,
            details,
        }))
    }

    /// The fully qualified label of the operation that failed.
    pub fn source(&self) -> &str {
        &self.0.source
    }

    /// The original error.
    pub fn error(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.0.error
    }

    /// A shared handle to the original error.
    pub fn shared_error(&self) -> StdArc<dyn Error + Send + Sync + 'static> {
        self.0.error.clone()
    }

    /// The details captured with the failure.
    pub fn details(&self) -> &Details {
        &self.0.details
    }

    /// Returns `true` if the original error is an `E`.
    pub fn is<E: Error + 'static>(&self) -> bool {
        self.0.error.is::<E>()
    }

    /// Downcasts the original error.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.0.error.downcast_ref::<E>()
    }

    /// Iterates over the original error and its chain of sources.
    pub fn chain(&self) -> impl Iterator<Item = &(dyn Error + 'static)> {
        let first: &(dyn Error + 'static) = self.error();
        core::iter::successors(Some(first), |&error| error.source())
    }

    /// Returns `true` if both handles point to the same failure.
    pub fn ptr_eq(a: &Failure, b: &Failure) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// The same failure seen from an enclosing tree: the source is qualified
    /// with `prefix` and the details are layered over `base`.
    pub(crate) fn within(&self, prefix: &str, base: &Details) -> Failure {
        Self::from_shared(
            label::join(prefix, &self.0.source),
            self.0.error.clone(),
            base.merged(&self.0.details),
        )
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.0.source, self.0.error)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("source", &self.0.source)
            .field("error", &self.0.error)
            .field("details", &self.0.details)
            .finish()
    }
}

/// The error that propagates a [`Failure`] out of a reporter boundary.
///
/// It is returned by everything that raises: REQUIRED reports,
/// [`Reporter::required`](crate::Reporter::required), propagating scopes and
/// [`Scoped`](crate::Scoped) calls. Besides the failure it keeps a handle to
/// the store of the tree that raised it, which lets an enclosing tree adopt
/// the failures recorded on the way.
///
/// [`Error::source`] returns the original error.
pub struct FailureError {
    failure: Failure,
    store: FailureStore,
}

impl FailureError {
    pub(crate) fn new(failure: Failure, store: FailureStore) -> Self {
        Self { failure, store }
    }

    /// The failure being propagated.
    pub fn failure(&self) -> &Failure {
        &self.failure
    }

    /// The store of the tree that raised the failure.
    pub fn store(&self) -> &FailureStore {
        &self.store
    }

    /// Consumes the error, returning the failure.
    pub fn into_failure(self) -> Failure {
        self.failure
    }

    pub(crate) fn into_parts(self) -> (Failure, FailureStore) {
        (self.failure, self.store)
    }
}

impl fmt::Display for FailureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failure at `{}`: {}",
            self.failure.source(),
            self.failure.error()
        )
    }
}

impl fmt::Debug for FailureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureError")
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}

impl Error for FailureError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.failure.error())
    }
}

impl From<FailureError> for Failure {
    fn from(error: FailureError) -> Self {
        error.failure
    }
}

/// Errors that may be carrying a [`FailureError`].
///
/// [`Handler::guard`](crate::Handler::guard) uses this to tell failures it
/// should handle apart from errors it should pass through. Implement it for
/// your own error enums if they wrap a `FailureError`.
///
/// # Examples
///
/// ```
/// use failures::{FailureError, TryIntoFailure};
///
/// #[derive(Debug)]
/// enum AppError {
///     Failed(FailureError),
///     Config(String),
/// }
///
/// impl TryIntoFailure for AppError {
///     fn try_into_failure(self) -> Result<FailureError, Self> {
///         match self {
///             AppError::Failed(error) => Ok(error),
///             other => Err(other),
///         }
///     }
/// }
/// ```
pub trait TryIntoFailure: Sized {
    /// Extracts the carried `FailureError`, or gives the error back.
    fn try_into_failure(self) -> Result<FailureError, Self>;
}

impl TryIntoFailure for FailureError {
    fn try_into_failure(self) -> Result<FailureError, Self> {
        Ok(self)
    }
}

impl TryIntoFailure for BoxError {
    fn try_into_failure(self) -> Result<FailureError, Self> {
        self.downcast::<FailureError>().map(|error| *error)
    }
}

impl TryIntoFailure for Box<dyn Error + Send + 'static> {
    fn try_into_failure(self) -> Result<FailureError, Self> {
        self.downcast::<FailureError>().map(|error| *error)
    }
}

impl TryIntoFailure for Box<dyn Error + 'static> {
    fn try_into_failure(self) -> Result<FailureError, Self> {
        self.downcast::<FailureError>().map(|error| *error)
    }
}

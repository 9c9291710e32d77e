use crate::{BoxError, Details, FailureError, Reporter};

mod sealed {
    pub trait Sealed {}

    impl<T, E> Sealed for Result<T, E> {}
}

/// Routes the error of a `Result` through a [`Reporter`].
///
/// These are the method-chaining forms of [`Reporter::required`] and
/// [`Reporter::safe`].
///
/// # Examples
///
/// ```
/// use failures::{FailureError, Reporter, ResultExt};
///
/// fn read_port(reporter: &Reporter, raw: &str) -> Result<Option<u16>, FailureError> {
///     raw.parse::<u16>().or_record(reporter)
/// }
///
/// let reporter = Reporter::new("config").unwrap();
/// assert_eq!(read_port(&reporter, "8080").unwrap(), Some(8080));
/// assert_eq!(read_port(&reporter, "http").unwrap(), None);
/// assert_eq!(reporter.failures().len(), 1);
///
/// let error = "x".parse::<u16>().or_raise(&reporter).unwrap_err();
/// assert_eq!(error.failure().source(), "config");
/// ```
pub trait ResultExt<T, E>: sealed::Sealed {
    /// Propagates the error as a failure of `reporter`, whatever its
    /// severity.
    fn or_raise(self, reporter: &Reporter) -> Result<T, FailureError>;

    /// Reports the error with `reporter`'s severity.
    fn or_record(self, reporter: &Reporter) -> Result<Option<T>, FailureError>;

    /// Like [`or_record`](Self::or_record), with call-site details.
    fn or_record_with(
        self,
        reporter: &Reporter,
        details: Details,
    ) -> Result<Option<T>, FailureError>;
}

impl<T, E> ResultExt<T, E> for Result<T, E>
where
    E: Into<BoxError>,
{
    #[inline]
    fn or_raise(self, reporter: &Reporter) -> Result<T, FailureError> {
        reporter.required(|| self)
    }

    #[inline]
    fn or_record(self, reporter: &Reporter) -> Result<Option<T>, FailureError> {
        reporter.safe(|| self)
    }

    fn or_record_with(
        self,
        reporter: &Reporter,
        details: Details,
    ) -> Result<Option<T>, FailureError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(error) => reporter.report_with(error, details).map(|()| None),
        }
    }
}

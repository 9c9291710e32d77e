/// Builds [`Details`](crate::Details) from `key => value` pairs.
///
/// Keys can be anything that converts into a `String`, values anything that
/// converts into a [`serde_json::Value`]. Later pairs override earlier ones
/// with the same key.
///
/// # Examples
///
/// ```
/// use failures::details;
///
/// let empty = details! {};
/// assert!(empty.is_empty());
///
/// let details = details! {
///     "user_id" => 42,
///     "path" => "/tmp/input.csv",
///     "retry" => true,
/// };
/// assert_eq!(details.len(), 3);
/// ```
#[macro_export]
macro_rules! details {
    () => {
        $crate::Details::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        {
            let mut details = $crate::Details::new();
            $(
                details.insert($key, $value);
            )+
            details
        }
    };
}

/// Reports an error on a reporter and returns early if it must propagate.
///
/// `report!(reporter, error)` is shorthand for
/// `reporter.report(error)?`, and `report!(reporter, error, { "k" => v })`
/// additionally attaches call-site details.
///
/// # Examples
///
/// ```
/// use failures::{FailureError, Reporter, report};
///
/// fn check(reporter: &Reporter, value: i64) -> Result<(), FailureError> {
///     if value < 0 {
///         report!(reporter, format!("negative value {value}"), { "value" => value });
///     }
///     Ok(())
/// }
///
/// let reporter = Reporter::new("check").unwrap();
/// check(&reporter, -1).unwrap();
/// assert_eq!(reporter.failures().len(), 1);
/// ```
#[macro_export]
macro_rules! report {
    ($reporter:expr, $error:expr $(,)?) => {
        $reporter.report($error)?
    };
    ($reporter:expr, $error:expr, { $($details:tt)* } $(,)?) => {
        $reporter.report_with($error, $crate::details! { $($details)* })?
    };
}

//! Filters that select which failures a handler entry receives.
//!
//! A [`Filter`] is a small expression tree. Leaves match on the failure's
//! label ([`Filter::label`]), on its error type ([`Filter::error`],
//! [`Filter::caused_by`]) or on an arbitrary predicate; inner nodes combine
//! them with [`Filter::any`], [`Filter::all`] and [`Filter::not`], which are
//! also available as the `|`, `&` and `!` operators.
//!
//! Label patterns use `*` as a wildcard that matches any run of characters,
//! including dots and the empty string. Patterns are matched against the whole
//! label:
//!
//! | pattern      | matches                         | does not match    |
//! |--------------|---------------------------------|-------------------|
//! | `*`          | everything                      |                   |
//! | `user.get`   | `user.get`                      | `user.get.email`  |
//! | `user.*`     | `user.get`, `user.get.email`    | `user`            |
//! | `*.email`    | `user.get.email`                | `user.email.send` |
//!
//! # Examples
//!
//! ```
//! use failures::{Failure, Details, Filter};
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("timed out")]
//! struct Timeout;
//!
//! let filter = Filter::label("db.*") & !Filter::error::<Timeout>();
//!
//! assert!(filter.matches(&Failure::new("db.query", "syntax error", Details::new())));
//! assert!(!filter.matches(&Failure::new("db.query", Timeout, Details::new())));
//! assert!(!filter.matches(&Failure::new("http.get", "refused", Details::new())));
//! ```

use alloc::{
    format,
    string::{String, ToString},
    sync::Arc,
    vec,
    vec::Vec,
};
use core::{error::Error, fmt, ops};

use regex::Regex;

use crate::Failure;

/// Error returned when a filter can never be satisfied in a useful way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidFilterError {
    /// An `any`, `all` or `not` without operands.
    #[error("cannot use an empty `{0}` combination as a failure filter")]
    Empty(&'static str),
    /// A negation of a filter that matches everything.
    #[error("cannot filter out all failures")]
    ExcludesEverything,
}

/// A predicate over [`Failure`]s.
#[derive(Clone, Debug)]
pub enum Filter {
    /// Matches the failure's source against a pattern.
    Label(LabelPattern),
    /// Matches the failure's error type.
    Error(ErrorPattern),
    /// Matches if any operand matches.
    Any(Vec<Filter>),
    /// Matches if every operand matches.
    All(Vec<Filter>),
    /// Matches if no operand matches.
    Not(Vec<Filter>),
    /// Matches if the function returns `true`.
    Predicate(Predicate),
}

impl Filter {
    /// Matches labels against a `*` pattern.
    pub fn label(pattern: impl Into<String>) -> Self {
        Filter::Label(LabelPattern::new(pattern))
    }

    /// Matches failures whose error is an `E`.
    pub fn error<E: Error + 'static>() -> Self {
        Filter::Error(ErrorPattern::of::<E>())
    }

    /// Matches failures whose error, or any error in its source chain, is an
    /// `E`.
    pub fn caused_by<E: Error + 'static>() -> Self {
        Filter::Error(ErrorPattern::in_chain::<E>())
    }

    /// Matches everything.
    pub fn everything() -> Self {
        Filter::label("*")
    }

    /// Matches if any of `filters` matches.
    pub fn any(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Any(filters.into_iter().collect())
    }

    /// Matches if all of `filters` match.
    pub fn all(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::All(filters.into_iter().collect())
    }

    /// Matches if none of `filters` matches.
    pub fn not(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Not(filters.into_iter().collect())
    }

    /// Matches with a custom function.
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Failure) -> bool + Send + Sync + 'static,
    {
        Filter::Predicate(Predicate(Arc::new(predicate)))
    }

    /// Tests a failure.
    pub fn matches(&self, failure: &Failure) -> bool {
        match self {
            Filter::Label(pattern) => pattern.matches(failure.source()),
            Filter::Error(pattern) => pattern.matches(failure.error()),
            Filter::Any(filters) => filters.iter().any(|filter| filter.matches(failure)),
            Filter::All(filters) => filters.iter().all(|filter| filter.matches(failure)),
            Filter::Not(filters) => !filters.iter().any(|filter| filter.matches(failure)),
            Filter::Predicate(predicate) => (predicate.0)(failure),
        }
    }

    /// Returns `true` if the filter is known to match every failure.
    pub fn matches_everything(&self) -> bool {
        match self {
            Filter::Label(pattern) => pattern.matches_everything(),
            Filter::Any(filters) => filters.iter().any(Filter::matches_everything),
            Filter::All(filters) => {
                !filters.is_empty() && filters.iter().all(Filter::matches_everything)
            }
            Filter::Error(_) | Filter::Not(_) | Filter::Predicate(_) => false,
        }
    }

    /// Rejects empty combinations and negations of everything.
    pub fn check(&self) -> Result<(), InvalidFilterError> {
        match self {
            Filter::Any(filters) if filters.is_empty() => Err(InvalidFilterError::Empty("any")),
            Filter::All(filters) if filters.is_empty() => Err(InvalidFilterError::Empty("all")),
            Filter::Not(filters) if filters.is_empty() => Err(InvalidFilterError::Empty("not")),
            Filter::Not(filters) if filters.iter().any(Filter::matches_everything) => {
                Err(InvalidFilterError::ExcludesEverything)
            }
            Filter::Any(filters) | Filter::All(filters) | Filter::Not(filters) => {
                filters.iter().try_for_each(Filter::check)
            }
            Filter::Label(_) | Filter::Error(_) | Filter::Predicate(_) => Ok(()),
        }
    }
}

impl From<&str> for Filter {
    fn from(pattern: &str) -> Self {
        Filter::label(pattern)
    }
}

impl From<String> for Filter {
    fn from(pattern: String) -> Self {
        Filter::label(pattern)
    }
}

impl ops::Not for Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        Filter::Not(vec![self])
    }
}

impl ops::BitOr for Filter {
    type Output = Filter;

    fn bitor(self, rhs: Filter) -> Filter {
        match self {
            Filter::Any(mut filters) => {
                filters.push(rhs);
                Filter::Any(filters)
            }
            lhs => Filter::Any(vec![lhs, rhs]),
        }
    }
}

impl ops::BitAnd for Filter {
    type Output = Filter;

    fn bitand(self, rhs: Filter) -> Filter {
        match self {
            Filter::All(mut filters) => {
                filters.push(rhs);
                Filter::All(filters)
            }
            lhs => Filter::All(vec![lhs, rhs]),
        }
    }
}

/// A compiled label pattern.
#[derive(Clone, Debug)]
pub struct LabelPattern {
    pattern: String,
    matcher: Matcher,
}

#[derive(Clone, Debug)]
enum Matcher {
    Everything,
    Exact,
    Glob(Regex),
}

impl LabelPattern {
    /// Compiles a pattern.
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let matcher = if !pattern.is_empty() && pattern.chars().all(|ch| ch == '*') {
            Matcher::Everything
        } else if !pattern.contains('*') {
            Matcher::Exact
        } else {
            Matcher::Glob(compile_glob(&pattern))
        };
        Self { pattern, matcher }
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Tests a label.
    pub fn matches(&self, label: &str) -> bool {
        match &self.matcher {
            Matcher::Everything => true,
            Matcher::Exact => self.pattern == label,
            Matcher::Glob(regex) => regex.is_match(label),
        }
    }

    /// Returns `true` for patterns made only of `*`.
    pub fn matches_everything(&self) -> bool {
        matches!(self.matcher, Matcher::Everything)
    }
}

fn compile_glob(pattern: &str) -> Regex {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^(?s:{body})$")).expect("escaped literals joined by `.*` form a valid regex")
}

/// Matches the type of a failure's error.
#[derive(Clone, Copy)]
pub struct ErrorPattern {
    type_name: &'static str,
    test: fn(&(dyn Error + 'static)) -> bool,
    chain: bool,
}

impl ErrorPattern {
    /// Matches errors of type `E`.
    pub fn of<E: Error + 'static>() -> Self {
        Self {
            type_name: core::any::type_name::<E>(),
            test: is_instance::<E>,
            chain: false,
        }
    }

    /// Matches errors of type `E` anywhere in the source chain.
    pub fn in_chain<E: Error + 'static>() -> Self {
        Self {
            chain: true,
            ..Self::of::<E>()
        }
    }

    /// Name of the matched type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Tests an error.
    pub fn matches(&self, error: &(dyn Error + 'static)) -> bool {
        if self.chain {
            core::iter::successors(Some(error), |&error| error.source()).any(self.test)
        } else {
            (self.test)(error)
        }
    }
}

fn is_instance<E: Error + 'static>(error: &(dyn Error + 'static)) -> bool {
    error.is::<E>()
}

impl fmt::Debug for ErrorPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.chain {
            write!(f, "caused_by::<{}>", self.type_name)
        } else {
            write!(f, "{}", self.type_name)
        }
    }
}

/// A custom filter function, see [`Filter::predicate`].
#[derive(Clone)]
pub struct Predicate(Arc<dyn Fn(&Failure) -> bool + Send + Sync>);

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, filters) = match self {
            Filter::Label(pattern) => return write!(f, "{:?}", pattern.as_str()),
            Filter::Error(pattern) => return write!(f, "{pattern:?}"),
            Filter::Predicate(_) => return f.write_str("<predicate>"),
            Filter::Any(filters) => ("any", filters),
            Filter::All(filters) => ("all", filters),
            Filter::Not(filters) => ("not", filters),
        };
        let operands: Vec<String> = filters.iter().map(ToString::to_string).collect();
        write!(f, "{name}({})", operands.join(", "))
    }
}

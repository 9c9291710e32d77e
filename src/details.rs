//! Structured context attached to failures.

use alloc::string::String;
use core::fmt;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use serde_json::Value;

/// An insertion-ordered map of string keys to JSON values.
///
/// Reporters carry details that are inherited by their children, and every
/// captured [`Failure`](crate::Failure) carries the details that were in effect
/// where it was captured. When two layers define the same key, the more
/// specific one wins: child over parent, call site over reporter.
///
/// Use the [`details!`](crate::details!) macro to build one inline.
///
/// # Examples
///
/// ```
/// use failures::{Details, details};
/// use serde_json::json;
///
/// let base = details! { "user" => "bob", "attempt" => 1 };
/// let over = details! { "attempt" => 2 };
///
/// let merged = base.merged(&over);
/// assert_eq!(merged.get("attempt"), Some(&json!(2)));
/// assert_eq!(merged.keys().collect::<Vec<_>>(), ["user", "attempt"]);
/// ```
#[derive(Clone, Default, PartialEq)]
pub struct Details(IndexMap<String, Value, FxBuildHasher>);

impl Details {
    /// Creates an empty set of details.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the one it replaced.
    ///
    /// A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Looks up a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns `true` if the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Copies every entry of `over` into `self`, overriding existing keys.
    pub fn extend_from(&mut self, over: &Details) {
        self.0
            .extend(over.0.iter().map(|(key, value)| (key.clone(), value.clone())));
    }

    /// Returns a copy of `self` overridden by `over`.
    #[must_use]
    pub fn merged(&self, over: &Details) -> Details {
        if over.is_empty() {
            return self.clone();
        }
        let mut merged = self.clone();
        merged.extend_from(over);
        merged
    }
}

impl fmt::Debug for Details {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl fmt::Display for Details {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (index, (key, value)) in self.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str("}")
    }
}

impl<K, V> FromIterator<(K, V)> for Details
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<K, V> Extend<(K, V)> for Details
where
    K: Into<String>,
    V: Into<Value>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.0.extend(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
    }
}

impl<'a> IntoIterator for &'a Details {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_insert_keeps_position() {
        let mut details = Details::new();
        details.insert("a", 1);
        details.insert("b", 2);
        assert_eq!(details.insert("a", 3), Some(json!(1)));

        assert_eq!(details.keys().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(details.get("a"), Some(&json!(3)));
    }

    #[test]
    fn test_merged() {
        let base: Details = [("scope", "outer"), ("user", "bob")].into_iter().collect();
        let over = Details::new().with("user", "alice").with("input", 27);

        let merged = base.merged(&over);
        assert_eq!(merged.keys().collect::<Vec<_>>(), ["scope", "user", "input"]);
        assert_eq!(merged.get("user"), Some(&json!("alice")));
        assert_eq!(merged.get("input"), Some(&json!(27)));

        // Neither side is touched
        assert_eq!(base.get("user"), Some(&json!("bob")));
        assert_eq!(over.len(), 2);
    }

    #[test]
    fn test_display() {
        let details = Details::new().with("id", 5).with("name", "x");
        assert_eq!(details.to_string(), r#"{id=5, name="x"}"#);
        assert_eq!(Details::new().to_string(), "{}");
    }
}

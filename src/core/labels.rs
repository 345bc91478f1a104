//! Stream label sets
//!
//! A [`LabelSet`] is the sorted, deduplicated key/value projection that
//! identifies a Loki stream. Two records land in the same stream exactly
//! when their label sets compare equal.

use serde::Serialize;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

/// Sorted-by-key label map used as the stream grouping key
///
/// Keys are sanitized on insertion so every label set can be pushed as-is:
/// characters outside `[a-zA-Z0-9_]` become `_`, a leading digit gets a `_`
/// prefix, and empty keys are ignored.
///
/// # Example
///
/// ```
/// use loki_logger_system::LabelSet;
///
/// let base: LabelSet = [("job", "api"), ("env", "prod")].into_iter().collect();
/// let merged = base.merged([("env", "staging"), ("http.route", "/users")]);
///
/// assert_eq!(merged.get("env"), Some("staging"));
/// assert_eq!(merged.get("http_route"), Some("/users"));
/// assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["env", "http_route", "job"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert or override a label
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        if let Some(key) = sanitize_label_name(key.as_ref()) {
            self.0.insert(key, value.into());
        }
    }

    /// Return a copy with `overrides` added on top; existing keys are replaced, never removed
    #[must_use]
    pub fn merged<I, K, V>(&self, overrides: I) -> LabelSet
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut merged = self.clone();
        merged.extend(overrides);
        merged
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }
}

impl<K: AsRef<str>, V: Into<String>> Extend<(K, V)> for LabelSet {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut labels = LabelSet::new();
        labels.extend(iter);
        labels
    }
}

impl<'a> IntoIterator for &'a LabelSet {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for LabelSet {
    /// LogQL selector notation: `{env="prod", job="api"}`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (key, value)) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={:?}", key, value)?;
        }
        write!(f, "}}")
    }
}

/// Force a label name into Loki's `[a-zA-Z_][a-zA-Z0-9_]*` alphabet
///
/// Returns `None` for an empty name.
pub fn sanitize_label_name(name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }

    let mut sanitized = String::with_capacity(name.len() + 1);
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.push('_');
    }
    sanitized.extend(name.chars().map(|c| {
        if c.is_ascii_alphanumeric() || c == '_' {
            c
        } else {
            '_'
        }
    }));
    Some(sanitized)
}

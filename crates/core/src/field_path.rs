//! Field paths: explicit replacement for `KeyPath`-based field identification.
//!
//! spec.md §9 Design Notes calls out the source's `KeyPath`-based field
//! identification as needing a registration-time mapping from path to field
//! name. `FieldPath` is that mapping's key: a small, order-preserving,
//! dotted path used both to declare an index's root expression (spec.md §3
//! "Index descriptor") and to name the predicate a SHACL property shape
//! walks.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A dotted path into a record, e.g. `FieldPath::new(["address", "city"])`.
///
/// Equivalent in role to a `KeyPath<Record, Value>` in the source system,
/// but resolved through an explicit registration-time `path -> field name`
/// table (owned by the schema layer, external to this core) rather than
/// compile-time reflection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Build a path from its dotted segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldPath(segments.into_iter().map(Into::into).collect())
    }

    /// Build a single-segment path.
    pub fn single(segment: impl Into<String>) -> Self {
        FieldPath(vec![segment.into()])
    }

    /// Parse a dotted string path (`"address.city"`) into segments.
    ///
    /// # Errors
    /// Returns [`FieldPathError::Empty`] for an empty string or a string
    /// containing an empty segment (`"a..b"`, `".a"`, `"a."`).
    pub fn parse(path: &str) -> Result<Self, FieldPathError> {
        if path.is_empty() {
            return Err(FieldPathError::Empty);
        }
        let segments: Vec<String> = path.split('.').map(String::from).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(FieldPathError::EmptySegment(path.to_string()));
        }
        Ok(FieldPath(segments))
    }

    /// The path's segments, in order.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// True if `self` is a prefix of (or equal to) `other`.
    pub fn is_prefix_of(&self, other: &FieldPath) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// Errors constructing a [`FieldPath`] from a dotted string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldPathError {
    /// The input string was empty.
    #[error("field path cannot be empty")]
    Empty,
    /// The input string contained an empty segment (e.g. `"a..b"`).
    #[error("field path '{0}' contains an empty segment")]
    EmptySegment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_path() {
        let p = FieldPath::parse("address.city").unwrap();
        assert_eq!(p.segments(), &["address", "city"]);
        assert_eq!(p.to_string(), "address.city");
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(FieldPath::parse(""), Err(FieldPathError::Empty));
    }

    #[test]
    fn rejects_empty_segment() {
        assert!(matches!(
            FieldPath::parse("a..b"),
            Err(FieldPathError::EmptySegment(_))
        ));
    }

    #[test]
    fn prefix_check() {
        let a = FieldPath::parse("a").unwrap();
        let ab = FieldPath::parse("a.b").unwrap();
        assert!(a.is_prefix_of(&ab));
        assert!(!ab.is_prefix_of(&a));
    }
}

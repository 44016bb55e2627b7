//! Tagged value union for indexed fields.
//!
//! Replaces the source's dynamic, numeric-type-polymorphic field access
//! (spec.md §9 Design Notes: "Value polymorphism across numeric types")
//! with a single closed union and an explicit [`FieldValue::compare`] that
//! returns [`CompareResult::Incomparable`] for mismatched types instead of
//! falling back to a stringify-then-lex-compare hack. Every call site in
//! `fusion-graph` and `fusion-shacl` handles `Incomparable` explicitly.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of comparing two [`FieldValue`]s.
///
/// Deliberately not a plain `Ordering`: `Incomparable` is a first-class
/// outcome (mixed types, `NaN`), not an error, and every comparison site is
/// required to decide what it means for its own semantics (FILTER excludes
/// the row; MINUS treats it as "does not match"; etc).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    /// The two values are equal.
    Equal,
    /// The left value orders before the right value.
    Less,
    /// The left value orders after the right value.
    Greater,
    /// The two values have no meaningful order (mixed types, NaN operand).
    Incomparable,
}

impl CompareResult {
    /// True when the values are equal under `compare`.
    pub fn is_equal(self) -> bool {
        matches!(self, CompareResult::Equal)
    }
}

/// A single field's value, tagged by type.
///
/// Mirrors the record layer's dynamic member access (spec.md §9): instead of
/// reflecting into an arbitrary Swift property, the schema layer (external
/// to this core) projects a record's field into one of these variants via a
/// registered accessor, and everything downstream — index maintainers, the
/// pattern evaluator, the SHACL validator — operates on `FieldValue` alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldValue {
    /// Absence of a value (not the same as a field that doesn't exist).
    Null,
    /// A signed 64-bit integer.
    Int64(i64),
    /// A 64-bit IEEE-754 float.
    Double(f64),
    /// A boolean.
    Bool(bool),
    /// A UTF-8 string.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// A UUID.
    Uuid(Uuid),
    /// A UTC timestamp, seconds since the epoch.
    Date(i64),
    /// An ordered list of values (used for multi-valued indexed fields).
    Array(Vec<FieldValue>),
}

/// Stable per-type tag byte, used both for the tuple codec's type prefix
/// (cross-type comparison by tag, per spec.md §3 Subspace invariant) and as
/// the fallback discriminator for `compare` on mixed types.
fn type_tag(v: &FieldValue) -> u8 {
    match v {
        FieldValue::Null => 0,
        FieldValue::Int64(_) => 1,
        FieldValue::Double(_) => 2,
        FieldValue::Bool(_) => 3,
        FieldValue::String(_) => 4,
        FieldValue::Bytes(_) => 5,
        FieldValue::Uuid(_) => 6,
        FieldValue::Date(_) => 7,
        FieldValue::Array(_) => 8,
    }
}

impl FieldValue {
    /// Compare two values, returning [`CompareResult::Incomparable`] for any
    /// pairing that isn't the same variant (spec.md §4.5 "Cross-type value
    /// compare"). `Int64`/`Double` are intentionally NOT cross-compared:
    /// the schema layer is responsible for projecting a field consistently.
    pub fn compare(&self, other: &FieldValue) -> CompareResult {
        use FieldValue::*;
        match (self, other) {
            (Null, Null) => CompareResult::Equal,
            (Int64(a), Int64(b)) => from_ordering(a.cmp(b)),
            (Double(a), Double(b)) => match a.partial_cmp(b) {
                Some(ord) => from_ordering(ord),
                None => CompareResult::Incomparable,
            },
            (Bool(a), Bool(b)) => from_ordering(a.cmp(b)),
            (String(a), String(b)) => from_ordering(a.cmp(b)),
            (Bytes(a), Bytes(b)) => from_ordering(a.cmp(b)),
            (Uuid(a), Uuid(b)) => from_ordering(a.cmp(b)),
            (Date(a), Date(b)) => from_ordering(a.cmp(b)),
            (Array(a), Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y) {
                        CompareResult::Equal => continue,
                        other => return other,
                    }
                }
                from_ordering(a.len().cmp(&b.len()))
            }
            _ => CompareResult::Incomparable,
        }
    }

    /// Convenience boolean equality built on [`compare`](Self::compare).
    pub fn equals(&self, other: &FieldValue) -> bool {
        self.compare(other).is_equal()
    }

    /// True if this value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

fn from_ordering(ord: Ordering) -> CompareResult {
    match ord {
        Ordering::Equal => CompareResult::Equal,
        Ordering::Less => CompareResult::Less,
        Ordering::Greater => CompareResult::Greater,
    }
}

/// `PartialEq` delegates to `compare`, so it agrees with [`Hash`] below for
/// cross-type bucketing (`COUNT DISTINCT`-style aggregation in the pattern
/// evaluator, spec.md §4.5).
impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}
impl Eq for FieldValue {}

/// Hash is derived from the type tag plus a canonical per-variant encoding.
/// `Double` hashes its bit pattern after canonicalizing `-0.0` to `0.0` so
/// that `Eq`/`Hash` stay consistent for the one case IEEE-754 equality and
/// bit-identity disagree on.
impl Hash for FieldValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        type_tag(self).hash(state);
        match self {
            FieldValue::Null => {}
            FieldValue::Int64(v) => v.hash(state),
            FieldValue::Double(v) => {
                let canon = if *v == 0.0 { 0.0 } else { *v };
                canon.to_bits().hash(state);
            }
            FieldValue::Bool(v) => v.hash(state),
            FieldValue::String(v) => v.hash(state),
            FieldValue::Bytes(v) => v.hash(state),
            FieldValue::Uuid(v) => v.hash(state),
            FieldValue::Date(v) => v.hash(state),
            FieldValue::Array(v) => v.hash(state),
        }
    }
}

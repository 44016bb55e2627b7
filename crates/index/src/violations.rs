//! Uniqueness-violation tracking for unique indexes (spec.md §4.2, §7).
//!
//! A back-fill over a unique index that finds more than one primary key
//! sharing an index value doesn't fail outright: it records every
//! conflicting group and leaves the index `write-only` so the caller can
//! surface the conflicts and decide how to resolve them (dedupe the data,
//! relax uniqueness, ...) without losing the back-fill work already done.

use std::collections::HashMap;

use fusion_core::{FieldValue, PrimaryKey};
use fusion_kv::{KvTransaction, Subspace};
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};

/// All primary keys found sharing a single unique index value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniquenessViolation {
    /// The shared index value.
    pub value_key: Vec<FieldValue>,
    /// Every primary key observed under `value_key`, in discovery order.
    pub primary_keys: Vec<PrimaryKey>,
}

/// Accumulates uniqueness violations across a back-fill run.
///
/// Keys by a string rendering of `value_key` rather than `Vec<FieldValue>`
/// directly since `FieldValue` has no total order and its `Eq`/`Hash`
/// already special-case NaN; a string key sidesteps re-deriving that here.
#[derive(Debug, Default)]
pub struct UniquenessViolationTracker {
    seen: HashMap<String, (Vec<FieldValue>, Vec<PrimaryKey>)>,
}

impl UniquenessViolationTracker {
    /// A tracker with no observations yet.
    pub fn new() -> Self {
        UniquenessViolationTracker { seen: HashMap::new() }
    }

    /// Record that `primary_key` was observed under `value_key`.
    pub fn observe(&mut self, value_key: Vec<FieldValue>, primary_key: PrimaryKey) {
        let key = render(&value_key);
        let entry = self.seen.entry(key).or_insert_with(|| (value_key, Vec::new()));
        entry.1.push(primary_key);
    }

    /// Every value that ended up with more than one distinct primary key.
    pub fn violations(&self) -> Vec<UniquenessViolation> {
        self.seen
            .values()
            .filter(|(_, pks)| pks.len() > 1)
            .map(|(value_key, pks)| UniquenessViolation {
                value_key: value_key.clone(),
                primary_keys: pks.clone(),
            })
            .collect()
    }

    /// True if any value has more than one primary key.
    pub fn has_violations(&self) -> bool {
        self.seen.values().any(|(_, pks)| pks.len() > 1)
    }

    /// Number of distinct values with conflicts, and the total count of
    /// conflicting primary keys across all of them — the numbers
    /// `IndexError::UniquenessViolationsDetected` reports.
    pub fn summary(&self) -> (usize, usize) {
        let conflicts: Vec<_> = self.seen.values().filter(|(_, pks)| pks.len() > 1).collect();
        let total = conflicts.iter().map(|(_, pks)| pks.len()).sum();
        (conflicts.len(), total)
    }
}

fn render(value_key: &[FieldValue]) -> String {
    value_key
        .iter()
        .map(render_one)
        .collect::<Vec<_>>()
        .join("\u{1}")
}

fn render_one(v: &FieldValue) -> String {
    match v {
        FieldValue::Null => "null".to_string(),
        FieldValue::Int64(i) => format!("i{i}"),
        FieldValue::Double(d) => format!("d{}", d.to_bits()),
        FieldValue::Bool(b) => format!("b{b}"),
        FieldValue::String(s) => format!("s{s}"),
        FieldValue::Bytes(b) => format!("x{b:02x?}"),
        FieldValue::Uuid(u) => format!("u{u}"),
        FieldValue::Date(d) => format!("t{d}"),
        FieldValue::Array(items) => format!("a[{}]", render(items)),
    }
}

const VIOLATIONS_SEGMENT: &str = "_violations";

/// On-disk record for one colliding index value (spec.md §6:
/// `<meta>/M/_violations/<indexName>/<valueKey>`, kept here under the
/// index's own subspace alongside `_progress`/`_build` rather than a
/// separate global `<meta>` root, so an index's entries, progress, and
/// violations are all cleared together when its subspace is).
#[derive(Debug, Serialize, Deserialize)]
struct PersistedViolation {
    primary_keys: Vec<PrimaryKey>,
}

fn violation_key(index_subspace: &Subspace, value_key: &[FieldValue]) -> Vec<u8> {
    index_subspace
        .child(FieldValue::String(VIOLATIONS_SEGMENT.into()))
        .child_tuple(value_key)
        .bytes()
        .to_vec()
}

/// Record that `primary_key` shares `value_key` with whatever primary keys
/// are already on file for it under `index_subspace`, so the conflict
/// survives past the transaction (or back-fill run) that found it, per
/// spec.md §3's "retained until resolved". A no-op (merge) if `primary_key`
/// is already recorded.
pub fn record_observation<Tx: KvTransaction>(
    txn: &mut Tx,
    index_subspace: &Subspace,
    value_key: &[FieldValue],
    primary_key: &PrimaryKey,
) -> IndexResult<()> {
    let key = violation_key(index_subspace, value_key);
    let mut record = match txn.get(&key, false)? {
        Some(bytes) => serde_json::from_slice::<PersistedViolation>(&bytes)
            .map_err(|e| IndexError::CorruptProgress("<violations>".into(), e.to_string()))?,
        None => PersistedViolation { primary_keys: Vec::new() },
    };
    if !record.primary_keys.contains(primary_key) {
        record.primary_keys.push(primary_key.clone());
    }
    let bytes = serde_json::to_vec(&record).map_err(|e| IndexError::CorruptProgress("<violations>".into(), e.to_string()))?;
    txn.set(&key, &bytes);
    Ok(())
}

/// Every primary key currently on file for `value_key` under
/// `index_subspace`, without recording a new observation.
pub fn read_observations<Tx: KvTransaction>(txn: &mut Tx, index_subspace: &Subspace, value_key: &[FieldValue]) -> IndexResult<Vec<PrimaryKey>> {
    let key = violation_key(index_subspace, value_key);
    match txn.get(&key, false)? {
        Some(bytes) => serde_json::from_slice::<PersistedViolation>(&bytes)
            .map(|r| r.primary_keys)
            .map_err(|e| IndexError::CorruptProgress("<violations>".into(), e.to_string())),
        None => Ok(Vec::new()),
    }
}

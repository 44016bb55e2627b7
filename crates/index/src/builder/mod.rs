//! The online, resumable, adaptively-throttled index builder (spec.md §4.1,
//! §4.2).
//!
//! [`OnlineIndexBuilder::build`] implements the serial back-fill: scan the
//! primary range in throttled batches, index each item through an
//! [`IndexMaintainer`], and commit progress in the same transaction as the
//! index writes so a crash between transactions never desynchronizes the
//! two. [`parallel`] implements the chunked variant that fans batches out
//! across a worker pool.

pub mod parallel;

use std::marker::PhantomData;

use fusion_core::PrimaryKey;
use fusion_kv::{KvStore, KvTransaction, Subspace};
use fusion_throttle::{AdaptiveThrottler, ThrottleConfig};

use crate::descriptor::IndexDescriptor;
use crate::error::IndexResult;
use crate::maintainer::IndexMaintainer;
use crate::progress::RangeSet;
use crate::violations::{UniquenessViolation, UniquenessViolationTracker};

/// Tunables for one `build` call.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// If set, wipe any existing entries under the index subspace before
    /// starting (used when re-building after a schema change).
    pub clear_first: bool,
    /// Adaptive-throttling configuration for this run.
    pub throttle: ThrottleConfig,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            clear_first: false,
            throttle: ThrottleConfig::default(),
        }
    }
}

/// Result of a completed (or fully-resumed) back-fill.
#[derive(Debug, Clone, Default)]
pub struct BuildOutcome {
    /// Total number of primary-range rows indexed across every batch.
    pub items_indexed: usize,
    /// Uniqueness violations observed, if the index is unique. Non-empty
    /// here means the caller should keep the index `write-only` rather
    /// than advance it to `readable` (spec.md §4.2, §7).
    pub violations: Vec<UniquenessViolation>,
}

impl BuildOutcome {
    /// True if the back-fill can safely be followed by
    /// `IndexStateMachine::mark_readable`.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

const PROGRESS_SEGMENT: &str = "_progress";

fn progress_key(subspace: &Subspace) -> Vec<u8> {
    subspace
        .child(fusion_core::FieldValue::String(PROGRESS_SEGMENT.into()))
        .bytes()
        .to_vec()
}

/// Immediate successor of `key` in byte-lexicographic order: the smallest
/// byte string that has `key` as a strict prefix, used to resume a scan
/// just past the last row processed.
fn successor(key: &[u8]) -> Vec<u8> {
    let mut next = key.to_vec();
    next.push(0);
    next
}

/// Serial online index builder.
///
/// Generic over the KV store `S`, the decoded item type `Item`, and the
/// maintainer `M` that turns items into index entries — this crate never
/// names a concrete item or maintainer type itself (spec.md §4 keeps index
/// kinds pluggable).
pub struct OnlineIndexBuilder<S: KvStore, Item, M: IndexMaintainer<Item>> {
    store: S,
    maintainer: M,
    _item: PhantomData<Item>,
}

impl<S: KvStore, Item, M: IndexMaintainer<Item>> OnlineIndexBuilder<S, Item, M> {
    /// Build a builder against `store`, back-filling through `maintainer`.
    pub fn new(store: S, maintainer: M) -> Self {
        OnlineIndexBuilder {
            store,
            maintainer,
            _item: PhantomData,
        }
    }

    /// Back-fill `descriptor` by scanning `primary_range` and decoding each
    /// row with `decode`. Resumable: progress is persisted under the
    /// index's subspace, so calling `build` again after a crash continues
    /// from the last committed batch instead of restarting.
    pub fn build(
        &self,
        descriptor: &IndexDescriptor,
        primary_range: (Vec<u8>, Vec<u8>),
        decode: impl Fn(&[u8], &[u8]) -> (PrimaryKey, Item),
        options: BuildOptions,
    ) -> IndexResult<BuildOutcome> {
        let throttler = AdaptiveThrottler::new(options.throttle);
        let progress_key = progress_key(descriptor.subspace());

        if options.clear_first {
            let mut txn = self.store.begin();
            let (begin, end) = descriptor.subspace().range();
            txn.clear_range(&begin, &end);
            txn.commit()?;
        }

        let mut range_set = {
            let mut txn = self.store.begin();
            match txn.get(&progress_key, true)? {
                Some(bytes) => RangeSet::from_bytes(descriptor.name(), &bytes)?,
                None => RangeSet::covering(primary_range.0.clone(), primary_range.1.clone()),
            }
        };

        let mut items_indexed = 0usize;
        let mut violations = UniquenessViolationTracker::new();

        while !range_set.is_complete() {
            let front = range_set.next_range().expect("checked not complete").clone();
            let batch_size = throttler.batch();

            // Collect observed (value_key, primary_key) pairs here, not
            // directly into `violations`: a commit can fail and retry, and
            // `violations` must only ever see the rows from a batch that
            // actually committed.
            let attempt = || -> IndexResult<(usize, Vec<u8>, bool, Vec<(Vec<fusion_core::FieldValue>, PrimaryKey)>)> {
                let mut txn = self.store.begin();
                let rows = txn.get_range(&front.begin, &front.end, false, Some(batch_size))?;
                let exhausted = rows.len() < batch_size;
                let mut last_key = front.begin.clone();
                let mut observed = Vec::new();

                for (key, value) in &rows {
                    let (primary_key, item) = decode(key, value);
                    for entry in self.maintainer.index_keys(&item) {
                        if descriptor.is_unique() {
                            crate::violations::record_observation(&mut txn, descriptor.subspace(), &entry.value_key, &entry.primary_key)?;
                            observed.push((entry.value_key.clone(), entry.primary_key.clone()));
                        }
                    }
                    self.maintainer
                        .update(&mut txn, descriptor.subspace(), &primary_key, None, Some(&item))?;
                    last_key = key.clone();
                }

                let next_key = if exhausted { front.end.clone() } else { successor(&last_key) };
                let mut next_range_set = range_set.clone();
                next_range_set.advance(next_key.clone());
                txn.set(&progress_key, &next_range_set.to_bytes()?);

                txn.commit()?;
                Ok((rows.len(), next_key, exhausted, observed))
            };

            match attempt() {
                Ok((count, next_key, _exhausted, observed)) => {
                    items_indexed += count;
                    range_set.advance(next_key);
                    for (value_key, primary_key) in observed {
                        violations.observe(value_key, primary_key);
                    }
                    throttler.record_success(count, std::time::Duration::from_millis(0));
                }
                Err(err) => {
                    let kv_err = match &err {
                        crate::error::IndexError::Kv(e) => Some(e),
                        _ => None,
                    };
                    if let Some(kv_err) = kv_err {
                        throttler.record_failure(kv_err);
                        if throttler.is_retryable(kv_err) {
                            throttler.wait_before_next_batch();
                            continue;
                        }
                    }
                    return Err(err);
                }
            }

            throttler.wait_before_next_batch();
        }

        let mut txn = self.store.begin();
        txn.clear(&progress_key);
        txn.commit()?;

        Ok(BuildOutcome {
            items_indexed,
            violations: violations.violations(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_core::FieldValue;
    use fusion_kv::InMemoryKvStore;

    use crate::maintainer::IndexEntry;

    struct EchoMaintainer;

    impl IndexMaintainer<(PrimaryKey, FieldValue)> for EchoMaintainer {
        fn index_keys(&self, item: &(PrimaryKey, FieldValue)) -> Vec<IndexEntry> {
            vec![IndexEntry {
                value_key: vec![item.1.clone()],
                primary_key: item.0.clone(),
            }]
        }

        fn update<Tx: KvTransaction>(
            &self,
            txn: &mut Tx,
            subspace: &Subspace,
            _primary_key: &PrimaryKey,
            _old_item: Option<&(PrimaryKey, FieldValue)>,
            new_item: Option<&(PrimaryKey, FieldValue)>,
        ) -> IndexResult<()> {
            if let Some(item) = new_item {
                for entry in self.index_keys(item) {
                    let mut elements = entry.value_key.clone();
                    elements.extend(entry.primary_key.components().iter().cloned());
                    txn.set(&subspace.pack(&elements), &[]);
                }
            }
            Ok(())
        }
    }

    fn seed_primary_data(store: &InMemoryKvStore, primary: &Subspace, n: i64) {
        let mut txn = store.begin();
        for i in 0..n {
            let key = primary.pack(&[FieldValue::Int64(i)]);
            txn.set(&key, &(i * 10).to_le_bytes());
        }
        txn.commit().unwrap();
    }

    #[test]
    fn build_indexes_every_row_across_batches() {
        let store = InMemoryKvStore::new();
        let primary = Subspace::root().child(FieldValue::String("items".into()));
        seed_primary_data(&store, &primary, 25);

        let descriptor = IndexDescriptor::new(
            "by_value",
            "scalar",
            vec![],
            vec![],
            Subspace::root().child(FieldValue::String("idx".into())),
            false,
        );

        let builder = OnlineIndexBuilder::new(store.clone(), EchoMaintainer);
        let mut options = BuildOptions::default();
        options.throttle.min_batch = 5;
        options.throttle.max_batch = 5;

        let decode = |key: &[u8], value: &[u8]| {
            let pk_elems = primary.unpack(key).unwrap();
            let v = i64::from_le_bytes(value.try_into().unwrap());
            let pk = PrimaryKey::new(pk_elems);
            (pk.clone(), (pk, FieldValue::Int64(v)))
        };

        let (begin, end) = primary.range();
        let outcome = builder.build(&descriptor, (begin, end), decode, options).unwrap();

        assert_eq!(outcome.items_indexed, 25);
        assert!(outcome.is_clean());

        let mut txn = store.begin();
        let (ibegin, iend) = descriptor.subspace().range();
        let rows = txn.get_range(&ibegin, &iend, true, None).unwrap();
        assert_eq!(rows.len(), 25);
    }

    #[test]
    fn build_detects_uniqueness_violations() {
        let store = InMemoryKvStore::new();
        let primary = Subspace::root().child(FieldValue::String("items".into()));

        let mut txn = store.begin();
        txn.set(&primary.pack(&[FieldValue::Int64(1)]), &5i64.to_le_bytes());
        txn.set(&primary.pack(&[FieldValue::Int64(2)]), &5i64.to_le_bytes());
        txn.commit().unwrap();

        let descriptor = IndexDescriptor::new(
            "by_value",
            "scalar",
            vec![],
            vec![],
            Subspace::root().child(FieldValue::String("idx".into())),
            true,
        );

        let builder = OnlineIndexBuilder::new(store.clone(), EchoMaintainer);
        let decode = |key: &[u8], value: &[u8]| {
            let pk_elems = primary.unpack(key).unwrap();
            let v = i64::from_le_bytes(value.try_into().unwrap());
            let pk = PrimaryKey::new(pk_elems);
            (pk.clone(), (pk, FieldValue::Int64(v)))
        };

        let (begin, end) = primary.range();
        let outcome = builder
            .build(&descriptor, (begin, end), decode, BuildOptions::default())
            .unwrap();

        assert!(!outcome.is_clean());
        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].primary_keys.len(), 2);
    }

    #[test]
    fn build_resumes_from_persisted_progress() {
        let store = InMemoryKvStore::new();
        let primary = Subspace::root().child(FieldValue::String("items".into()));
        seed_primary_data(&store, &primary, 10);

        let descriptor = IndexDescriptor::new(
            "by_value",
            "scalar",
            vec![],
            vec![],
            Subspace::root().child(FieldValue::String("idx".into())),
            false,
        );

        let decode = |key: &[u8], value: &[u8]| {
            let pk_elems = primary.unpack(key).unwrap();
            let v = i64::from_le_bytes(value.try_into().unwrap());
            let pk = PrimaryKey::new(pk_elems);
            (pk.clone(), (pk, FieldValue::Int64(v)))
        };

        let (begin, end) = primary.range();

        // Manually seed progress as if a prior run got through the first 4 rows.
        let fourth_key = primary.pack(&[FieldValue::Int64(3)]);
        let mut partial = RangeSet::covering(begin.clone(), end.clone());
        partial.advance(successor(&fourth_key));
        let mut txn = store.begin();
        txn.set(&progress_key(descriptor.subspace()), &partial.to_bytes().unwrap());
        txn.commit().unwrap();

        let builder = OnlineIndexBuilder::new(store.clone(), EchoMaintainer);
        let outcome = builder
            .build(&descriptor, (begin, end), decode, BuildOptions::default())
            .unwrap();

        // Only rows with primary key > 3 should have been (re-)indexed this call.
        assert_eq!(outcome.items_indexed, 6);
    }
}

//! Parallel online index builder: the primary range is split into chunks
//! up front, and a bounded worker pool back-fills each chunk independently
//! (spec.md §4.2 "Parallel build").
//!
//! Each chunk persists its own resumption point under its own key
//! (`index/_build/<indexName>/<chunkIndex>`), so a crash mid-run loses at
//! most the in-flight batches of whichever chunks were active, not the
//! chunks already completed, and two chunks committing concurrently never
//! contend for the same key. [`crate::progress::ProgressTracker`] is used
//! only as an in-memory aggregate of the per-chunk statuses loaded at the
//! start of a run.

use std::marker::PhantomData;

use fusion_core::PrimaryKey;
use fusion_kv::{KvStore, KvTransaction, Subspace};
use fusion_throttle::{AdaptiveThrottler, ThrottleConfig};
use rayon::prelude::*;

use crate::descriptor::IndexDescriptor;
use crate::error::IndexResult;
use crate::maintainer::IndexMaintainer;
use crate::progress::{ChunkStatus, ProgressTracker};
use crate::violations::UniquenessViolationTracker;

use super::{successor, BuildOutcome};

const BUILD_SEGMENT: &str = "_build";

fn build_subspace(subspace: &Subspace) -> Subspace {
    subspace.child(fusion_core::FieldValue::String(BUILD_SEGMENT.into()))
}

/// Per-chunk progress key: `index/_build/<indexName>/<chunkIndex>`. Disjoint
/// across chunks, so sibling workers committing different chunks' progress
/// never touch the same key and can never conflict with each other.
fn chunk_key(subspace: &Subspace, chunk_index: usize) -> Vec<u8> {
    build_subspace(subspace).child(fusion_core::FieldValue::Int64(chunk_index as i64)).bytes().to_vec()
}

/// Tunables for a parallel back-fill.
#[derive(Debug, Clone)]
pub struct ParallelBuildOptions {
    /// Target bytes of primary data per chunk, passed to
    /// `KvTransaction::get_split_points`.
    pub chunk_size: u64,
    /// Maximum number of chunks processed concurrently.
    pub max_concurrency: usize,
    /// If set, wipe any existing entries under the index subspace before
    /// starting.
    pub clear_first: bool,
    /// Adaptive-throttling configuration, applied independently per worker.
    pub throttle: ThrottleConfig,
}

impl Default for ParallelBuildOptions {
    fn default() -> Self {
        ParallelBuildOptions {
            chunk_size: 10 * 1024 * 1024,
            max_concurrency: 4,
            clear_first: false,
            throttle: ThrottleConfig::default(),
        }
    }
}

/// Parallel online index builder.
///
/// See [`crate::builder::OnlineIndexBuilder`] for the serial counterpart;
/// the two share batch-processing logic conceptually but not code, since
/// the parallel variant must track resumption per-chunk rather than as one
/// linear range.
pub struct ParallelIndexBuilder<S: KvStore, Item, M: IndexMaintainer<Item> + Sync> {
    store: S,
    maintainer: M,
    // `fn() -> Item` rather than `Item` so this struct's `Sync`-ness never
    // depends on whether the decoded item type itself is `Sync` — only
    // instances of `Item` ever cross a thread boundary, via `decode`'s
    // return value, never through `self`.
    _item: PhantomData<fn() -> Item>,
}

impl<S, Item, M> ParallelIndexBuilder<S, Item, M>
where
    S: KvStore,
    M: IndexMaintainer<Item> + Sync,
{
    /// Build a parallel builder against `store`, back-filling through
    /// `maintainer`.
    pub fn new(store: S, maintainer: M) -> Self {
        ParallelIndexBuilder {
            store,
            maintainer,
            _item: PhantomData,
        }
    }

    /// Back-fill `descriptor` across `primary_range`, splitting it into
    /// chunks and processing up to `options.max_concurrency` of them at
    /// once.
    pub fn build(
        &self,
        descriptor: &IndexDescriptor,
        primary_range: (Vec<u8>, Vec<u8>),
        decode: impl Fn(&[u8], &[u8]) -> (PrimaryKey, Item) + Sync,
        options: ParallelBuildOptions,
    ) -> IndexResult<BuildOutcome>
    where
        Item: Send,
    {
        if options.clear_first {
            let mut txn = self.store.begin();
            let (begin, end) = descriptor.subspace().range();
            txn.clear_range(&begin, &end);
            txn.commit()?;
        }

        let split_points = {
            let mut txn = self.store.begin();
            txn.get_split_points(&primary_range.0, &primary_range.1, options.chunk_size)?
        };
        let chunks: Vec<(Vec<u8>, Vec<u8>)> = split_points.windows(2).map(|w| (w[0].clone(), w[1].clone())).collect();

        let mut tracker = ProgressTracker::new(chunks.len());
        {
            let mut txn = self.store.begin();
            for i in 0..chunks.len() {
                if let Some(bytes) = txn.get(&chunk_key(descriptor.subspace(), i), true)? {
                    tracker.set_status(i, ChunkStatus::from_bytes(descriptor.name(), &bytes)?);
                }
            }
        }
        if chunks.is_empty() || tracker.is_complete() {
            return Ok(BuildOutcome::default());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.max_concurrency.max(1))
            .build()
            .expect("thread pool construction");

        let to_process = tracker.incomplete_chunks();
        let results: Vec<IndexResult<(usize, usize, Vec<(Vec<fusion_core::FieldValue>, PrimaryKey)>)>> = pool.install(|| {
            to_process
                .par_iter()
                .map(|&chunk_index| {
                    let (chunk_begin, chunk_end) = &chunks[chunk_index];
                    let resume_from = match tracker.status(chunk_index) {
                        ChunkStatus::InProgress { last_key } => successor(last_key),
                        _ => chunk_begin.clone(),
                    };
                    self.process_chunk(
                        descriptor,
                        chunk_index,
                        resume_from,
                        chunk_end.clone(),
                        &decode,
                        &options.throttle,
                    )
                })
                .collect()
        });

        let mut items_indexed = 0usize;
        let mut violations = UniquenessViolationTracker::new();
        for (i, result) in to_process.iter().zip(results.into_iter()) {
            let (count, _chunk_index, observed) = result?;
            items_indexed += count;
            for (value_key, primary_key) in observed {
                violations.observe(value_key, primary_key);
            }
            tracker.record_complete(*i);
        }

        if tracker.is_complete() {
            let mut txn = self.store.begin();
            let (begin, end) = build_subspace(descriptor.subspace()).range();
            txn.clear_range(&begin, &end);
            txn.commit()?;
        }

        Ok(BuildOutcome {
            items_indexed,
            violations: violations.violations(),
        })
    }

    /// Back-fill one chunk to completion, persisting per-batch progress
    /// under this chunk's own key so a concurrently-failing sibling chunk's
    /// retries never touch it.
    fn process_chunk(
        &self,
        descriptor: &IndexDescriptor,
        chunk_index: usize,
        mut cursor: Vec<u8>,
        chunk_end: Vec<u8>,
        decode: &(impl Fn(&[u8], &[u8]) -> (PrimaryKey, Item) + Sync),
        throttle: &ThrottleConfig,
    ) -> IndexResult<(usize, usize, Vec<(Vec<fusion_core::FieldValue>, PrimaryKey)>)> {
        let throttler = AdaptiveThrottler::new(*throttle);
        let chunk_key = chunk_key(descriptor.subspace(), chunk_index);
        let mut items_indexed = 0usize;
        let mut observed = Vec::new();

        loop {
            if cursor >= chunk_end {
                break;
            }
            let batch_size = throttler.batch();

            let attempt = || -> IndexResult<(usize, Vec<u8>, bool, Vec<(Vec<fusion_core::FieldValue>, PrimaryKey)>)> {
                let mut txn = self.store.begin();
                let rows = txn.get_range(&cursor, &chunk_end, false, Some(batch_size))?;
                let exhausted = rows.len() < batch_size;
                let mut last_key = cursor.clone();
                let mut batch_observed = Vec::new();

                for (key, value) in &rows {
                    let (primary_key, item) = decode(key, value);
                    for entry in self.maintainer.index_keys(&item) {
                        if descriptor.is_unique() {
                            crate::violations::record_observation(&mut txn, descriptor.subspace(), &entry.value_key, &entry.primary_key)?;
                            batch_observed.push((entry.value_key.clone(), entry.primary_key.clone()));
                        }
                    }
                    self.maintainer
                        .update(&mut txn, descriptor.subspace(), &primary_key, None, Some(&item))?;
                    last_key = key.clone();
                }

                let next_cursor = if exhausted { chunk_end.clone() } else { successor(&last_key) };

                // This chunk owns its progress key exclusively — no sibling
                // chunk ever reads or writes it — so this commit can never
                // conflict with another chunk's concurrent commit.
                let status = if exhausted {
                    ChunkStatus::Complete
                } else {
                    ChunkStatus::InProgress { last_key: last_key.clone() }
                };
                txn.set(&chunk_key, &status.to_bytes()?);

                txn.commit()?;
                Ok((rows.len(), next_cursor, exhausted, batch_observed))
            };

            match attempt() {
                Ok((count, next_cursor, exhausted, batch_observed)) => {
                    items_indexed += count;
                    observed.extend(batch_observed);
                    throttler.record_success(count, std::time::Duration::from_millis(0));
                    cursor = next_cursor;
                    if exhausted {
                        break;
                    }
                }
                Err(err) => {
                    if let crate::error::IndexError::Kv(kv_err) = &err {
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

        Ok((items_indexed, chunk_index, observed))
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

    #[test]
    fn parallel_build_indexes_every_row() {
        let store = InMemoryKvStore::new();
        let primary = Subspace::root().child(FieldValue::String("items".into()));

        let mut txn = store.begin();
        for i in 0..40i64 {
            txn.set(&primary.pack(&[FieldValue::Int64(i)]), &i.to_le_bytes());
        }
        txn.commit().unwrap();

        let descriptor = IndexDescriptor::new(
            "by_value",
            "scalar",
            vec![],
            vec![],
            Subspace::root().child(FieldValue::String("idx".into())),
            false,
        );

        let builder = ParallelIndexBuilder::new(store.clone(), EchoMaintainer);
        let decode = |key: &[u8], value: &[u8]| {
            let pk_elems = primary.unpack(key).unwrap();
            let v = i64::from_le_bytes(value.try_into().unwrap());
            let pk = PrimaryKey::new(pk_elems);
            (pk.clone(), (pk, FieldValue::Int64(v)))
        };

        let (begin, end) = primary.range();
        let outcome = builder
            .build(&descriptor, (begin, end), decode, ParallelBuildOptions::default())
            .unwrap();

        assert_eq!(outcome.items_indexed, 40);

        let mut txn = store.begin();
        let (ibegin, iend) = descriptor.subspace().range();
        let rows = txn.get_range(&ibegin, &iend, true, None).unwrap();
        assert_eq!(rows.len(), 40);
    }
}

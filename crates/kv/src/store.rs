//! In-memory reference implementation of [`KvTransaction`], using optimistic
//! concurrency control with snapshot isolation.
//!
//! Grounded on the teacher's `strata-concurrency` OCC design: each key
//! carries a monotonic version; a transaction records the version it saw
//! for every non-snapshot read, and commit is first-committer-wins — it
//! fails if any read key's version has moved since the read. Blind writes
//! (a write with no preceding read) never conflict, matching
//! `validation.rs`'s "Write skew is ALLOWED" rule. This stands in for the
//! real external KV store spec.md places out of scope; it exists so the
//! online builder, graph store, and vector maintainers have something
//! concrete to run against in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::{KvError, KvResult};
use crate::transaction::{KeyValue, KvStore, KvTransaction};

#[derive(Debug, Clone)]
struct VersionedEntry {
    value: Vec<u8>,
    version: u64,
}

struct Inner {
    data: BTreeMap<Vec<u8>, VersionedEntry>,
}

/// An in-memory, order-preserving KV store with OCC transactions.
#[derive(Clone)]
pub struct InMemoryKvStore {
    inner: Arc<RwLock<Inner>>,
    next_version: Arc<AtomicU64>,
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryKvStore {
    /// Create an empty store.
    pub fn new() -> Self {
        InMemoryKvStore {
            inner: Arc::new(RwLock::new(Inner {
                data: BTreeMap::new(),
            })),
            next_version: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Begin a new transaction against a consistent snapshot of the store.
    pub fn begin(&self) -> Transaction {
        let snapshot = self.inner.read().unwrap().data.clone();
        Transaction {
            store: self.clone(),
            snapshot,
            read_versions: HashMap::new(),
            writes: BTreeMap::new(),
            clears: std::collections::BTreeSet::new(),
            clear_ranges: Vec::new(),
            resolved: false,
        }
    }

    /// Number of live keys, for tests.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().data.len()
    }

    /// True if the store has no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for InMemoryKvStore {
    type Txn = Transaction;

    fn begin(&self) -> Transaction {
        InMemoryKvStore::begin(self)
    }
}

/// A transaction against an [`InMemoryKvStore`].
pub struct Transaction {
    store: InMemoryKvStore,
    /// Snapshot taken at `begin`; all non-snapshot reads are served from
    /// here so a transaction never observes another transaction's writes
    /// made after it started.
    snapshot: BTreeMap<Vec<u8>, VersionedEntry>,
    /// Version observed for each non-snapshot-read key, for validation.
    read_versions: HashMap<Vec<u8>, u64>,
    writes: BTreeMap<Vec<u8>, Vec<u8>>,
    clears: std::collections::BTreeSet<Vec<u8>>,
    clear_ranges: Vec<(Vec<u8>, Vec<u8>)>,
    resolved: bool,
}

impl Transaction {
    /// Merge this transaction's own buffered writes over its snapshot, so
    /// reads-after-writes within the same transaction observe them.
    fn effective_get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if self.clears.contains(key) {
            return None;
        }
        if let Some(v) = self.writes.get(key) {
            return Some(v.clone());
        }
        for (begin, end) in &self.clear_ranges {
            if key >= begin.as_slice() && key < end.as_slice() {
                return None;
            }
        }
        self.snapshot.get(key).map(|e| e.value.clone())
    }
}

impl KvTransaction for Transaction {
    fn get(&mut self, key: &[u8], snapshot: bool) -> KvResult<Option<Vec<u8>>> {
        if self.resolved {
            return Err(KvError::TransactionResolved);
        }
        if !snapshot {
            let version = self.snapshot.get(key).map(|e| e.version).unwrap_or(0);
            self.read_versions.entry(key.to_vec()).or_insert(version);
        }
        Ok(self.effective_get(key))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.clears.remove(key);
        self.writes.insert(key.to_vec(), value.to_vec());
    }

    fn clear(&mut self, key: &[u8]) {
        self.writes.remove(key);
        self.clears.insert(key.to_vec());
    }

    fn clear_range(&mut self, begin: &[u8], end: &[u8]) {
        self.writes.retain(|k, _| !(k.as_slice() >= begin && k.as_slice() < end));
        self.clear_ranges.push((begin.to_vec(), end.to_vec()));
    }

    fn get_range(
        &mut self,
        begin: &[u8],
        end: &[u8],
        snapshot: bool,
        limit: Option<usize>,
    ) -> KvResult<Vec<KeyValue>> {
        if self.resolved {
            return Err(KvError::TransactionResolved);
        }
        // Materialize the effective view: snapshot entries overlaid with
        // this transaction's own buffered writes/clears, the way a real
        // transactional KV presents read-your-writes semantics.
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .snapshot
            .range(begin.to_vec()..end.to_vec())
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect();
        for (begin_r, end_r) in &self.clear_ranges {
            merged.retain(|k, _| !(k.as_slice() >= begin_r.as_slice() && k.as_slice() < end_r.as_slice()));
        }
        for k in &self.clears {
            merged.remove(k);
        }
        for (k, v) in self.writes.range(begin.to_vec()..end.to_vec()) {
            merged.insert(k.clone(), v.clone());
        }

        if !snapshot {
            for k in merged.keys() {
                let version = self.snapshot.get(k).map(|e| e.version).unwrap_or(0);
                self.read_versions.entry(k.clone()).or_insert(version);
            }
        }

        let mut results: Vec<KeyValue> = merged.into_iter().collect();
        if let Some(limit) = limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    fn get_split_points(&mut self, begin: &[u8], end: &[u8], chunk_size: u64) -> KvResult<Vec<Vec<u8>>> {
        // Reference implementation: split by key count, approximating
        // `chunk_size` bytes using each entry's encoded length. A real KV
        // adapter would ask the store for physical storage boundaries.
        let entries = self.get_range(begin, end, true, None)?;
        let mut points = vec![begin.to_vec()];
        let mut running_bytes: u64 = 0;
        for (k, v) in &entries {
            running_bytes += (k.len() + v.len()) as u64;
            if running_bytes >= chunk_size {
                points.push(k.clone());
                running_bytes = 0;
            }
        }
        if points.last() != Some(&end.to_vec()) {
            points.push(end.to_vec());
        }
        points.dedup();
        Ok(points)
    }

    fn commit(mut self) -> KvResult<()> {
        if self.resolved {
            return Err(KvError::TransactionResolved);
        }
        self.resolved = true;
        let mut inner = self.store.inner.write().unwrap();

        // First-committer-wins: fail if any key we read has moved since.
        for (key, read_version) in &self.read_versions {
            let current = inner.data.get(key).map(|e| e.version).unwrap_or(0);
            if current != *read_version {
                return Err(KvError::CommitConflict(key.clone()));
            }
        }

        let commit_version = self.store.next_version.fetch_add(1, Ordering::SeqCst);
        for (begin, end) in &self.clear_ranges {
            let keys: Vec<Vec<u8>> = inner
                .data
                .range(begin.clone()..end.clone())
                .map(|(k, _)| k.clone())
                .collect();
            for k in keys {
                inner.data.remove(&k);
            }
        }
        for k in &self.clears {
            inner.data.remove(k);
        }
        for (k, v) in self.writes {
            inner.data.insert(
                k,
                VersionedEntry {
                    value: v,
                    version: commit_version,
                },
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_same_tx() {
        let store = InMemoryKvStore::new();
        let mut tx = store.begin();
        tx.set(b"a", b"1");
        assert_eq!(tx.get(b"a", false).unwrap(), Some(b"1".to_vec()));
        tx.commit().unwrap();
    }

    #[test]
    fn committed_write_visible_to_new_transaction() {
        let store = InMemoryKvStore::new();
        let mut tx = store.begin();
        tx.set(b"a", b"1");
        tx.commit().unwrap();

        let mut tx2 = store.begin();
        assert_eq!(tx2.get(b"a", false).unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn snapshot_isolation_hides_concurrent_commit() {
        let store = InMemoryKvStore::new();
        let mut tx1 = store.begin();
        tx1.set(b"a", b"1");
        tx1.commit().unwrap();

        let mut reader = store.begin();
        assert_eq!(reader.get(b"a", false).unwrap(), Some(b"1".to_vec()));

        let mut tx2 = store.begin();
        tx2.set(b"a", b"2");
        tx2.commit().unwrap();

        // reader's snapshot was taken before tx2 committed.
        assert_eq!(reader.get(b"a", false).unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn read_write_conflict_detected() {
        let store = InMemoryKvStore::new();
        let mut seed = store.begin();
        seed.set(b"a", b"0");
        seed.commit().unwrap();

        let mut tx1 = store.begin();
        let mut tx2 = store.begin();
        tx1.get(b"a", false).unwrap();
        tx2.get(b"a", false).unwrap();

        tx1.set(b"a", b"1");
        tx1.commit().unwrap();

        tx2.set(b"a", b"2");
        let err = tx2.commit().unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn blind_write_does_not_conflict() {
        let store = InMemoryKvStore::new();
        let mut seed = store.begin();
        seed.set(b"a", b"0");
        seed.commit().unwrap();

        let mut tx1 = store.begin();
        let mut tx2 = store.begin();
        // Neither transaction reads `a` first -- a blind write.
        tx1.set(b"a", b"1");
        tx1.commit().unwrap();

        tx2.set(b"a", b"2");
        assert!(tx2.commit().is_ok());
    }

    #[test]
    fn range_scan_respects_limit_and_order() {
        let store = InMemoryKvStore::new();
        let mut tx = store.begin();
        for i in 0..5u8 {
            tx.set(&[i], b"v");
        }
        tx.commit().unwrap();

        let mut reader = store.begin();
        let results = reader.get_range(&[0], &[255], true, Some(3)).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, vec![0]);
        assert_eq!(results[2].0, vec![2]);
    }

    #[test]
    fn clear_range_removes_all_keys_in_range() {
        let store = InMemoryKvStore::new();
        let mut tx = store.begin();
        for i in 0..5u8 {
            tx.set(&[i], b"v");
        }
        tx.commit().unwrap();

        let mut tx2 = store.begin();
        tx2.clear_range(&[1], &[4]);
        tx2.commit().unwrap();

        let mut reader = store.begin();
        let results = reader.get_range(&[0], &[255], true, None).unwrap();
        let keys: Vec<u8> = results.iter().map(|(k, _)| k[0]).collect();
        assert_eq!(keys, vec![0, 4]);
    }

    #[test]
    fn split_points_include_begin_and_end() {
        let store = InMemoryKvStore::new();
        let mut tx = store.begin();
        for i in 0..10u8 {
            tx.set(&[i], b"0123456789");
        }
        tx.commit().unwrap();

        let mut reader = store.begin();
        let points = reader.get_split_points(&[0], &[255], 30).unwrap();
        assert_eq!(points.first(), Some(&vec![0u8]));
        assert_eq!(points.last(), Some(&vec![255u8]));
        assert!(points.len() >= 2);
    }

    #[test]
    fn sparse_range_falls_back_to_single_chunk() {
        let store = InMemoryKvStore::new();
        let mut tx = store.begin();
        tx.set(&[1], b"v");
        tx.commit().unwrap();

        let mut reader = store.begin();
        let points = reader.get_split_points(&[0], &[255], 1_000_000).unwrap();
        assert_eq!(points, vec![vec![0u8], vec![255u8]]);
    }
}

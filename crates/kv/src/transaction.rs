//! The KV transaction interface consumed by the rest of the engine.
//!
//! spec.md §6: `get`, `set`, `clear`, `clearRange`, `getRange`,
//! `getSplitPoints`, `commit`, with snapshot reads skipping conflict
//! tracking and non-snapshot reads participating in it. The trait is
//! deliberately synchronous: the engine's own scheduling model (spec.md §5)
//! suspends at transaction round-trips, but that's a property of how the
//! *caller* schedules work across many transactions, not a requirement that
//! each individual KV call be `async`.

use crate::error::KvResult;

/// A single decoded key/value pair returned by a range scan.
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// An active transaction against the KV store.
///
/// Implementors provide snapshot-isolated reads and atomic, all-or-nothing
/// commit (spec.md §5 "Ordering guarantees"). [`InMemoryKvStore`] is the
/// reference implementation used by this workspace's tests; production
/// deployments implement this trait against the real external store.
///
/// [`InMemoryKvStore`]: crate::store::InMemoryKvStore
pub trait KvTransaction {
    /// Read a single key. Participates in conflict tracking unless
    /// `snapshot` is true.
    fn get(&mut self, key: &[u8], snapshot: bool) -> KvResult<Option<Vec<u8>>>;

    /// Buffer a write. Visible to this transaction's own subsequent reads,
    /// visible to other transactions only after a successful `commit`.
    fn set(&mut self, key: &[u8], value: &[u8]);

    /// Buffer a point delete.
    fn clear(&mut self, key: &[u8]);

    /// Buffer a half-open range delete `[begin, end)`.
    fn clear_range(&mut self, begin: &[u8], end: &[u8]);

    /// Scan a half-open range `[begin, end)` in key order, honoring an
    /// optional result `limit`. Snapshot scans skip conflict tracking, the
    /// same as snapshot point reads.
    fn get_range(
        &mut self,
        begin: &[u8],
        end: &[u8],
        snapshot: bool,
        limit: Option<usize>,
    ) -> KvResult<Vec<KeyValue>>;

    /// Ask the store for approximately-evenly-spaced split points across
    /// `[begin, end)` targeting `chunk_size` bytes of data per chunk
    /// (spec.md §4.2 "Parallel build"). Returns `begin` and `end` plus any
    /// interior split points, in order; a range with too little data to
    /// split returns just `[begin, end]`.
    fn get_split_points(&mut self, begin: &[u8], end: &[u8], chunk_size: u64) -> KvResult<Vec<Vec<u8>>>;

    /// Commit all buffered writes atomically. On conflict, returns
    /// [`crate::error::KvError::CommitConflict`] and the transaction is left
    /// unresolved; the caller must not reuse it and should acquire a fresh
    /// transaction to retry (spec.md §5 "Cancellation and timeouts").
    fn commit(self) -> KvResult<()>;
}

/// A store capable of handing out fresh transactions.
///
/// Separated from [`KvTransaction`] so generic code (the online builder,
/// maintainers) can be generic over "a store I can begin transactions
/// against" without needing `dyn`-safety on a trait whose `commit` consumes
/// `self`.
pub trait KvStore: Clone + Send + Sync {
    /// The transaction type this store produces.
    type Txn: KvTransaction;

    /// Begin a new transaction against a consistent snapshot.
    fn begin(&self) -> Self::Txn;
}

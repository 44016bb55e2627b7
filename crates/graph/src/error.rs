//! Errors surfaced by the graph edge store and pattern evaluator.

use thiserror::Error;

use fusion_core::FieldValue;
use fusion_kv::KvError;

/// Result alias for this crate's fallible operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Errors the graph edge store, scanner, and pattern evaluator can produce.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The underlying KV transaction failed.
    #[error(transparent)]
    Kv(#[from] KvError),

    /// A scan pattern left every one of `from`/`edge`/`to` unbound, which
    /// no storage strategy can answer without a full scan this crate
    /// refuses to perform implicitly.
    #[error("scan pattern must bind at least one of from/edge/to")]
    UnboundScan,

    /// A property path referenced an unsupported combination (both
    /// endpoints unbound; this evaluator requires at least one bound
    /// endpoint to seed the traversal).
    #[error("property path requires at least one bound endpoint")]
    UnboundPath,

    /// A stored tuple held a non-string value in the predicate position.
    /// Every edge is written with its label packed as `FieldValue::String`
    /// (`component`, in `store.rs`), so decoding anything else here means
    /// the on-disk tuple was never produced by this store.
    #[error("predicate position decoded to a non-string value: {0:?}")]
    InvalidPredicateEncoding(FieldValue),
}

//! Errors surfaced by the online index builder and maintainer interface.

use thiserror::Error;

use fusion_kv::KvError;

/// Result alias for this crate's fallible operations.
pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// Errors the online builder and maintainers can produce.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The underlying KV transaction failed; `retryable` mirrors
    /// [`KvError::is_retryable`].
    #[error(transparent)]
    Kv(#[from] KvError),

    /// `build` was called on a `disabled` index (spec.md §4.8).
    #[error("index '{0}' is disabled and cannot be built")]
    IndexDisabled(String),

    /// An illegal index-state transition was attempted (spec.md §3).
    #[error("invalid state transition for index '{index}': {from:?} -> {to:?}")]
    InvalidTransition {
        /// Index name.
        index: String,
        /// State the index was in.
        from: crate::descriptor::IndexState,
        /// State the transition attempted to reach.
        to: crate::descriptor::IndexState,
    },

    /// Back-fill completed but a unique index had unresolved duplicate
    /// values; the index stays `write-only` (spec.md §4.2, §7).
    #[error("uniqueness violations detected on index '{index}': {distinct_values} distinct value(s), {total_conflicts} conflicting key(s)")]
    UniquenessViolationsDetected {
        /// The index's name.
        index: String,
        /// Number of distinct index values with more than one primary key.
        distinct_values: usize,
        /// Total number of conflicting primary keys across all values.
        total_conflicts: usize,
    },

    /// Progress bytes stored under the index subspace did not deserialize.
    #[error("corrupt progress record for index '{0}': {1}")]
    CorruptProgress(String, String),
}

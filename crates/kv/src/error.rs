//! Errors surfaced by the KV adapter and tuple codec.

use thiserror::Error;

/// Result alias for KV adapter operations.
pub type KvResult<T> = std::result::Result<T, KvError>;

/// Errors the KV adapter and tuple codec can produce.
#[derive(Debug, Error)]
pub enum KvError {
    /// The transaction's read-set or write-set conflicted with another
    /// committed transaction (first-committer-wins). Retryable.
    #[error("commit conflict on key {0:?}")]
    CommitConflict(Vec<u8>),

    /// The transaction was already committed or aborted.
    #[error("transaction already resolved")]
    TransactionResolved,

    /// A byte string could not be unpacked as a valid tuple encoding.
    #[error("malformed tuple encoding: {0}")]
    MalformedTuple(String),
}

impl KvError {
    /// True for failures a caller should retry (spec.md §7 KV-retryable row).
    pub fn is_retryable(&self) -> bool {
        matches!(self, KvError::CommitConflict(_))
    }
}

impl From<KvError> for fusion_core::Error {
    fn from(e: KvError) -> Self {
        match &e {
            KvError::CommitConflict(_) => fusion_core::Error::Retryable(e.to_string()),
            KvError::TransactionResolved => fusion_core::Error::Fatal(e.to_string()),
            KvError::MalformedTuple(_) => fusion_core::Error::InvalidInput(e.to_string()),
        }
    }
}

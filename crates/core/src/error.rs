//! Top-level error type for the Fusion secondary-index engine.
//!
//! Every crate in the workspace defines its own narrow `thiserror` enum for
//! the failures it can actually produce (`fusion_kv::Error`,
//! `fusion_vector::VectorError`, ...). This module defines the umbrella
//! [`Error`] that those convert into at a crate boundary, so callers gluing
//! layers together (the online builder calling a maintainer, a facade
//! calling the pattern evaluator) have one error type to match on.

use thiserror::Error;

/// Result type alias used across the workspace's public APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced across the secondary-index engine's public interfaces.
///
/// This mirrors the error taxonomy in spec.md §7: retryable KV failures,
/// fatal KV failures, invalid input, and serialization mismatches each get
/// their own variant so callers can branch on `is_retryable`.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying KV transaction hit a conflict or timed out; retrying
    /// the transaction from scratch may succeed.
    #[error("KV transaction conflict or timeout: {0}")]
    Retryable(String),

    /// The underlying KV store is unavailable or refused the operation;
    /// retrying will not help.
    #[error("KV store error: {0}")]
    Fatal(String),

    /// A request referenced a field path, dimension, or index kind that
    /// does not match the record/descriptor it was issued against.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A quantizer or other stateful component was used before training.
    #[error("not trained: {0}")]
    NotTrained(String),

    /// On-disk bytes did not match the expected magic/version for their
    /// declared format.
    #[error("serialization version mismatch: {0}")]
    SerializationMismatch(String),

    /// The requested index, shape, or descriptor does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl Error {
    /// True for failures a caller should retry without changing anything,
    /// per spec.md §7 ("KV-retryable" row).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Retryable(_))
    }
}

//! Errors for vector quantization, codebook persistence, and flat KNN
//! maintenance (spec.md §4.7).

use fusion_kv::KvError;

/// Result alias used throughout this crate.
pub type VectorResult<T> = Result<T, VectorError>;

/// Errors raised by quantizers, the codebook trainer, and the flat
/// maintainer.
#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    /// Underlying KV failure.
    #[error(transparent)]
    Kv(#[from] KvError),

    /// A vector's length didn't match the quantizer's configured dimension.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// The dimension the quantizer was configured with.
        expected: usize,
        /// The length actually supplied.
        got: usize,
    },

    /// A quantizer was constructed with parameters that can never be valid,
    /// e.g. `D % M != 0` for product quantization.
    #[error("invalid quantizer configuration: {0}")]
    InvalidConfig(String),

    /// `encode`/`distance`/`prepare_query` called before `train`.
    #[error("quantizer has not been trained")]
    NotTrained,

    /// Codebook bytes failed to parse: bad magic, truncated, or a parameter
    /// mismatch against the live descriptor.
    #[error("corrupt codebook: {0}")]
    Corrupt(String),
}

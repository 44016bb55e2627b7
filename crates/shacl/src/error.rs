//! Errors the SHACL validator can produce.

use thiserror::Error;

use fusion_graph::GraphError;

/// Result alias for this crate's fallible operations.
pub type ShaclResult<T> = std::result::Result<T, ShaclError>;

/// Errors surfaced while validating a shapes graph.
#[derive(Debug, Error)]
pub enum ShaclError {
    /// The underlying graph scan failed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A `pattern` constraint's regular expression failed to compile.
    #[error("invalid pattern constraint regex {pattern:?}: {source}")]
    InvalidPattern {
        /// The offending pattern text.
        pattern: String,
        /// The underlying regex compile error.
        #[source]
        source: regex::Error,
    },

    /// A shapes graph referenced a shape IRI that was never declared.
    #[error("shape {0:?} is not declared in this shapes graph")]
    UnknownShape(String),
}

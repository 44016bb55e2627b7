//! Vector quantizers, codebook persistence, and a flat KNN index maintainer
//! (spec.md §4.7, §4.3 "Vector flat"/"Vector PQ").
//!
//! Three quantizer families share one shape: construct untrained, `train`
//! from a sample, `encode`/`decode`, and round-trip through a
//! magic-prefixed byte format (spec.md §3 "Vector codebook"). [`codebook`]
//! wraps all three behind one type so a [`flat::FlatMaintainer`] can hold
//! "whichever codebook this index trained" without matching on kind itself.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bq;
pub mod codebook;
pub mod distance;
pub mod error;
pub mod flat;
pub mod heap;
pub mod pq;
pub mod sq;
mod vecbytes;

pub use bq::BinaryQuantizer;
pub use codebook::{Codebook, CodebookTrainer, PreparedQuery, QuantizerKind, QuantizerParams};
pub use distance::Metric;
pub use error::{VectorError, VectorResult};
pub use flat::{FlatMaintainer, VectorExtract};
pub use heap::TopKHeap;
pub use pq::{PqQuery, ProductQuantizer};
pub use sq::ScalarQuantizer;

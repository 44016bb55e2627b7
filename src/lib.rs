//! # Fusion Index Engine
//!
//! A secondary-index engine layered over an ordered transactional key-value
//! store: scalar/composite indexes, graph edges with a SPARQL-style pattern
//! evaluator, SHACL shape validation, and PQ/SQ/BQ vector quantization, all
//! built and maintained online against a pluggable [`fusion_kv::KvStore`].
//!
//! # Quick start
//!
//! ```
//! use fusion_core::{FieldPath, FieldValue, PrimaryKey};
//! use fusion_index::{Container, FieldExtract, IndexDescriptor, IndexMaintainer, ScalarMaintainer};
//! use fusion_kv::{InMemoryKvStore, KvStore, KvTransaction, Subspace};
//!
//! struct User {
//!     id: i64,
//!     email: String,
//! }
//!
//! impl FieldExtract for User {
//!     fn field(&self, path: &FieldPath) -> FieldValue {
//!         match path.to_string().as_str() {
//!             "email" => FieldValue::String(self.email.clone()),
//!             _ => FieldValue::Null,
//!         }
//!     }
//!
//!     fn primary_key(&self) -> PrimaryKey {
//!         PrimaryKey::single(FieldValue::Int64(self.id))
//!     }
//! }
//!
//! let store = InMemoryKvStore::new();
//! let mut container = Container::new(store.clone());
//! let subspace = Subspace::root().child(FieldValue::String("by_email".into()));
//! container
//!     .declare(IndexDescriptor::new(
//!         "by_email",
//!         "scalar",
//!         vec![FieldPath::single("email")],
//!         vec![],
//!         subspace.clone(),
//!         true,
//!     ))
//!     .unwrap();
//!
//! let maintainer = ScalarMaintainer::new(vec![FieldPath::single("email")], true);
//! let user = User { id: 1, email: "a@example.com".into() };
//! let mut txn = store.begin();
//! maintainer.update(&mut txn, &subspace, &user.primary_key(), None, Some(&user)).unwrap();
//! txn.commit().unwrap();
//! ```
//!
//! # Layers
//!
//! | Module | Crate | Covers |
//! |---|---|---|
//! | [`core`] | `fusion-core` | `FieldValue`, `FieldPath`, `PrimaryKey`, the shared `Error` |
//! | [`kv`] | `fusion-kv` | `KvStore`/`KvTransaction`, the order-preserving tuple codec, subspaces |
//! | [`throttle`] | `fusion-throttle` | The adaptive batch-size/delay throttler back-fills run under |
//! | [`index`] | `fusion-index` | Index descriptor/state machine, progress tracking, the online builder, `IndexMaintainer`, `Container` |
//! | [`graph`] | `fusion-graph` | Edge storage, redundant-ordering scans, traversal, pattern evaluation |
//! | [`shacl`] | `fusion-shacl` | Shape-based record validation |
//! | [`vector`] | `fusion-vector` | PQ/SQ/BQ quantizers, the codebook trainer, the flat KNN maintainer |
//!
//! Each module only re-exports its crate's public surface; see that crate's
//! own documentation for the full API.

#![warn(missing_docs)]

/// Data model shared by every other layer: typed field values, field
/// paths, primary keys, and the top-level error type.
pub mod core {
    pub use fusion_core::*;
}

/// The ordered transactional KV abstraction, tuple codec, and subspaces
/// every index kind is built on.
pub mod kv {
    pub use fusion_kv::*;
}

/// The adaptive throttler online back-fills use to stay within a resource
/// budget while racing foreground traffic.
pub mod throttle {
    pub use fusion_throttle::*;
}

/// Index descriptors, state machines, progress tracking, the online
/// builder, the `IndexMaintainer` trait, and the `Container` registry.
pub mod index {
    pub use fusion_index::*;
}

/// Graph edge storage, scan-strategy selection, traversal, and the
/// SPARQL-style pattern evaluator.
pub mod graph {
    pub use fusion_graph::*;
}

/// SHACL-style shape validation over records.
pub mod shacl {
    pub use fusion_shacl::*;
}

/// PQ/SQ/BQ vector quantizers, codebook persistence, and the flat KNN
/// index maintainer.
pub mod vector {
    pub use fusion_vector::*;
}

//! Ordered transactional key-value adapter and tuple codec.
//!
//! This crate is the thin seam between the secondary-index engine and the
//! external ordered KV store spec.md places out of scope (§1, §6). It
//! defines:
//!
//! - [`tuple`]: an order-preserving byte encoding of heterogeneous typed
//!   tuples (spec.md §6 "Tuple codec (consumed)").
//! - [`subspace`]: prefix + tuple-encoding helpers for namespacing a region
//!   of the keyspace (spec.md §3 "Subspace").
//! - [`transaction`]: the `KvTransaction` trait spec.md §6 describes
//!   ("KV transaction interface (consumed)").
//! - [`store`]: an in-memory reference implementation of that trait with
//!   optimistic concurrency control and snapshot isolation, standing in for
//!   the real external store in tests and examples.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod store;
pub mod subspace;
pub mod transaction;
pub mod tuple;

pub use error::{KvError, KvResult};
pub use store::InMemoryKvStore;
pub use subspace::Subspace;
pub use transaction::{KeyValue, KvStore, KvTransaction};
pub use tuple::{pack, unpack, TupleElement};

//! Graph edge storage, redundant-ordering scan selection, traversal, and a
//! SPARQL-style pattern evaluator over it (spec.md §4.4, §4.5).
//!
//! A graph index picks one [`StorageStrategy`] at declaration time, trading
//! write amplification for query locality: every edge write updates every
//! layout the strategy implies, atomically, so any one ordering can answer
//! any query shape with a prefix scan instead of a full edge-set scan.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod edge;
pub mod error;
pub mod maintainer;
pub mod pattern;
pub mod scanner;
pub mod store;
pub mod traverse;

pub use edge::{Edge, EdgePattern};
pub use error::{GraphError, GraphResult};
pub use maintainer::{EdgeExtract, GraphMaintainer};
pub use pattern::{evaluate, Binding, FilterExpr, Pattern, PropertyPath, Term, TriplePattern};
pub use store::{GraphEdgeStore, StorageStrategy};
pub use traverse::{bfs, BfsOptions, BfsVisit, Direction};

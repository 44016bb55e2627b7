//! SHACL shapes validation over a [`fusion_graph::GraphEdgeStore`]
//! (spec.md §4.6).
//!
//! Targets resolve to focus nodes; each focus node is checked against its
//! shape's node-level constraints, closed-shape predicate list, and
//! property shapes (each evaluated once against the shape's full collected
//! value set, so cardinality constraints see the whole picture). Recursive
//! composition (`not`/`and`/`or`/`xone`/`node`/`qualifiedValueShape`)
//! re-enters the same per-value validation; cycle detection is the caller's
//! responsibility, not this engine's.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod report;
pub mod shapes;
pub mod targets;
pub mod validate;

pub use error::{ShaclError, ShaclResult};
pub use report::{ConstraintComponent, Report, Severity, Violation};
pub use shapes::{Constraint, NodeKind, NodeShape, PropertyShape, Shape, ShapesGraph, Target};
pub use validate::validate;

//! Online index builder, progress tracking, and the maintainer interface.
//!
//! This crate implements spec.md §4.1-§4.3 and §4.8: the adaptive-throttled
//! resumable back-fill engine (serial and parallel), the per-range/per-chunk
//! progress bookkeeping that makes it crash-safe, the index descriptor and
//! state machine, and the `IndexMaintainer` trait every concrete index kind
//! (scalar, graph, vector, ...) implements to plug into both normal writes
//! and back-fill.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod container;
pub mod descriptor;
pub mod error;
pub mod maintainer;
pub mod progress;
pub mod violations;

pub use builder::parallel::{ParallelBuildOptions, ParallelIndexBuilder};
pub use builder::{BuildOptions, BuildOutcome, OnlineIndexBuilder};
pub use container::Container;
pub use descriptor::{IndexDescriptor, IndexState, IndexStateMachine};
pub use error::{IndexError, IndexResult};
pub use maintainer::{FieldExtract, IndexEntry, IndexMaintainer, ScalarMaintainer};
pub use progress::{ChunkStatus, ProgressTracker, RangeEntry, RangeSet};
pub use violations::{UniquenessViolation, UniquenessViolationTracker};

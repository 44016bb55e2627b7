//! Index descriptors and the index state machine (spec.md §3).

use fusion_core::{FieldPath, ItemType};
use fusion_kv::Subspace;

use crate::error::{IndexError, IndexResult};

/// An index's lifecycle state.
///
/// Transitions (spec.md §3):
/// `disabled -> write-only` (declaration), `write-only -> readable` (after a
/// successful back-fill with no unresolved uniqueness violations),
/// `readable -> write-only` (schema evolution requiring a re-build), and
/// `* -> disabled` (drop).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexState {
    /// Not declared, or dropped. No reads or writes touch it.
    Disabled,
    /// Declared and kept in sync by writers, but not yet safe to read —
    /// back-fill is in progress or hasn't started.
    WriteOnly,
    /// Fully built and consistent; safe for reads.
    Readable,
}

/// Name, shape, and coverage of a single secondary index.
///
/// spec.md §3 invariant: a descriptor's subspace layout is fully determined
/// by its kind; changing `kind` requires a new descriptor name. This type
/// does not encode kind-specific parameters (vector dimension, graph
/// storage strategy, ...) — those live in the concrete maintainer that
/// interprets `kind`, keeping this crate decoupled from `fusion-graph` and
/// `fusion-vector`.
#[derive(Debug, Clone)]
pub struct IndexDescriptor {
    name: String,
    kind: String,
    field_paths: Vec<FieldPath>,
    item_types: Vec<ItemType>,
    subspace: Subspace,
    is_unique: bool,
}

impl IndexDescriptor {
    /// Declare a new index descriptor.
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        field_paths: Vec<FieldPath>,
        item_types: Vec<ItemType>,
        subspace: Subspace,
        is_unique: bool,
    ) -> Self {
        IndexDescriptor {
            name: name.into(),
            kind: kind.into(),
            field_paths,
            item_types,
            subspace,
            is_unique,
        }
    }

    /// The index's declared name, stable across its lifetime.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The index kind identifier (e.g. `"scalar"`, `"graph.adjacency"`).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Field paths the index covers.
    pub fn field_paths(&self) -> &[FieldPath] {
        &self.field_paths
    }

    /// Item types the index applies to.
    pub fn item_types(&self) -> &[ItemType] {
        &self.item_types
    }

    /// The subspace this index's entries, progress, and codebooks live
    /// under.
    pub fn subspace(&self) -> &Subspace {
        &self.subspace
    }

    /// True if duplicate index values across distinct primary keys are
    /// forbidden.
    pub fn is_unique(&self) -> bool {
        self.is_unique
    }
}

/// Enforces the legal index-state transitions for one descriptor.
pub struct IndexStateMachine {
    name: String,
    state: IndexState,
}

impl IndexStateMachine {
    /// A freshly declared state machine, starting `disabled`.
    pub fn new(name: impl Into<String>) -> Self {
        IndexStateMachine {
            name: name.into(),
            state: IndexState::Disabled,
        }
    }

    /// Build a state machine already in a known state (e.g. loaded from
    /// persisted metadata).
    pub fn with_state(name: impl Into<String>, state: IndexState) -> Self {
        IndexStateMachine {
            name: name.into(),
            state,
        }
    }

    /// Current state.
    pub fn state(&self) -> IndexState {
        self.state
    }

    /// Declare the index: `disabled -> write-only`.
    pub fn declare(&mut self) -> IndexResult<()> {
        self.transition(IndexState::WriteOnly, &[IndexState::Disabled])
    }

    /// Mark the index readable after a successful back-fill:
    /// `write-only -> readable`.
    pub fn mark_readable(&mut self) -> IndexResult<()> {
        self.transition(IndexState::Readable, &[IndexState::WriteOnly])
    }

    /// Force a re-build: `readable -> write-only`.
    pub fn require_rebuild(&mut self) -> IndexResult<()> {
        self.transition(IndexState::WriteOnly, &[IndexState::Readable])
    }

    /// Drop the index: any state to `disabled`.
    pub fn drop_index(&mut self) {
        self.state = IndexState::Disabled;
        tracing::info!(index = %self.name, "index dropped");
    }

    fn transition(&mut self, to: IndexState, allowed_from: &[IndexState]) -> IndexResult<()> {
        if !allowed_from.contains(&self.state) {
            return Err(IndexError::InvalidTransition {
                index: self.name.clone(),
                from: self.state,
                to,
            });
        }
        tracing::info!(index = %self.name, from = ?self.state, to = ?to, "index state transition");
        self.state = to;
        Ok(())
    }
}

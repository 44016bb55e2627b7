//! `Container`: the registry tying index descriptors, their state
//! machines, and a KV store together (spec.md §3 "Container").
//!
//! This is the facade most callers interact with rather than poking
//! `IndexDescriptor`/`IndexStateMachine` directly: declaring an index,
//! checking whether it's safe to read, and recording a back-fill's outcome
//! all go through one registry keyed by index name.

use std::collections::HashMap;

use fusion_kv::KvStore;

use crate::builder::BuildOutcome;
use crate::descriptor::{IndexDescriptor, IndexState, IndexStateMachine};
use crate::error::{IndexError, IndexResult};

struct Entry {
    descriptor: IndexDescriptor,
    state_machine: IndexStateMachine,
}

/// Registry of declared indexes over one KV store.
pub struct Container<S: KvStore> {
    store: S,
    indexes: HashMap<String, Entry>,
}

impl<S: KvStore> Container<S> {
    /// A container with no indexes declared yet.
    pub fn new(store: S) -> Self {
        Container {
            store,
            indexes: HashMap::new(),
        }
    }

    /// The underlying store, for callers that need to hand it to an
    /// [`crate::builder::OnlineIndexBuilder`] or
    /// [`crate::builder::parallel::ParallelIndexBuilder`].
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Declare a new index: `disabled -> write-only` (spec.md §3).
    pub fn declare(&mut self, descriptor: IndexDescriptor) -> IndexResult<()> {
        let name = descriptor.name().to_string();
        let mut state_machine = IndexStateMachine::new(name.clone());
        state_machine.declare()?;
        self.indexes.insert(name, Entry { descriptor, state_machine });
        Ok(())
    }

    /// The descriptor for `name`, if declared.
    pub fn descriptor(&self, name: &str) -> Option<&IndexDescriptor> {
        self.indexes.get(name).map(|e| &e.descriptor)
    }

    /// The current lifecycle state of index `name`.
    pub fn state(&self, name: &str) -> Option<IndexState> {
        self.indexes.get(name).map(|e| e.state_machine.state())
    }

    /// True if `name` is declared and `readable`, i.e. safe for reads.
    pub fn is_readable(&self, name: &str) -> bool {
        self.state(name) == Some(IndexState::Readable)
    }

    /// Record a back-fill's outcome: a clean run (no uniqueness violations)
    /// advances the index to `readable`; a run with violations leaves it
    /// `write-only` and reports the conflict, per spec.md §4.2/§7.
    pub fn complete_build(&mut self, name: &str, outcome: &BuildOutcome) -> IndexResult<()> {
        let entry = self
            .indexes
            .get_mut(name)
            .ok_or_else(|| IndexError::IndexDisabled(name.to_string()))?;
        if outcome.is_clean() {
            entry.state_machine.mark_readable()
        } else {
            let (distinct_values, total_conflicts) = (
                outcome.violations.len(),
                outcome.violations.iter().map(|v| v.primary_keys.len()).sum(),
            );
            Err(IndexError::UniquenessViolationsDetected {
                index: name.to_string(),
                distinct_values,
                total_conflicts,
            })
        }
    }

    /// Force a re-build after a schema change: `readable -> write-only`.
    pub fn require_rebuild(&mut self, name: &str) -> IndexResult<()> {
        let entry = self
            .indexes
            .get_mut(name)
            .ok_or_else(|| IndexError::IndexDisabled(name.to_string()))?;
        entry.state_machine.require_rebuild()
    }

    /// Drop an index: any state to `disabled`, removing it from the
    /// registry entirely.
    pub fn drop_index(&mut self, name: &str) {
        if let Some(mut entry) = self.indexes.remove(name) {
            entry.state_machine.drop_index();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_core::FieldValue;
    use fusion_kv::{InMemoryKvStore, Subspace};

    fn descriptor(name: &str, unique: bool) -> IndexDescriptor {
        IndexDescriptor::new(
            name,
            "scalar",
            vec![],
            vec![],
            Subspace::root().child(FieldValue::String(name.into())),
            unique,
        )
    }

    #[test]
    fn declared_index_starts_write_only() {
        let mut c = Container::new(InMemoryKvStore::new());
        c.declare(descriptor("by_email", false)).unwrap();
        assert_eq!(c.state("by_email"), Some(IndexState::WriteOnly));
        assert!(!c.is_readable("by_email"));
    }

    #[test]
    fn clean_build_advances_to_readable() {
        let mut c = Container::new(InMemoryKvStore::new());
        c.declare(descriptor("by_email", false)).unwrap();
        c.complete_build("by_email", &BuildOutcome::default()).unwrap();
        assert!(c.is_readable("by_email"));
    }

    #[test]
    fn violations_keep_index_write_only() {
        let mut c = Container::new(InMemoryKvStore::new());
        c.declare(descriptor("by_email", true)).unwrap();

        let outcome = BuildOutcome {
            items_indexed: 2,
            violations: vec![crate::violations::UniquenessViolation {
                value_key: vec![FieldValue::String("a@x.com".into())],
                primary_keys: vec![
                    fusion_core::PrimaryKey::single(FieldValue::Int64(1)),
                    fusion_core::PrimaryKey::single(FieldValue::Int64(2)),
                ],
            }],
        };
        assert!(c.complete_build("by_email", &outcome).is_err());
        assert_eq!(c.state("by_email"), Some(IndexState::WriteOnly));
    }

    #[test]
    fn drop_removes_from_registry() {
        let mut c = Container::new(InMemoryKvStore::new());
        c.declare(descriptor("by_email", false)).unwrap();
        c.drop_index("by_email");
        assert_eq!(c.state("by_email"), None);
    }
}

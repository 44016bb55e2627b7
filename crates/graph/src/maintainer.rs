//! Wires a [`GraphEdgeStore`] into the generic index-maintenance machinery
//! (`fusion_index::IndexMaintainer`).
//!
//! A graph index's on-disk shape is entirely determined by its
//! [`StorageStrategy`](crate::StorageStrategy) — every edge fans out into
//! several redundant keys, not the single value-key/primary-key pair the
//! generic [`fusion_index::IndexEntry`] model assumes. [`GraphMaintainer`]
//! still implements `IndexMaintainer` so the online builder and `Container`
//! can drive a graph index the same way they drive a scalar one; its
//! `update` bypasses the generic entry model and calls the store directly,
//! and `index_keys` returns one representative entry per edge purely for
//! introspection/debugging.

use fusion_core::{FieldValue, PrimaryKey};
use fusion_index::{IndexEntry, IndexMaintainer, IndexResult};
use fusion_kv::{KvTransaction, Subspace};

use crate::edge::Edge;
use crate::store::{GraphEdgeStore, StorageStrategy};

/// An item an index maintainer can extract graph edges from.
pub trait EdgeExtract {
    /// The edges this item contributes to the graph.
    fn edges(&self) -> Vec<Edge>;
    /// This item's primary key.
    fn primary_key(&self) -> PrimaryKey;
}

/// Maintains every redundant key layout a [`StorageStrategy`] implies for
/// the edges an item contributes.
pub struct GraphMaintainer {
    store: GraphEdgeStore,
}

impl GraphMaintainer {
    /// Build a maintainer writing edges under `subspace` with `strategy`.
    pub fn new(subspace: Subspace, strategy: StorageStrategy) -> Self {
        GraphMaintainer {
            store: GraphEdgeStore::new(subspace, strategy),
        }
    }

    /// The underlying edge store, for direct scans/traversal.
    pub fn store(&self) -> &GraphEdgeStore {
        &self.store
    }
}

impl<Item: EdgeExtract> IndexMaintainer<Item> for GraphMaintainer {
    fn index_keys(&self, item: &Item) -> Vec<IndexEntry> {
        let primary_key = item.primary_key();
        item.edges()
            .into_iter()
            .map(|e| IndexEntry {
                value_key: vec![e.source, FieldValue::String(e.label), e.target],
                primary_key: primary_key.clone(),
            })
            .collect()
    }

    fn update<Tx: KvTransaction>(
        &self,
        txn: &mut Tx,
        _subspace: &Subspace,
        _primary_key: &PrimaryKey,
        old_item: Option<&Item>,
        new_item: Option<&Item>,
    ) -> IndexResult<()> {
        if let Some(old) = old_item {
            for edge in old.edges() {
                self.store.delete_edge(txn, &edge);
            }
        }
        if let Some(new) = new_item {
            for edge in new.edges() {
                self.store.write_edge(txn, &edge, &[]);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::EdgePattern;
    use fusion_kv::InMemoryKvStore;

    struct Person {
        pk: i64,
        friends: Vec<String>,
    }

    impl EdgeExtract for Person {
        fn edges(&self) -> Vec<Edge> {
            self.friends
                .iter()
                .map(|f| Edge::new(FieldValue::Int64(self.pk), "friend", FieldValue::String(f.clone())))
                .collect()
        }

        fn primary_key(&self) -> PrimaryKey {
            PrimaryKey::single(FieldValue::Int64(self.pk))
        }
    }

    #[test]
    fn update_writes_then_clears_edges() {
        let subspace = Subspace::root().child(FieldValue::String("friends".into()));
        let maintainer = GraphMaintainer::new(subspace, StorageStrategy::TripleStore);
        let store = InMemoryKvStore::new();

        let alice = Person {
            pk: 1,
            friends: vec!["bob".into(), "carol".into()],
        };

        let mut txn = store.begin();
        maintainer.update(&mut txn, &Subspace::root(), &alice.primary_key(), None, Some(&alice)).unwrap();
        txn.commit().unwrap();

        let mut txn = store.begin();
        let results = maintainer
            .store()
            .scan(
                &mut txn,
                &EdgePattern {
                    from: Some(FieldValue::Int64(1)),
                    edge: Some("friend".into()),
                    to: None,
                },
            )
            .unwrap();
        assert_eq!(results.len(), 2);

        let mut txn = store.begin();
        maintainer.update(&mut txn, &Subspace::root(), &alice.primary_key(), Some(&alice), None).unwrap();
        txn.commit().unwrap();

        let mut txn = store.begin();
        let results = maintainer
            .store()
            .scan(
                &mut txn,
                &EdgePattern {
                    from: Some(FieldValue::Int64(1)),
                    edge: Some("friend".into()),
                    to: None,
                },
            )
            .unwrap();
        assert!(results.is_empty());
    }
}

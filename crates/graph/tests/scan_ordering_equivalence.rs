//! End-to-end scan-ordering equivalence (spec.md §8): the same edge set
//! stored under different [`StorageStrategy`] layouts must answer an
//! identical bound-pattern query with the same multiset of results,
//! regardless of which redundant ordering served the scan.

use std::collections::HashMap;

use fusion_core::FieldValue;
use fusion_graph::{Edge, EdgePattern, GraphEdgeStore, StorageStrategy};
use fusion_kv::{InMemoryKvStore, KvStore, KvTransaction, Subspace};

const NODE_COUNT: i64 = 500;
const FANOUT: i64 = 10;

fn build_edges() -> Vec<Edge> {
    // `NODE_COUNT * FANOUT` edges, every tenth of them labeled "knows" from
    // node A so the bound query has a non-trivial, known-size result set.
    let mut edges = Vec::with_capacity((NODE_COUNT * FANOUT) as usize);
    for n in 0..NODE_COUNT {
        for f in 0..FANOUT {
            let label = if f % 2 == 0 { "knows" } else { "likes" };
            edges.push(Edge::new(
                FieldValue::String(format!("node{n}")),
                label,
                FieldValue::String(format!("node{}", (n + f + 1) % NODE_COUNT)),
            ));
        }
    }
    edges
}

fn seeded(strategy: StorageStrategy, edges: &[Edge]) -> (InMemoryKvStore, GraphEdgeStore) {
    let store = InMemoryKvStore::new();
    let g = GraphEdgeStore::new(Subspace::root().child(FieldValue::String("g".into())), strategy);
    let mut txn = store.begin();
    for e in edges {
        g.write_edge(&mut txn, e, &[]);
    }
    txn.commit().unwrap();
    (store, g)
}

/// Count occurrences of each target, for multiset comparison independent of
/// scan order.
fn multiset(edges: &[Edge]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for e in edges {
        let key = format!("{:?}", e.target);
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

#[test]
fn adjacency_and_triple_store_agree_on_five_thousand_edges() {
    let edges = build_edges();
    assert_eq!(edges.len(), 5_000);

    let (store_a, ga) = seeded(StorageStrategy::Adjacency, &edges);
    let (store_t, gt) = seeded(StorageStrategy::TripleStore, &edges);
    let (store_h, gh) = seeded(StorageStrategy::Hexastore, &edges);

    let pattern = EdgePattern {
        from: Some(FieldValue::String("node0".into())),
        edge: Some("knows".into()),
        to: None,
    };

    let mut txn_a = store_a.begin();
    let a = ga.scan(&mut txn_a, &pattern).unwrap();
    let mut txn_t = store_t.begin();
    let t = gt.scan(&mut txn_t, &pattern).unwrap();
    let mut txn_h = store_h.begin();
    let h = gh.scan(&mut txn_h, &pattern).unwrap();

    assert!(!a.is_empty(), "node0 must have at least one outgoing knows edge");
    assert_eq!(multiset(&a), multiset(&t), "adjacency and triple-store layouts must agree");
    assert_eq!(multiset(&a), multiset(&h), "adjacency and hexastore layouts must agree");
}

//! End-to-end property-path depth-3 traversal (spec.md §8): `(?x, p*, D)`
//! over a chain `A --p--> B --p--> C --p--> D` must bind `?x` to every node
//! on the chain, including the depth-3 origin `A`, plus the reflexive
//! binding `?x = D` itself.

use std::collections::HashSet;

use fusion_core::FieldValue;
use fusion_graph::{evaluate, Edge, GraphEdgeStore, Pattern, PropertyPath, StorageStrategy, Term};
use fusion_kv::{InMemoryKvStore, KvStore, KvTransaction, Subspace};

fn node(s: &str) -> FieldValue {
    FieldValue::String(s.into())
}

#[test]
fn zero_or_more_path_binds_every_node_on_a_three_hop_chain() {
    let store = InMemoryKvStore::new();
    let g = GraphEdgeStore::new(Subspace::root().child(FieldValue::String("g".into())), StorageStrategy::TripleStore);

    let mut txn = store.begin();
    for (s, t) in [("A", "B"), ("B", "C"), ("C", "D")] {
        g.write_edge(&mut txn, &Edge::new(node(s), "p", node(t)), &[]);
    }
    txn.commit().unwrap();

    let pattern = Pattern::PropertyPath {
        subject: Term::Var("x".into()),
        path: PropertyPath::ZeroOrMore(Box::new(PropertyPath::Iri("p".into()))),
        object: Term::Bound(node("D")),
    };

    let mut txn = store.begin();
    let rows = evaluate(&g, &mut txn, &pattern).unwrap();

    let xs: HashSet<String> = rows
        .into_iter()
        .map(|b| match b.get("x").unwrap() {
            FieldValue::String(s) => s.clone(),
            other => panic!("expected a string node id, got {other:?}"),
        })
        .collect();

    assert_eq!(xs, HashSet::from(["A".to_string(), "B".to_string(), "C".to_string(), "D".to_string()]));
}

#[test]
fn one_or_more_path_excludes_the_reflexive_binding() {
    let store = InMemoryKvStore::new();
    let g = GraphEdgeStore::new(Subspace::root().child(FieldValue::String("g".into())), StorageStrategy::TripleStore);

    let mut txn = store.begin();
    for (s, t) in [("A", "B"), ("B", "C"), ("C", "D")] {
        g.write_edge(&mut txn, &Edge::new(node(s), "p", node(t)), &[]);
    }
    txn.commit().unwrap();

    let pattern = Pattern::PropertyPath {
        subject: Term::Var("x".into()),
        path: PropertyPath::OneOrMore(Box::new(PropertyPath::Iri("p".into()))),
        object: Term::Bound(node("D")),
    };

    let mut txn = store.begin();
    let rows = evaluate(&g, &mut txn, &pattern).unwrap();

    let xs: HashSet<String> = rows
        .into_iter()
        .map(|b| match b.get("x").unwrap() {
            FieldValue::String(s) => s.clone(),
            other => panic!("expected a string node id, got {other:?}"),
        })
        .collect();

    assert_eq!(xs, HashSet::from(["A".to_string(), "B".to_string(), "C".to_string()]));
}

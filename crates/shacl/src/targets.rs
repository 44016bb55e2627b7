//! Resolving a shape's [`Target`]s to focus nodes (spec.md §4.6 "Targets →
//! focus nodes").

use std::collections::HashSet;

use fusion_core::FieldValue;
use fusion_graph::{EdgePattern, GraphEdgeStore};
use fusion_kv::KvTransaction;

use crate::error::ShaclResult;
use crate::shapes::{NodeShape, Target};

/// The predicate used for class-membership edges.
pub const RDF_TYPE: &str = "rdf:type";

/// Resolve every target declared on `shape` to its set of focus nodes,
/// deduplicated.
pub fn focus_nodes<Tx: KvTransaction>(store: &GraphEdgeStore, txn: &mut Tx, shape: &NodeShape) -> ShaclResult<Vec<FieldValue>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for target in &shape.targets {
        for node in resolve_target(store, txn, target, &shape.iri)? {
            if seen.insert(node.clone()) {
                out.push(node);
            }
        }
    }
    Ok(out)
}

fn resolve_target<Tx: KvTransaction>(store: &GraphEdgeStore, txn: &mut Tx, target: &Target, shape_iri: &str) -> ShaclResult<Vec<FieldValue>> {
    match target {
        Target::Node(v) => Ok(vec![v.clone()]),
        Target::Class(class) => class_members(store, txn, class),
        Target::Implicit => class_members(store, txn, shape_iri),
        Target::SubjectsOf(predicate) => {
            let edges = store.scan(
                txn,
                &EdgePattern {
                    from: None,
                    edge: Some(predicate.clone()),
                    to: None,
                },
            )?;
            Ok(dedup(edges.into_iter().map(|e| e.source)))
        }
        Target::ObjectsOf(predicate) => {
            let edges = store.scan(
                txn,
                &EdgePattern {
                    from: None,
                    edge: Some(predicate.clone()),
                    to: None,
                },
            )?;
            Ok(dedup(edges.into_iter().map(|e| e.target)))
        }
    }
}

fn class_members<Tx: KvTransaction>(store: &GraphEdgeStore, txn: &mut Tx, class: &str) -> ShaclResult<Vec<FieldValue>> {
    let edges = store.scan(
        txn,
        &EdgePattern {
            from: None,
            edge: Some(RDF_TYPE.to_string()),
            to: Some(FieldValue::String(class.to_string())),
        },
    )?;
    Ok(dedup(edges.into_iter().map(|e| e.source)))
}

fn dedup(values: impl Iterator<Item = FieldValue>) -> Vec<FieldValue> {
    let mut seen = HashSet::new();
    values.filter(|v| seen.insert(v.clone())).collect()
}

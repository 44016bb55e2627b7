//! Property-path evaluation: per-input-binding traversal that preserves
//! every other variable already bound in the row it extends (spec.md §4.5
//! "Property paths").

use std::collections::HashSet;

use fusion_core::FieldValue;
use fusion_kv::KvTransaction;

use crate::edge::EdgePattern;
use crate::error::{GraphError, GraphResult};
use crate::pattern::path::PropertyPath;
use crate::pattern::{Binding, Term};
use crate::store::GraphEdgeStore;

/// Evaluate a property path between `subject` and `object` for one input
/// `binding`, returning the bindings it extends to. At least one of
/// `subject`/`object` must already resolve to a value in `binding`; the
/// unbound side (if any) receives the traversal's results.
pub fn eval_property_path<Tx: KvTransaction>(
    store: &GraphEdgeStore,
    txn: &mut Tx,
    subject: &Term,
    path: &PropertyPath,
    object: &Term,
    binding: &Binding,
) -> GraphResult<Vec<Binding>> {
    let subject_value = resolve(subject, binding);
    let object_value = resolve(object, binding);

    let (origin, target_term, forward_path) = match (&subject_value, &object_value) {
        (Some(s), _) => (s.clone(), object, path.normalize()),
        (None, Some(o)) => (o.clone(), subject, PropertyPath::Inverse(Box::new(path.clone())).normalize()),
        (None, None) => return Err(GraphError::UnboundPath),
    };

    let reached = eval_path_from(store, txn, &origin, &forward_path)?;
    Ok(reached.into_iter().filter_map(|value| bind_result(binding, target_term, value)).collect())
}

fn resolve(term: &Term, binding: &Binding) -> Option<FieldValue> {
    match term {
        Term::Bound(v) => Some(v.clone()),
        Term::Var(name) => binding.get(name).cloned(),
    }
}

fn bind_result(binding: &Binding, term: &Term, value: FieldValue) -> Option<Binding> {
    let mut out = binding.clone();
    match term {
        Term::Bound(v) => v.equals(&value).then_some(out),
        Term::Var(name) => match out.get(name) {
            Some(existing) => existing.equals(&value).then_some(out),
            None => {
                out.insert(name.clone(), value);
                Some(out)
            }
        },
    }
}

/// The set of nodes reachable from `start` by `path`, assumed already
/// normalized (no `Inverse` wrapping anything but an `Iri`/`Empty`).
fn eval_path_from<Tx: KvTransaction>(store: &GraphEdgeStore, txn: &mut Tx, start: &FieldValue, path: &PropertyPath) -> GraphResult<Vec<FieldValue>> {
    match path {
        PropertyPath::Empty => Ok(vec![start.clone()]),
        PropertyPath::Iri(label) => step(store, txn, start, label, false),
        PropertyPath::Inverse(inner) => match inner.as_ref() {
            PropertyPath::Iri(label) => step(store, txn, start, label, true),
            PropertyPath::Empty => Ok(vec![start.clone()]),
            other => eval_path_from(store, txn, start, other),
        },
        PropertyPath::Sequence(a, b) => {
            let mut out = Vec::new();
            for mid in eval_path_from(store, txn, start, a)? {
                out.extend(eval_path_from(store, txn, &mid, b)?);
            }
            Ok(out)
        }
        PropertyPath::Alternative(a, b) => {
            let mut out = eval_path_from(store, txn, start, a)?;
            out.extend(eval_path_from(store, txn, start, b)?);
            Ok(out)
        }
        PropertyPath::ZeroOrMore(inner) => bfs_closure(store, txn, start, inner, true),
        PropertyPath::OneOrMore(inner) => bfs_closure(store, txn, start, inner, false),
        PropertyPath::ZeroOrOne(inner) => {
            let mut out = vec![start.clone()];
            out.extend(eval_path_from(store, txn, start, inner)?);
            Ok(out)
        }
    }
}

fn step<Tx: KvTransaction>(store: &GraphEdgeStore, txn: &mut Tx, start: &FieldValue, label: &str, inverse: bool) -> GraphResult<Vec<FieldValue>> {
    let pattern = if inverse {
        EdgePattern {
            from: None,
            edge: Some(label.to_string()),
            to: Some(start.clone()),
        }
    } else {
        EdgePattern {
            from: Some(start.clone()),
            edge: Some(label.to_string()),
            to: None,
        }
    };
    let edges = store.scan(txn, &pattern)?;
    Ok(edges.into_iter().map(|e| if inverse { e.source } else { e.target }).collect())
}

/// Transitive (reflexive, when `include_start`) closure of `inner` from
/// `start`, by breadth-first expansion.
fn bfs_closure<Tx: KvTransaction>(
    store: &GraphEdgeStore,
    txn: &mut Tx,
    start: &FieldValue,
    inner: &PropertyPath,
    include_start: bool,
) -> GraphResult<Vec<FieldValue>> {
    let mut visited: HashSet<FieldValue> = HashSet::new();
    let mut result = Vec::new();
    if include_start {
        visited.insert(start.clone());
        result.push(start.clone());
    }
    let mut frontier = vec![start.clone()];
    while !frontier.is_empty() {
        let mut next_frontier = Vec::new();
        for node in &frontier {
            for reached in eval_path_from(store, txn, node, inner)? {
                if visited.insert(reached.clone()) {
                    result.push(reached.clone());
                    next_frontier.push(reached);
                }
            }
        }
        frontier = next_frontier;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;
    use crate::store::StorageStrategy;
    use fusion_kv::{InMemoryKvStore, Subspace};
    use std::collections::HashMap;

    fn seeded() -> (InMemoryKvStore, GraphEdgeStore) {
        let store = InMemoryKvStore::new();
        let g = GraphEdgeStore::new(Subspace::root().child(FieldValue::String("g".into())), StorageStrategy::TripleStore);
        let mut txn = store.begin();
        // A -> B -> C -> D via predicate "p"
        for (s, t) in [("A", "B"), ("B", "C"), ("C", "D")] {
            g.write_edge(
                &mut txn,
                &Edge::new(FieldValue::String(s.into()), "p", FieldValue::String(t.into())),
                &[],
            );
        }
        txn.commit().unwrap();
        (store, g)
    }

    #[test]
    fn zero_or_more_from_bound_subject_reaches_every_descendant() {
        let (store, g) = seeded();
        let mut txn = store.begin();
        let rows = eval_property_path(
            &g,
            &mut txn,
            &Term::Bound(FieldValue::String("A".into())),
            &PropertyPath::ZeroOrMore(Box::new(PropertyPath::Iri("p".into()))),
            &Term::Var("x".into()),
            &HashMap::new(),
        )
        .unwrap();
        let mut xs: Vec<String> = rows
            .into_iter()
            .map(|b| match b.get("x").unwrap() {
                FieldValue::String(s) => s.clone(),
                _ => unreachable!(),
            })
            .collect();
        xs.sort();
        assert_eq!(xs, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn zero_or_more_from_bound_object_reaches_every_ancestor() {
        let (store, g) = seeded();
        let mut txn = store.begin();
        let rows = eval_property_path(
            &g,
            &mut txn,
            &Term::Var("x".into()),
            &PropertyPath::ZeroOrMore(Box::new(PropertyPath::Iri("p".into()))),
            &Term::Bound(FieldValue::String("D".into())),
            &HashMap::new(),
        )
        .unwrap();
        let mut xs: Vec<String> = rows
            .into_iter()
            .map(|b| match b.get("x").unwrap() {
                FieldValue::String(s) => s.clone(),
                _ => unreachable!(),
            })
            .collect();
        xs.sort();
        assert_eq!(xs, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn one_or_more_excludes_the_start_unless_cyclic() {
        let (store, g) = seeded();
        let mut txn = store.begin();
        let rows = eval_property_path(
            &g,
            &mut txn,
            &Term::Bound(FieldValue::String("A".into())),
            &PropertyPath::OneOrMore(Box::new(PropertyPath::Iri("p".into()))),
            &Term::Var("x".into()),
            &HashMap::new(),
        )
        .unwrap();
        let mut xs: Vec<String> = rows
            .into_iter()
            .map(|b| match b.get("x").unwrap() {
                FieldValue::String(s) => s.clone(),
                _ => unreachable!(),
            })
            .collect();
        xs.sort();
        assert_eq!(xs, vec!["B", "C", "D"]);
    }

    #[test]
    fn origin_binding_is_preserved_alongside_path_result() {
        let (store, g) = seeded();
        let mut txn = store.begin();
        let mut input = HashMap::new();
        input.insert("tag".to_string(), FieldValue::String("seed".into()));
        let rows = eval_property_path(
            &g,
            &mut txn,
            &Term::Bound(FieldValue::String("A".into())),
            &PropertyPath::OneOrMore(Box::new(PropertyPath::Iri("p".into()))),
            &Term::Var("x".into()),
            &input,
        )
        .unwrap();
        assert!(rows.iter().all(|b| b.get("tag").unwrap().equals(&FieldValue::String("seed".into()))));
    }
}

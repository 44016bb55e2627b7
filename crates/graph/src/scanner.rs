//! Binds a triple pattern containing variables against a live
//! [`GraphEdgeStore`] scan, producing one [`Binding`] extension per matching
//! edge.

use std::collections::HashMap;

use fusion_core::FieldValue;
use fusion_kv::KvTransaction;

use crate::edge::EdgePattern;
use crate::error::GraphResult;
use crate::pattern::{Binding, Term};
use crate::store::GraphEdgeStore;

/// Resolve `term` against `binding`, returning its bound value if the term
/// is already bound (a constant, or a variable present in `binding`).
pub fn resolve(term: &Term, binding: &Binding) -> Option<FieldValue> {
    match term {
        Term::Bound(v) => Some(v.clone()),
        Term::Var(name) => binding.get(name).cloned(),
    }
}

/// Build the storage-level scan pattern for `(subject, predicate, object)`
/// under `binding`, resolving any already-bound variables.
pub fn scan_pattern(subject: &Term, predicate: &Term, object: &Term, binding: &Binding) -> EdgePattern {
    let edge_label = match predicate {
        Term::Bound(FieldValue::String(s)) => Some(s.clone()),
        Term::Var(name) => match binding.get(name) {
            Some(FieldValue::String(s)) => Some(s.clone()),
            _ => None,
        },
        _ => None,
    };
    EdgePattern {
        from: resolve(subject, binding),
        edge: edge_label,
        to: resolve(object, binding),
    }
}

/// Extend `binding` with the variable bindings an edge implies for
/// `(subject, predicate, object)`, failing if a variable is already bound
/// to a conflicting value (a self-join like `?x knows ?x`).
pub fn extend_binding(
    binding: &Binding,
    subject: &Term,
    predicate: &Term,
    object: &Term,
    source: &FieldValue,
    label: &str,
    target: &FieldValue,
) -> Option<Binding> {
    let mut out = binding.clone();
    bind_term(&mut out, subject, source)?;
    bind_term(&mut out, predicate, &FieldValue::String(label.to_string()))?;
    bind_term(&mut out, object, target)?;
    Some(out)
}

fn bind_term(binding: &mut Binding, term: &Term, value: &FieldValue) -> Option<()> {
    match term {
        Term::Bound(v) => v.equals(value).then_some(()),
        Term::Var(name) => match binding.get(name) {
            Some(existing) => existing.equals(value).then_some(()),
            None => {
                binding.insert(name.clone(), value.clone());
                Some(())
            }
        },
    }
}

/// Scan for edges matching `(subject, predicate, object)` under `binding`,
/// returning the set of bindings each match extends to.
pub fn scan_bindings<Tx: KvTransaction>(
    store: &GraphEdgeStore,
    txn: &mut Tx,
    subject: &Term,
    predicate: &Term,
    object: &Term,
    binding: &Binding,
) -> GraphResult<Vec<Binding>> {
    let pattern = scan_pattern(subject, predicate, object, binding);
    let edges = store.scan(txn, &pattern)?;
    Ok(edges
        .into_iter()
        .filter_map(|edge| extend_binding(binding, subject, predicate, object, &edge.source, &edge.label, &edge.target))
        .collect())
}

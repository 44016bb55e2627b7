//! A small SPARQL-style pattern algebra evaluated over a
//! [`GraphEdgeStore`](crate::GraphEdgeStore): basic (triple) patterns,
//! property paths, filters, and the set operators UNION / MINUS / OPTIONAL
//! (spec.md §4.5).

pub mod eval;
pub mod path;

use std::collections::HashMap;

use fusion_core::field_value::CompareResult;
use fusion_core::FieldValue;
use fusion_kv::KvTransaction;

use crate::error::GraphResult;
use crate::scanner::scan_bindings;
use crate::store::GraphEdgeStore;

pub use path::PropertyPath;

/// A variable or a bound value occupying one position of a triple pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// An unbound variable, identified by name (without the leading `?`).
    Var(String),
    /// A constant value.
    Bound(FieldValue),
}

/// A set of variable bindings produced by evaluating a pattern. Variable
/// names omit the leading `?`.
pub type Binding = HashMap<String, FieldValue>;

/// One `(subject, predicate, object)` triple pattern, any position of
/// which may be a variable.
#[derive(Debug, Clone)]
pub struct TriplePattern {
    /// Subject position.
    pub subject: Term,
    /// Predicate position.
    pub predicate: Term,
    /// Object position.
    pub object: Term,
}

/// A boolean expression evaluated per-binding for `FILTER`.
#[derive(Debug, Clone)]
pub enum FilterExpr {
    /// True if the named variable is bound.
    Bound(String),
    /// Equality comparison.
    Equal(Term, Term),
    /// Inequality comparison.
    NotEqual(Term, Term),
    /// Less-than comparison.
    Less(Term, Term),
    /// Greater-than comparison.
    Greater(Term, Term),
    /// Logical conjunction.
    And(Box<FilterExpr>, Box<FilterExpr>),
    /// Logical disjunction.
    Or(Box<FilterExpr>, Box<FilterExpr>),
}

/// The pattern algebra. Every evaluation returns a multiset (`Vec`) of
/// [`Binding`]s — duplicate solutions from a graph's redundant matches are
/// never deduplicated implicitly (spec.md §4.5 "UNION = multiset union").
#[derive(Debug, Clone)]
pub enum Pattern {
    /// A conjunction of triple patterns, joined left to right.
    Basic(Vec<TriplePattern>),
    /// A property-path traversal between two terms.
    PropertyPath {
        /// Path origin term.
        subject: Term,
        /// The path expression.
        path: PropertyPath,
        /// Path destination term.
        object: Term,
    },
    /// Keep only rows for which `expr` evaluates to `true`. Any row where
    /// `expr` touches an unbound variable or an incomparable pair is
    /// dropped, never treated as an error.
    Filter(FilterExpr, Box<Pattern>),
    /// Multiset union of both sides' solutions.
    Union(Box<Pattern>, Box<Pattern>),
    /// Left solutions with no compatible, variable-sharing match on the
    /// right removed (not a plain set difference).
    Minus(Box<Pattern>, Box<Pattern>),
    /// Left-join: every left solution survives, extended with a compatible
    /// right solution when one exists.
    Optional(Box<Pattern>, Box<Pattern>),
}

/// Evaluate `pattern` against `store` starting from the empty binding.
pub fn evaluate<Tx: KvTransaction>(store: &GraphEdgeStore, txn: &mut Tx, pattern: &Pattern) -> GraphResult<Vec<Binding>> {
    eval_with(store, txn, pattern, &[HashMap::new()])
}

fn eval_with<Tx: KvTransaction>(
    store: &GraphEdgeStore,
    txn: &mut Tx,
    pattern: &Pattern,
    inputs: &[Binding],
) -> GraphResult<Vec<Binding>> {
    match pattern {
        Pattern::Basic(triples) => eval_basic(store, txn, triples, inputs),
        Pattern::PropertyPath { subject, path, object } => {
            let mut out = Vec::new();
            for input in inputs {
                out.extend(eval::eval_property_path(store, txn, subject, path, object, input)?);
            }
            Ok(out)
        }
        Pattern::Filter(expr, inner) => {
            let rows = eval_with(store, txn, inner, inputs)?;
            Ok(rows.into_iter().filter(|row| eval_filter(expr, row) == Some(true)).collect())
        }
        Pattern::Union(left, right) => {
            let mut out = eval_with(store, txn, left, inputs)?;
            out.extend(eval_with(store, txn, right, inputs)?);
            Ok(out)
        }
        Pattern::Minus(left, right) => {
            let left_rows = eval_with(store, txn, left, inputs)?;
            let right_rows = eval_with(store, txn, right, inputs)?;
            Ok(left_rows
                .into_iter()
                .filter(|l| !right_rows.iter().any(|r| shares_and_compatible(l, r)))
                .collect())
        }
        Pattern::Optional(left, right) => {
            let left_rows = eval_with(store, txn, left, inputs)?;
            let mut out = Vec::new();
            for l in left_rows {
                let right_rows = eval_with(store, txn, right, std::slice::from_ref(&l))?;
                let matches: Vec<_> = right_rows.into_iter().filter(|r| compatible(&l, r)).collect();
                if matches.is_empty() {
                    out.push(l);
                } else {
                    for r in matches {
                        out.push(merge(&l, &r));
                    }
                }
            }
            Ok(out)
        }
    }
}

fn eval_basic<Tx: KvTransaction>(
    store: &GraphEdgeStore,
    txn: &mut Tx,
    triples: &[TriplePattern],
    inputs: &[Binding],
) -> GraphResult<Vec<Binding>> {
    let mut frontier = inputs.to_vec();
    for triple in triples {
        let mut next = Vec::new();
        for binding in &frontier {
            next.extend(scan_bindings(store, txn, &triple.subject, &triple.predicate, &triple.object, binding)?);
        }
        frontier = next;
        if frontier.is_empty() {
            break;
        }
    }
    Ok(frontier)
}

/// Two bindings are compatible if every variable they share maps to equal
/// values.
fn compatible(a: &Binding, b: &Binding) -> bool {
    a.iter().all(|(k, v)| match b.get(k) {
        Some(other) => v.equals(other),
        None => true,
    })
}

fn shares_and_compatible(a: &Binding, b: &Binding) -> bool {
    let shares = a.keys().any(|k| b.contains_key(k));
    shares && compatible(a, b)
}

fn merge(a: &Binding, b: &Binding) -> Binding {
    let mut out = a.clone();
    for (k, v) in b {
        out.entry(k.clone()).or_insert_with(|| v.clone());
    }
    out
}

fn resolve(term: &Term, binding: &Binding) -> Option<FieldValue> {
    match term {
        Term::Bound(v) => Some(v.clone()),
        Term::Var(name) => binding.get(name).cloned(),
    }
}

fn eval_filter(expr: &FilterExpr, binding: &Binding) -> Option<bool> {
    match expr {
        FilterExpr::Bound(name) => Some(binding.contains_key(name)),
        FilterExpr::Equal(a, b) => cmp(a, b, binding).map(|c| c.is_equal()),
        FilterExpr::NotEqual(a, b) => cmp(a, b, binding).map(|c| !c.is_equal()),
        FilterExpr::Less(a, b) => cmp(a, b, binding).map(|c| c == CompareResult::Less),
        FilterExpr::Greater(a, b) => cmp(a, b, binding).map(|c| c == CompareResult::Greater),
        FilterExpr::And(a, b) => match (eval_filter(a, binding), eval_filter(b, binding)) {
            (Some(a), Some(b)) => Some(a && b),
            _ => None,
        },
        FilterExpr::Or(a, b) => match (eval_filter(a, binding), eval_filter(b, binding)) {
            (Some(a), Some(b)) => Some(a || b),
            (Some(true), None) | (None, Some(true)) => Some(true),
            _ => None,
        },
    }
}

fn cmp(a: &Term, b: &Term, binding: &Binding) -> Option<CompareResult> {
    let a = resolve(a, binding)?;
    let b = resolve(b, binding)?;
    match a.compare(&b) {
        CompareResult::Incomparable => None,
        other => Some(other),
    }
}

//! The core validation engine (spec.md §4.6 "Per focus node, per shape",
//! "Recursive composition").

use std::collections::{HashMap, HashSet};

use fusion_core::field_value::CompareResult;
use fusion_core::FieldValue;
use fusion_graph::pattern::eval::eval_property_path;
use fusion_graph::{EdgePattern, GraphEdgeStore, PropertyPath, Term};
use fusion_kv::KvTransaction;
use regex::RegexBuilder;

use crate::error::{ShaclError, ShaclResult};
use crate::report::{ConstraintComponent, Report, Severity, Violation};
use crate::shapes::{Constraint, NodeKind, Shape, ShapesGraph};
use crate::targets::{focus_nodes, RDF_TYPE};

/// Validate every declared shape's targets against the data graph in
/// `store`, returning a complete [`Report`].
pub fn validate<Tx: KvTransaction>(store: &GraphEdgeStore, txn: &mut Tx, shapes: &ShapesGraph) -> ShaclResult<Report> {
    let mut violations = Vec::new();
    for shape in shapes.shapes() {
        for focus in focus_nodes(store, txn, shape)? {
            violations.extend(validate_value(store, txn, &focus, &shape.shape, Some(&shape.iri))?);
        }
    }
    Ok(Report::new(violations))
}

/// Validate one node (a target's focus node, or a value node reached
/// through recursive composition) against `shape`.
fn validate_value<Tx: KvTransaction>(
    store: &GraphEdgeStore,
    txn: &mut Tx,
    focus: &FieldValue,
    shape: &Shape,
    source_shape: Option<&str>,
) -> ShaclResult<Vec<Violation>> {
    let mut violations = evaluate_constraints(store, txn, std::slice::from_ref(focus), &shape.constraints, focus, None, source_shape)?;

    if shape.closed {
        violations.extend(check_closed(store, txn, focus, shape, source_shape)?);
    }

    for ps in &shape.property_shapes {
        let values = path_values(store, txn, focus, &ps.path)?;
        violations.extend(evaluate_constraints(store, txn, &values, &ps.constraints, focus, Some(&ps.path), source_shape)?);
    }

    Ok(violations)
}

fn path_values<Tx: KvTransaction>(store: &GraphEdgeStore, txn: &mut Tx, focus: &FieldValue, path: &PropertyPath) -> ShaclResult<Vec<FieldValue>> {
    let binding = HashMap::new();
    let rows = eval_property_path(store, txn, &Term::Bound(focus.clone()), path, &Term::Var("__value".into()), &binding)?;
    Ok(rows.into_iter().filter_map(|b| b.get("__value").cloned()).collect())
}

fn check_closed<Tx: KvTransaction>(
    store: &GraphEdgeStore,
    txn: &mut Tx,
    focus: &FieldValue,
    shape: &Shape,
    source_shape: Option<&str>,
) -> ShaclResult<Vec<Violation>> {
    let mut allowed: HashSet<String> = shape.ignored_properties.iter().cloned().collect();
    for ps in &shape.property_shapes {
        if let PropertyPath::Iri(label) = &ps.path {
            allowed.insert(label.clone());
        }
    }

    let edges = store.scan(
        txn,
        &EdgePattern {
            from: Some(focus.clone()),
            edge: None,
            to: None,
        },
    )?;

    let mut seen = HashSet::new();
    let mut violations = Vec::new();
    for edge in edges {
        if !allowed.contains(&edge.label) && seen.insert(edge.label.clone()) {
            violations.push(Violation {
                focus_node: focus.clone(),
                result_path: Some(PropertyPath::Iri(edge.label.clone())),
                value: None,
                source_constraint_component: ConstraintComponent::Closed,
                source_shape: source_shape.map(str::to_string),
                message: vec![format!("predicate {} is not allowed by this closed shape", edge.label)],
                severity: Severity::Violation,
            });
        }
    }
    Ok(violations)
}

fn evaluate_constraints<Tx: KvTransaction>(
    store: &GraphEdgeStore,
    txn: &mut Tx,
    values: &[FieldValue],
    constraints: &[Constraint],
    focus: &FieldValue,
    path: Option<&PropertyPath>,
    source_shape: Option<&str>,
) -> ShaclResult<Vec<Violation>> {
    let mut violations = Vec::new();
    for constraint in constraints {
        violations.extend(evaluate_one(store, txn, values, constraint, focus, path, source_shape)?);
    }
    Ok(violations)
}

fn violation(
    focus: &FieldValue,
    path: Option<&PropertyPath>,
    value: Option<FieldValue>,
    component: ConstraintComponent,
    source_shape: Option<&str>,
    message: String,
) -> Violation {
    Violation {
        focus_node: focus.clone(),
        result_path: path.cloned(),
        value,
        source_constraint_component: component,
        source_shape: source_shape.map(str::to_string),
        message: vec![message],
        severity: Severity::Violation,
    }
}

fn evaluate_one<Tx: KvTransaction>(
    store: &GraphEdgeStore,
    txn: &mut Tx,
    values: &[FieldValue],
    constraint: &Constraint,
    focus: &FieldValue,
    path: Option<&PropertyPath>,
    source_shape: Option<&str>,
) -> ShaclResult<Vec<Violation>> {
    use ConstraintComponent as C;

    let mut out = Vec::new();
    match constraint {
        Constraint::Class(class) => {
            for v in values {
                if !is_instance_of(store, txn, v, class)? {
                    out.push(violation(focus, path, Some(v.clone()), C::Class, source_shape, format!("expected rdf:type {class}")));
                }
            }
        }
        Constraint::Datatype(expected) => {
            for v in values {
                if datatype_tag(v) != *expected {
                    out.push(violation(focus, path, Some(v.clone()), C::Datatype, source_shape, format!("expected datatype {expected}")));
                }
            }
        }
        Constraint::NodeKind(expected) => {
            for v in values {
                if node_kind_of(v) != *expected {
                    out.push(violation(focus, path, Some(v.clone()), C::NodeKind, source_shape, format!("expected node kind {expected:?}")));
                }
            }
        }
        Constraint::MinCount(n) => {
            if values.len() < *n {
                out.push(violation(focus, path, None, C::MinCount, source_shape, format!("expected at least {n} values, found {}", values.len())));
            }
        }
        Constraint::MaxCount(n) => {
            if values.len() > *n {
                out.push(violation(focus, path, None, C::MaxCount, source_shape, format!("expected at most {n} values, found {}", values.len())));
            }
        }
        Constraint::MinInclusive(bound) => check_bound(values, bound, path, focus, source_shape, &mut out, C::MinInclusive, |c| matches!(c, CompareResult::Greater | CompareResult::Equal)),
        Constraint::MaxInclusive(bound) => check_bound(values, bound, path, focus, source_shape, &mut out, C::MaxInclusive, |c| matches!(c, CompareResult::Less | CompareResult::Equal)),
        Constraint::MinExclusive(bound) => check_bound(values, bound, path, focus, source_shape, &mut out, C::MinExclusive, |c| c == CompareResult::Greater),
        Constraint::MaxExclusive(bound) => check_bound(values, bound, path, focus, source_shape, &mut out, C::MaxExclusive, |c| c == CompareResult::Less),
        Constraint::MinLength(n) => {
            for v in values {
                let fails = match string_len(v) {
                    Some(len) => len < *n,
                    None => true,
                };
                if fails {
                    out.push(violation(focus, path, Some(v.clone()), C::MinLength, source_shape, format!("expected length >= {n}")));
                }
            }
        }
        Constraint::MaxLength(n) => {
            for v in values {
                let fails = match string_len(v) {
                    Some(len) => len > *n,
                    None => true,
                };
                if fails {
                    out.push(violation(focus, path, Some(v.clone()), C::MaxLength, source_shape, format!("expected length <= {n}")));
                }
            }
        }
        Constraint::Pattern { regex, flags } => {
            let re = build_regex(regex, flags)?;
            for v in values {
                if let FieldValue::String(s) = v {
                    if !re.is_match(lexical(s)) {
                        out.push(violation(focus, path, Some(v.clone()), C::Pattern, source_shape, format!("does not match /{regex}/{flags}")));
                    }
                } else {
                    out.push(violation(focus, path, Some(v.clone()), C::Pattern, source_shape, "pattern requires a string value".into()));
                }
            }
        }
        Constraint::LanguageIn(allowed) => {
            for v in values {
                if let FieldValue::String(s) = v {
                    match language_tag(s) {
                        Some(tag) if allowed.iter().any(|a| a == tag) => {}
                        _ => out.push(violation(focus, path, Some(v.clone()), C::LanguageIn, source_shape, format!("language tag not in {allowed:?}"))),
                    }
                }
            }
        }
        Constraint::UniqueLang(true) => {
            let mut seen = HashSet::new();
            for v in values {
                if let FieldValue::String(s) = v {
                    if let Some(tag) = language_tag(s) {
                        if !seen.insert(tag.to_string()) {
                            out.push(violation(focus, path, Some(v.clone()), C::UniqueLang, source_shape, format!("duplicate language tag {tag}")));
                        }
                    }
                }
            }
        }
        Constraint::UniqueLang(false) => {}
        Constraint::Equals(other_path) => {
            let other = path_values(store, txn, focus, other_path)?;
            if !same_set(values, &other) {
                out.push(violation(focus, path, None, C::Equals, source_shape, "value sets are not equal".into()));
            }
        }
        Constraint::Disjoint(other_path) => {
            let other = path_values(store, txn, focus, other_path)?;
            for v in values {
                if other.iter().any(|o| o.equals(v)) {
                    out.push(violation(focus, path, Some(v.clone()), C::Disjoint, source_shape, "value also appears on the disjoint path".into()));
                }
            }
        }
        Constraint::LessThan(other_path) => {
            let other = path_values(store, txn, focus, other_path)?;
            for v in values {
                if !other.iter().all(|o| v.compare(o) == CompareResult::Less) {
                    out.push(violation(focus, path, Some(v.clone()), C::LessThan, source_shape, "value is not less than every comparison value".into()));
                }
            }
        }
        Constraint::LessThanOrEquals(other_path) => {
            let other = path_values(store, txn, focus, other_path)?;
            for v in values {
                if !other.iter().all(|o| matches!(v.compare(o), CompareResult::Less | CompareResult::Equal)) {
                    out.push(violation(focus, path, Some(v.clone()), C::LessThanOrEquals, source_shape, "value is not <= every comparison value".into()));
                }
            }
        }
        Constraint::Not(inner) => {
            for v in values {
                if validate_value(store, txn, v, inner, source_shape)?.is_empty() {
                    out.push(violation(focus, path, Some(v.clone()), C::Not, source_shape, "value conforms to the negated shape".into()));
                }
            }
        }
        Constraint::And(shapes) => {
            for v in values {
                let mut inner_violations = Vec::new();
                for s in shapes {
                    inner_violations.extend(validate_value(store, txn, v, s, source_shape)?);
                }
                if !inner_violations.is_empty() {
                    out.push(violation(focus, path, Some(v.clone()), C::And, source_shape, "value does not conform to every shape".into()));
                }
            }
        }
        Constraint::Or(shapes) => {
            for v in values {
                let mut any_conforms = false;
                for s in shapes {
                    if validate_value(store, txn, v, s, source_shape)?.is_empty() {
                        any_conforms = true;
                        break;
                    }
                }
                if !any_conforms {
                    out.push(violation(focus, path, Some(v.clone()), C::Or, source_shape, "value does not conform to any shape".into()));
                }
            }
        }
        Constraint::Xone(shapes) => {
            for v in values {
                let mut conforming = 0;
                for s in shapes {
                    if validate_value(store, txn, v, s, source_shape)?.is_empty() {
                        conforming += 1;
                    }
                }
                if conforming != 1 {
                    out.push(violation(focus, path, Some(v.clone()), C::Xone, source_shape, format!("value conforms to {conforming} shapes, expected exactly 1")));
                }
            }
        }
        Constraint::Node(inner) => {
            for v in values {
                if !validate_value(store, txn, v, inner, source_shape)?.is_empty() {
                    out.push(violation(focus, path, Some(v.clone()), C::Node, source_shape, "value does not conform to the node shape".into()));
                }
            }
        }
        Constraint::QualifiedValueShape { shape, min, max } => {
            let mut conforming = 0;
            for v in values {
                if validate_value(store, txn, v, shape, source_shape)?.is_empty() {
                    conforming += 1;
                }
            }
            if min.is_some_and(|m| conforming < m) || max.is_some_and(|m| conforming > m) {
                out.push(violation(focus, path, None, C::QualifiedValueShape, source_shape, format!("{conforming} values conform, expected [{min:?}, {max:?}]")));
            }
        }
        Constraint::HasValue(expected) => {
            if !values.iter().any(|v| v.equals(expected)) {
                out.push(violation(focus, path, Some(expected.clone()), C::HasValue, source_shape, "required value is missing".into()));
            }
        }
        Constraint::In(set) => {
            for v in values {
                if !set.iter().any(|s| s.equals(v)) {
                    out.push(violation(focus, path, Some(v.clone()), C::In, source_shape, "value is not in the allowed set".into()));
                }
            }
        }
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn check_bound(
    values: &[FieldValue],
    bound: &FieldValue,
    path: Option<&PropertyPath>,
    focus: &FieldValue,
    source_shape: Option<&str>,
    out: &mut Vec<Violation>,
    component: ConstraintComponent,
    accept: impl Fn(CompareResult) -> bool,
) {
    for v in values {
        if !accept(v.compare(bound)) {
            out.push(violation(focus, path, Some(v.clone()), component.clone(), source_shape, format!("value does not satisfy bound {bound:?}")));
        }
    }
}

fn is_instance_of<Tx: KvTransaction>(store: &GraphEdgeStore, txn: &mut Tx, value: &FieldValue, class: &str) -> ShaclResult<bool> {
    let edges = store.scan(
        txn,
        &EdgePattern {
            from: Some(value.clone()),
            edge: Some(RDF_TYPE.to_string()),
            to: Some(FieldValue::String(class.to_string())),
        },
    )?;
    Ok(!edges.is_empty())
}

fn datatype_tag(value: &FieldValue) -> &'static str {
    match value {
        FieldValue::Null => "xsd:null",
        FieldValue::Int64(_) => "xsd:integer",
        FieldValue::Double(_) => "xsd:double",
        FieldValue::Bool(_) => "xsd:boolean",
        FieldValue::String(_) => "xsd:string",
        FieldValue::Bytes(_) => "xsd:base64Binary",
        FieldValue::Uuid(_) => "xsd:string",
        FieldValue::Date(_) => "xsd:dateTime",
        FieldValue::Array(_) => "xsd:array",
    }
}

fn node_kind_of(value: &FieldValue) -> NodeKind {
    match value {
        FieldValue::String(_) => NodeKind::Iri,
        _ => NodeKind::Literal,
    }
}

fn string_len(value: &FieldValue) -> Option<usize> {
    match value {
        FieldValue::String(s) => Some(lexical(s).chars().count()),
        _ => None,
    }
}

/// The lexical form of a string value, stripping a `@lang` suffix if
/// present (this engine's convention for representing RDF literal
/// language tags — spec.md names `languageIn`/`uniqueLang` but has no
/// dedicated literal-with-language type).
fn lexical(s: &str) -> &str {
    s.split('@').next().unwrap_or(s)
}

fn language_tag(s: &str) -> Option<&str> {
    s.split_once('@').map(|(_, tag)| tag)
}

fn build_regex(pattern: &str, flags: &str) -> ShaclResult<regex::Regex> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'x' => {
                builder.ignore_whitespace(true);
            }
            _ => {}
        }
    }
    builder.build().map_err(|source| ShaclError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn same_set(a: &[FieldValue], b: &[FieldValue]) -> bool {
    a.len() == b.len() && a.iter().all(|v| b.iter().any(|o| o.equals(v))) && b.iter().all(|v| a.iter().any(|o| o.equals(v)))
}

//! Edge identity and scan-pattern types.

use fusion_core::FieldValue;

/// A directed, labeled edge: `source --label--> target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// The edge's source node.
    pub source: FieldValue,
    /// The edge's label (predicate).
    pub label: String,
    /// The edge's target node.
    pub target: FieldValue,
}

impl Edge {
    /// Build an edge.
    pub fn new(source: FieldValue, label: impl Into<String>, target: FieldValue) -> Self {
        Edge {
            source,
            label: label.into(),
            target,
        }
    }
}

/// A partially- or fully-bound query over edges: `(from?, edge?, to?)`
/// (spec.md §4.4 "Scan selection"). At least one field must be bound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgePattern {
    /// Source node, if bound.
    pub from: Option<FieldValue>,
    /// Edge label, if bound.
    pub edge: Option<String>,
    /// Target node, if bound.
    pub to: Option<FieldValue>,
}

impl EdgePattern {
    /// True if none of `from`/`edge`/`to` are bound.
    pub fn is_unbound(&self) -> bool {
        self.from.is_none() && self.edge.is_none() && self.to.is_none()
    }
}

//! Validation results (spec.md §4.6 "Result").

use fusion_core::FieldValue;
use fusion_graph::PropertyPath;

/// Severity a shape's violations are reported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// A conformance-breaking violation.
    Violation,
    /// A non-fatal warning.
    Warning,
    /// Informational only.
    Info,
}

/// Which W3C SHACL constraint component produced a violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintComponent {
    Class,
    Datatype,
    NodeKind,
    MinCount,
    MaxCount,
    MinInclusive,
    MaxInclusive,
    MinExclusive,
    MaxExclusive,
    MinLength,
    MaxLength,
    Pattern,
    LanguageIn,
    UniqueLang,
    Equals,
    Disjoint,
    LessThan,
    LessThanOrEquals,
    Not,
    And,
    Or,
    Xone,
    Node,
    QualifiedValueShape,
    Closed,
    HasValue,
    In,
}

/// One constraint violation.
#[derive(Debug, Clone)]
pub struct Violation {
    /// The node the violated shape was evaluated against.
    pub focus_node: FieldValue,
    /// The property path the violation occurred under, if the violation
    /// came from a property shape rather than a node-level constraint.
    pub result_path: Option<PropertyPath>,
    /// The offending value, when the constraint is value-scoped.
    pub value: Option<FieldValue>,
    /// Which constraint component raised this violation.
    pub source_constraint_component: ConstraintComponent,
    /// The shape IRI that declared the violated constraint, if any.
    pub source_shape: Option<String>,
    /// Human-readable messages.
    pub message: Vec<String>,
    /// Severity to report this violation at.
    pub severity: Severity,
}

/// The outcome of validating a shapes graph against a data graph.
#[derive(Debug, Clone)]
pub struct Report {
    /// True if no violation at [`Severity::Violation`] survived filtering.
    pub conforms: bool,
    /// Every violation produced, across all severities.
    pub violations: Vec<Violation>,
}

impl Report {
    /// Build a report from raw violations, computing `conforms` as "no
    /// violation at [`Severity::Violation`] severity" (spec.md §4.6
    /// "conforms = violations.isEmpty after filtering by severity").
    pub fn new(violations: Vec<Violation>) -> Self {
        let conforms = !violations.iter().any(|v| v.severity == Severity::Violation);
        Report { conforms, violations }
    }
}

//! Shapes graph types (spec.md §4.6 "Constraint components implemented").

use std::collections::HashMap;

use fusion_core::FieldValue;
use fusion_graph::PropertyPath;

/// How a shape's focus nodes are selected (W3C SHACL §2.1.3).
#[derive(Debug, Clone)]
pub enum Target {
    /// A single, literal focus node.
    Node(FieldValue),
    /// Every subject of an `rdf:type` edge to this class.
    Class(String),
    /// Every subject of an edge with this predicate.
    SubjectsOf(String),
    /// Every object of an edge with this predicate.
    ObjectsOf(String),
    /// The shape's own IRI, used as a class (implicit class target).
    Implicit,
}

/// `sh:nodeKind` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Iri,
    Literal,
    BlankNode,
}

/// One constraint, attached to either a node shape (applied to the focus
/// node itself) or a property shape (applied to its collected value
/// nodes).
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Every value must have an `rdf:type` edge to this class.
    Class(String),
    /// Every value's declared datatype tag must equal this string.
    Datatype(String),
    /// Every value must be of this node kind.
    NodeKind(NodeKind),
    /// The value set's size must be at least this many.
    MinCount(usize),
    /// The value set's size must be at most this many.
    MaxCount(usize),
    /// Every value must compare `>=` this bound.
    MinInclusive(FieldValue),
    /// Every value must compare `<=` this bound.
    MaxInclusive(FieldValue),
    /// Every value must compare `>` this bound.
    MinExclusive(FieldValue),
    /// Every value must compare `<` this bound.
    MaxExclusive(FieldValue),
    /// Every string value's length must be at least this.
    MinLength(usize),
    /// Every string value's length must be at most this.
    MaxLength(usize),
    /// Every string value must match this regex, built with the given
    /// `i|m|s|x` flags.
    Pattern {
        /// The regular expression text.
        regex: String,
        /// `i`/`m`/`s`/`x` flag characters.
        flags: String,
    },
    /// Every string value's language tag (if any) must be one of these.
    LanguageIn(Vec<String>),
    /// No two values may share the same language tag.
    UniqueLang(bool),
    /// This path's values must equal another path's values from the same
    /// focus node.
    Equals(PropertyPath),
    /// This path's values must share nothing with another path's values
    /// from the same focus node.
    Disjoint(PropertyPath),
    /// Every value must be less than every value of another path.
    LessThan(PropertyPath),
    /// Every value must be less than or equal to every value of another
    /// path.
    LessThanOrEquals(PropertyPath),
    /// Every value must fail to conform to the inner shape.
    Not(Box<Shape>),
    /// Every value must conform to every inner shape.
    And(Vec<Shape>),
    /// Every value must conform to at least one inner shape.
    Or(Vec<Shape>),
    /// Every value must conform to exactly one inner shape.
    Xone(Vec<Shape>),
    /// Every value must conform to the inner shape (re-entering the
    /// node-level loop for IRI values).
    Node(Box<Shape>),
    /// Between `min` and `max` values must conform to the inner shape.
    QualifiedValueShape {
        /// The inner shape values are checked against.
        shape: Box<Shape>,
        /// Minimum conforming count, if bounded.
        min: Option<usize>,
        /// Maximum conforming count, if bounded.
        max: Option<usize>,
    },
    /// The value set must contain this exact value.
    HasValue(FieldValue),
    /// Every value must be one of this set.
    In(Vec<FieldValue>),
}

/// One property shape: a path plus the constraints evaluated against the
/// values it resolves to.
#[derive(Debug, Clone)]
pub struct PropertyShape {
    /// The path from the focus node to this shape's value nodes.
    pub path: PropertyPath,
    /// Constraints evaluated against the collected value nodes, once per
    /// shape (not once per value), so cardinality constraints see the full
    /// set.
    pub constraints: Vec<Constraint>,
}

/// An inlinable bundle of constraints and nested property shapes — the
/// unit `not`/`and`/`or`/`xone`/`node`/`qualifiedValueShape` validate a
/// value against, and also what a top-level [`NodeShape`] wraps.
#[derive(Debug, Clone, Default)]
pub struct Shape {
    /// Constraints evaluated directly against the focus/value node.
    pub constraints: Vec<Constraint>,
    /// Nested property shapes.
    pub property_shapes: Vec<PropertyShape>,
    /// Whether undeclared predicates on the focus node are a violation.
    pub closed: bool,
    /// Predicate IRIs exempted from `closed`, before property-shape
    /// augmentation (W3C §4.8.1).
    pub ignored_properties: Vec<String>,
}

/// A declared, targetable shape.
#[derive(Debug, Clone)]
pub struct NodeShape {
    /// This shape's IRI.
    pub iri: String,
    /// How focus nodes are selected for this shape.
    pub targets: Vec<Target>,
    /// The shape body.
    pub shape: Shape,
}

/// A collection of declared shapes, keyed by IRI.
#[derive(Debug, Clone, Default)]
pub struct ShapesGraph {
    shapes: HashMap<String, NodeShape>,
}

impl ShapesGraph {
    /// An empty shapes graph.
    pub fn new() -> Self {
        ShapesGraph::default()
    }

    /// Declare a shape.
    pub fn declare(&mut self, shape: NodeShape) {
        self.shapes.insert(shape.iri.clone(), shape);
    }

    /// Every declared shape, in no particular order.
    pub fn shapes(&self) -> impl Iterator<Item = &NodeShape> {
        self.shapes.values()
    }

    /// Look up a declared shape by IRI.
    pub fn get(&self, iri: &str) -> Option<&NodeShape> {
        self.shapes.get(iri)
    }
}

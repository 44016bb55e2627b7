//! Primary key identity.

use serde::{Deserialize, Serialize};

use crate::field_value::FieldValue;

/// A record's primary key, as an ordered tuple of [`FieldValue`]s.
///
/// spec.md §3: "Record ... Identified exclusively by the PK; attribute
/// projection is the caller's responsibility." Composite primary keys are
/// supported by allowing more than one component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryKey(Vec<FieldValue>);

impl PrimaryKey {
    /// Build a primary key from its components.
    pub fn new(components: Vec<FieldValue>) -> Self {
        PrimaryKey(components)
    }

    /// Build a single-component primary key.
    pub fn single(value: FieldValue) -> Self {
        PrimaryKey(vec![value])
    }

    /// The key's components, in declared order.
    pub fn components(&self) -> &[FieldValue] {
        &self.0
    }
}

impl PartialEq for PrimaryKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().zip(other.0.iter()).all(|(a, b)| a.equals(b))
    }
}
impl Eq for PrimaryKey {}

impl std::hash::Hash for PrimaryKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

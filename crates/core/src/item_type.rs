//! Record type tags.

use serde::{Deserialize, Serialize};

/// A stable type tag identifying which schema a record belongs to.
///
/// Index descriptors declare the set of item types they cover (spec.md §3);
/// the online builder uses an item type's storage prefix to seed its
/// initial back-fill range (spec.md §4.2).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemType(String);

impl ItemType {
    /// Wrap a type name as an [`ItemType`].
    pub fn new(name: impl Into<String>) -> Self {
        ItemType(name.into())
    }

    /// The type's name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ItemType {
    fn from(s: &str) -> Self {
        ItemType::new(s)
    }
}

//! Subspaces: a byte prefix plus tuple-encoding helpers.
//!
//! spec.md §3 invariant: if subspace `B` was produced as `A.child(x)`, every
//! key packed through `B` starts with `A`'s prefix followed by the encoding
//! of `x`. `child` is associative because it's simply prefix concatenation
//! of packed tuple elements.

use fusion_core::field_value::FieldValue;

use crate::tuple;

/// A namespaced region of the keyspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subspace {
    prefix: Vec<u8>,
}

impl Subspace {
    /// The empty subspace (prefix `[]`); every key lives under it.
    pub fn root() -> Self {
        Subspace { prefix: Vec::new() }
    }

    /// Build a subspace directly from raw prefix bytes.
    pub fn from_prefix(prefix: Vec<u8>) -> Self {
        Subspace { prefix }
    }

    /// Derive a child subspace by appending the tuple encoding of `element`.
    ///
    /// Associative: `a.child(x).child(y) == a.child_tuple(&[x, y])`.
    pub fn child(&self, element: FieldValue) -> Subspace {
        let mut prefix = self.prefix.clone();
        prefix.extend(tuple::pack(&[element]));
        Subspace { prefix }
    }

    /// Derive a child subspace by appending several tuple elements at once.
    pub fn child_tuple(&self, elements: &[FieldValue]) -> Subspace {
        let mut prefix = self.prefix.clone();
        prefix.extend(tuple::pack(elements));
        Subspace { prefix }
    }

    /// Pack a tuple into a full key under this subspace.
    pub fn pack(&self, elements: &[FieldValue]) -> Vec<u8> {
        let mut key = self.prefix.clone();
        key.extend(tuple::pack(elements));
        key
    }

    /// Unpack a key previously produced by [`Subspace::pack`], stripping
    /// this subspace's prefix first.
    ///
    /// # Errors
    /// Returns `None` if `key` does not start with this subspace's prefix,
    /// or the remaining bytes are not a well-formed tuple encoding.
    pub fn unpack<'a>(&self, key: &'a [u8]) -> Option<Vec<FieldValue>> {
        let rest = key.strip_prefix(self.prefix.as_slice())?;
        tuple::unpack(rest).ok()
    }

    /// This subspace's raw byte prefix.
    pub fn bytes(&self) -> &[u8] {
        &self.prefix
    }

    /// The half-open byte range `[prefix, strinc(prefix))` covering every
    /// key stored under this subspace (spec.md §6 `getRange`/`clearRange`).
    pub fn range(&self) -> (Vec<u8>, Vec<u8>) {
        (self.prefix.clone(), strinc(&self.prefix))
    }
}

/// Smallest byte string greater than every string with `prefix` as a
/// prefix: increment the last byte that isn't already `0xFF`, dropping any
/// trailing `0xFF` bytes. A prefix of all `0xFF` bytes (or empty) has no
/// finite successor within a bounded-length keyspace; callers should treat
/// that as "scan to the end of the keyspace".
fn strinc(prefix: &[u8]) -> Vec<u8> {
    let mut out = prefix.to_vec();
    while let Some(&last) = out.last() {
        if last == 0xFF {
            out.pop();
        } else {
            *out.last_mut().unwrap() += 1;
            return out;
        }
    }
    out
}

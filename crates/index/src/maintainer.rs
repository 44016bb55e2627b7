//! The `IndexMaintainer` trait: how a concrete index kind turns an item
//! into index entries, and keeps them in sync with writes (spec.md §4).
//!
//! Keeping this trait here, rather than in each kind's own crate, is what
//! lets [`crate::builder::OnlineIndexBuilder`] back-fill scalar, graph, and
//! vector indexes through one code path without depending on
//! `fusion-graph` or `fusion-vector`.

use fusion_core::{FieldPath, FieldValue, PrimaryKey};
use fusion_kv::{KvTransaction, Subspace};

use crate::error::IndexResult;
use crate::violations;

/// One secondary-index entry implied by an item: the packable tuple that
/// becomes (part of) a key under the index's subspace, together with the
/// primary key it points back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// The indexed value(s), in index-key order.
    pub value_key: Vec<FieldValue>,
    /// The primary key of the item this entry was derived from.
    pub primary_key: PrimaryKey,
}

/// How a concrete index kind derives entries from an item and maintains
/// them transactionally.
///
/// `Item` is whatever in-memory representation the caller decodes stored
/// records into before indexing; this crate never constructs one itself.
pub trait IndexMaintainer<Item> {
    /// The entries `item` contributes to this index. Called by both normal
    /// writes (one item at a time) and back-fill (one item per scanned
    /// primary-range row).
    fn index_keys(&self, item: &Item) -> Vec<IndexEntry>;

    /// Write (or overwrite) every entry `item` contributes, and clear any
    /// previously written entries for the same primary key that no longer
    /// apply. Implementors diff against the maintainer's own prior-value
    /// bookkeeping; this trait does not prescribe how that's tracked.
    fn update<Tx: KvTransaction>(
        &self,
        txn: &mut Tx,
        subspace: &Subspace,
        primary_key: &PrimaryKey,
        old_item: Option<&Item>,
        new_item: Option<&Item>,
    ) -> IndexResult<()>;

    /// Remove every entry for `primary_key` unconditionally. Equivalent to
    /// `update` with `new_item = None`, exposed separately because back-fill
    /// clears are unconditional and don't have an `old_item` to diff
    /// against.
    fn clear<Tx: KvTransaction>(
        &self,
        txn: &mut Tx,
        subspace: &Subspace,
        primary_key: &PrimaryKey,
        old_item: &Item,
    ) -> IndexResult<()> {
        self.update(txn, subspace, primary_key, Some(old_item), None)
    }
}

/// A maintainer for a plain scalar (single- or multi-field) index: one
/// entry per item, keyed by the packed field values followed by the
/// primary key for uniqueness within the index (spec.md §4 "Scalar
/// index").
#[derive(Debug, Clone)]
pub struct ScalarMaintainer {
    field_paths: Vec<FieldPath>,
    unique: bool,
}

impl ScalarMaintainer {
    /// Build a maintainer covering `field_paths`, in key order. `unique`
    /// mirrors the owning descriptor's [`crate::descriptor::IndexDescriptor::is_unique`]:
    /// when set, every normal (non-back-fill) write checks for — and
    /// persists — a collision with an already-stored value the same way
    /// back-fill does (spec.md §3 "Uniqueness violation").
    pub fn new(field_paths: Vec<FieldPath>, unique: bool) -> Self {
        ScalarMaintainer { field_paths, unique }
    }

    fn entry_for<Item>(&self, item: &Item, primary_key: &PrimaryKey, extract: &impl Fn(&Item, &FieldPath) -> FieldValue) -> IndexEntry {
        let value_key = self.field_paths.iter().map(|p| extract(item, p)).collect();
        IndexEntry {
            value_key,
            primary_key: primary_key.clone(),
        }
    }

    fn key_for(&self, subspace: &Subspace, entry: &IndexEntry) -> Vec<u8> {
        let mut elements = entry.value_key.clone();
        elements.extend(entry.primary_key.components().iter().cloned());
        subspace.pack(&elements)
    }

    /// Check whether `entry`'s value is already stored under `subspace` for
    /// a different primary key and, if so, persist the collision (spec.md
    /// §3: "created by the maintainer when back-fill or concurrent write
    /// detects duplicates"). Never raised as an error here — matching
    /// back-fill's "recorded, not raised" handling — so a normal write to a
    /// unique index never fails; the violation surfaces to whoever inspects
    /// the index's persisted violation records.
    fn check_unique<Tx: KvTransaction>(&self, txn: &mut Tx, subspace: &Subspace, entry: &IndexEntry) -> IndexResult<()> {
        let (begin, end) = subspace.child_tuple(&entry.value_key).range();
        let existing = txn.get_range(&begin, &end, false, None)?;
        let mut collides = false;
        for (key, _) in &existing {
            let Some(elements) = subspace.unpack(key) else { continue };
            let existing_pk = PrimaryKey::new(elements[self.field_paths.len()..].to_vec());
            if existing_pk != entry.primary_key {
                collides = true;
                violations::record_observation(txn, subspace, &entry.value_key, &existing_pk)?;
            }
        }
        if collides {
            violations::record_observation(txn, subspace, &entry.value_key, &entry.primary_key)?;
        }
        Ok(())
    }
}

/// Field-value extraction is supplied by the caller per item type, so
/// `ScalarMaintainer` stays generic without requiring `Item: Into<Vec<FieldValue>>`
/// at the trait level. Concrete item types implement this directly.
pub trait FieldExtract {
    /// Resolve `path` to a value on `self`; absent fields resolve to
    /// [`FieldValue::Null`].
    fn field(&self, path: &FieldPath) -> FieldValue;

    /// The item's own primary key.
    fn primary_key(&self) -> PrimaryKey;
}

impl<Item: FieldExtract> IndexMaintainer<Item> for ScalarMaintainer {
    fn index_keys(&self, item: &Item) -> Vec<IndexEntry> {
        vec![self.entry_for(item, &item.primary_key(), &|i, p| i.field(p))]
    }

    fn update<Tx: KvTransaction>(
        &self,
        txn: &mut Tx,
        subspace: &Subspace,
        primary_key: &PrimaryKey,
        old_item: Option<&Item>,
        new_item: Option<&Item>,
    ) -> IndexResult<()> {
        if let Some(old) = old_item {
            for entry in self.index_keys(old) {
                txn.clear(&self.key_for(subspace, &entry));
            }
            let _ = primary_key;
        }
        if let Some(new) = new_item {
            for entry in self.index_keys(new) {
                if self.unique {
                    self.check_unique(txn, subspace, &entry)?;
                }
                txn.set(&self.key_for(subspace, &entry), &[]);
            }
        }
        Ok(())
    }
}

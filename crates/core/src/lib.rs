//! Shared data model for the Fusion secondary-index engine.
//!
//! This crate defines the types every other layer agrees on: the tagged
//! [`FieldValue`] union that records are projected into, [`FieldPath`] for
//! declaring which part of a record an index or maintainer cares about, the
//! [`PrimaryKey`] newtype identifying a record, and the top-level [`Error`]
//! enum other crates convert their own errors into at API boundaries.
//!
//! Nothing here talks to a key-value store or knows about indexes; this is
//! pure domain vocabulary, consumed by `fusion-kv` and up.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod field_path;
pub mod field_value;
pub mod item_type;
pub mod primary_key;

pub use error::{Error, Result};
pub use field_path::FieldPath;
pub use field_value::{CompareResult, FieldValue};
pub use item_type::ItemType;
pub use primary_key::PrimaryKey;

//! Document model.
//!
//! A [`Document`] is an immutable id plus a set of named, typed field values.
//! Text fields are analyzed and indexed when a segment is flushed; numeric and
//! binary fields are stored and can be read back from the segment's document
//! store, but they are not indexed.

#[allow(clippy::module_inception)]
pub mod document;
pub mod field_value;

pub use document::{DocId, Document, DocumentBuilder};
pub use field_value::FieldValue;

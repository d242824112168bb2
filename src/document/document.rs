//! Document structure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::field_value::FieldValue;

/// Document identifier. Valid ids are non-negative.
pub type DocId = i32;

/// A document represents a single item to be indexed.
///
/// Documents are immutable once built. Field order carries no meaning; fields
/// are kept sorted by name so that two equal documents serialize identically.
///
/// ```
/// use tessera::document::Document;
///
/// let doc = Document::builder(1)
///     .add_text("title", "Rust Programming Guide")
///     .add_numeric("year", 2024)
///     .build();
///
/// assert_eq!(doc.id(), 1);
/// assert_eq!(doc.len(), 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    id: DocId,
    fields: BTreeMap<String, FieldValue>,
}

impl Document {
    /// Create a document from an id and a field map.
    pub fn new(id: DocId, fields: BTreeMap<String, FieldValue>) -> Self {
        Document { id, fields }
    }

    /// Create a builder for constructing documents.
    pub fn builder(id: DocId) -> DocumentBuilder {
        DocumentBuilder::new(id)
    }

    /// The document id.
    pub fn id(&self) -> DocId {
        self.id
    }

    /// Get a field value from the document.
    pub fn get_field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Check if the document has a field.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Get all fields, sorted by name.
    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Iterate over the text fields, the only ones that get indexed.
    pub fn text_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .filter_map(|(name, value)| value.as_text().map(|text| (name.as_str(), text)))
    }

    /// Get the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A builder for constructing documents in a fluent manner.
#[derive(Debug)]
pub struct DocumentBuilder {
    id: DocId,
    fields: BTreeMap<String, FieldValue>,
}

impl DocumentBuilder {
    /// Create a new document builder.
    pub fn new(id: DocId) -> Self {
        DocumentBuilder {
            id,
            fields: BTreeMap::new(),
        }
    }

    /// Add a text field to the document.
    pub fn add_text<S: Into<String>, T: Into<String>>(self, name: S, value: T) -> Self {
        self.add_field(name, FieldValue::Text(value.into()))
    }

    /// Add a numeric field to the document.
    pub fn add_numeric<S: Into<String>>(self, name: S, value: i64) -> Self {
        self.add_field(name, FieldValue::Numeric(value))
    }

    /// Add a binary field to the document.
    pub fn add_binary<S: Into<String>>(self, name: S, value: Vec<u8>) -> Self {
        self.add_field(name, FieldValue::Binary(value))
    }

    /// Add a field with a generic value. A later value for the same name
    /// replaces the earlier one.
    pub fn add_field<S: Into<String>>(mut self, name: S, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Build the final document.
    pub fn build(self) -> Document {
        Document::new(self.id, self.fields)
    }
}

//! Field value types for documents.

use serde::{Deserialize, Serialize};

/// A value stored in a document field.
///
/// ```
/// use tessera::document::FieldValue;
///
/// let value = FieldValue::from("hello");
/// assert_eq!(value.as_text(), Some("hello"));
/// assert_eq!(FieldValue::from(42i32).as_numeric(), Some(42));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// UTF-8 text. The only kind that is analyzed and indexed.
    Text(String),
    /// A 64-bit signed integer.
    Numeric(i64),
    /// Raw bytes.
    Binary(Vec<u8>),
}

impl FieldValue {
    /// Get the text value, if this is a text field.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Get the numeric value, if this is a numeric field.
    pub fn as_numeric(&self) -> Option<i64> {
        match self {
            FieldValue::Numeric(value) => Some(*value),
            _ => None,
        }
    }

    /// Get the bytes, if this is a binary field.
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Whether the analyzer runs over this value at flush time.
    pub fn is_indexed(&self) -> bool {
        matches!(self, FieldValue::Text(_))
    }

    /// Short lowercase name of the value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Numeric(_) => "numeric",
            FieldValue::Binary(_) => "binary",
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Numeric(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Numeric(value as i64)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Binary(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let text = FieldValue::Text("rust".to_string());
        assert_eq!(text.as_text(), Some("rust"));
        assert_eq!(text.as_numeric(), None);
        assert!(text.is_indexed());

        let numeric = FieldValue::from(7i32);
        assert_eq!(numeric, FieldValue::Numeric(7));
        assert!(!numeric.is_indexed());
        assert_eq!(numeric.type_name(), "numeric");

        let binary = FieldValue::from(vec![1u8, 2]);
        assert_eq!(binary.as_binary(), Some(&[1u8, 2][..]));
    }
}

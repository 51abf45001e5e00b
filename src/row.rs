//! Loosely-typed rows as read from a source table

use base64::Engine;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single column value, independent of the engine it was read from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Binary(Vec<u8>),
}

/// Column name to value, in the order the source returned them.
///
/// The order is kept for display only; hashing sorts by column name.
pub type Row = IndexMap<String, ColumnValue>;

impl ColumnValue {
    /// Text form used when building row identities from key columns.
    ///
    /// Null renders as the empty string so that a missing key is detectable.
    pub fn key_text(&self) -> String {
        match self {
            ColumnValue::Null => String::new(),
            ColumnValue::Bool(b) => b.to_string(),
            ColumnValue::Integer(i) => i.to_string(),
            ColumnValue::Float(f) => f.to_string(),
            ColumnValue::Text(s) => s.clone(),
            ColumnValue::Binary(b) => base64::engine::general_purpose::STANDARD.encode(b),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    /// Value of a text column read as raw bytes.
    ///
    /// Bytes that are not valid UTF-8 are kept as binary so that distinct
    /// values never collapse into the same replacement characters.
    pub fn from_text_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => ColumnValue::Text(text.to_string()),
            Err(_) => ColumnValue::Binary(bytes.to_vec()),
        }
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        ColumnValue::Text(value.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(value: String) -> Self {
        ColumnValue::Text(value)
    }
}

impl From<i64> for ColumnValue {
    fn from(value: i64) -> Self {
        ColumnValue::Integer(value)
    }
}

impl From<f64> for ColumnValue {
    fn from(value: f64) -> Self {
        ColumnValue::Float(value)
    }
}

impl From<bool> for ColumnValue {
    fn from(value: bool) -> Self {
        ColumnValue::Bool(value)
    }
}

impl From<Vec<u8>> for ColumnValue {
    fn from(value: Vec<u8>) -> Self {
        ColumnValue::Binary(value)
    }
}

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ColumnValue::Null)
    }
}

/// Build a row from `(column, value)` pairs
pub fn row_from<I, K, V>(pairs: I) -> Row
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<ColumnValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

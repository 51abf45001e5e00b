//! Canonical row serialization and fingerprinting
//!
//! A row is serialized as compact JSON with its columns sorted by name, so the
//! same column values always produce the same bytes no matter which order the
//! source returned them in. The fingerprint is the first 128 bits of the
//! BLAKE3 digest of those bytes, as lowercase hex.

use crate::error::{AuditError, Result};
use crate::row::{ColumnValue, Row};
use base64::Engine;
use blake3::Hasher;
use serde_json::{json, Number, Value};
use std::collections::BTreeMap;

/// A row fingerprint represented as a hex string
pub type Fingerprint = String;

/// Fingerprint length in bytes
pub const FINGERPRINT_BYTES: usize = 16;

/// Canonical form of a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRow {
    /// Canonical JSON serialization, also used as the row dump
    pub dump: String,
    pub fingerprint: Fingerprint,
}

impl CanonicalRow {
    pub fn as_bytes(&self) -> &[u8] {
        self.dump.as_bytes()
    }
}

/// Canonicalize a row into its dump and fingerprint
pub fn canonicalize(row: &Row) -> Result<CanonicalRow> {
    let mut sorted: BTreeMap<&str, Value> = BTreeMap::new();
    for (column, value) in row {
        let json = value_to_json(value).map_err(|e| match e {
            AuditError::Serialization { message } => {
                AuditError::serialization(format!("column '{}': {}", column, message))
            }
            other => other,
        })?;
        sorted.insert(column.as_str(), json);
    }

    let dump = serde_json::to_string(&sorted)?;
    let fingerprint = fingerprint_bytes(dump.as_bytes());

    Ok(CanonicalRow { dump, fingerprint })
}

/// Hash arbitrary bytes into a fingerprint
pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..FINGERPRINT_BYTES * 2].to_string()
}

/// Convert a column value to its canonical JSON form
fn value_to_json(value: &ColumnValue) -> Result<Value> {
    match value {
        ColumnValue::Null => Ok(Value::Null),
        ColumnValue::Bool(b) => Ok(Value::Bool(*b)),
        ColumnValue::Integer(i) => Ok(Value::Number((*i).into())),
        ColumnValue::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| AuditError::serialization(format!("cannot encode non-finite float {}", f))),
        ColumnValue::Text(s) => Ok(Value::String(s.clone())),
        // Tagged so a blob never hashes like a text column holding its base64
        ColumnValue::Binary(b) => Ok(json!({
            "_type": "blob",
            "data": base64::engine::general_purpose::STANDARD.encode(b),
        })),
    }
}

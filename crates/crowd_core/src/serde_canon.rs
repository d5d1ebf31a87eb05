//! Canonical JSON serialization for deterministic hashing
//!
//! Object keys are sorted recursively and output is compact, so two
//! structurally equal values always produce identical bytes and hashes.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Serialize a value to canonical JSON (sorted keys, no whitespace)
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json_value = serde_json::to_value(value)?;
    serde_json::to_string(&canonicalize_value(json_value))
}

/// Sort all object keys recursively
fn canonicalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize_value(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize_value).collect()),
        other => other,
    }
}

/// Blake3 hash of raw bytes as lowercase hex
pub fn hash_bytes_hex(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

/// Blake3 hash of the canonical JSON form, as lowercase hex
pub fn hash_canonical_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = to_canonical_json(value)?;
    Ok(hash_bytes_hex(json.as_bytes()))
}

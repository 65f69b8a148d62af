//! Canonical serialization for content hashing.
//!
//! A payload is canonical when every float is rounded to a fixed number of
//! decimals, object keys are sorted, and the JSON is written compactly.
//! Identical inputs therefore hash identically on every platform.

use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

use crate::errors::CalcResult;

/// Decimal places kept in hashed and persisted payloads
pub const PRECISION: u32 = 3;

/// Round to `decimals` places, normalizing negative zero
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Round every float in a JSON tree and rebuild objects in sorted key order
pub fn canonicalize(value: Value, decimals: u32) -> Value {
    match value {
        Value::Number(n) => {
            if n.is_f64() {
                n.as_f64()
                    .and_then(|f| Number::from_f64(round_to(f, decimals)))
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            } else {
                Value::Number(n)
            }
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| canonicalize(v, decimals)).collect())
        }
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, v) in entries {
                sorted.insert(key, canonicalize(v, decimals));
            }
            Value::Object(sorted)
        }
        other => other,
    }
}

/// Rounded, sorted-key value of any serializable payload
pub fn canonical_value<T: Serialize + ?Sized>(payload: &T) -> CalcResult<Value> {
    Ok(canonicalize(serde_json::to_value(payload)?, PRECISION))
}

/// Compact canonical JSON string of a payload
pub fn canonical_json<T: Serialize + ?Sized>(payload: &T) -> CalcResult<String> {
    Ok(serde_json::to_string(&canonical_value(payload)?)?)
}

/// Lowercase hex SHA-256 of the canonical JSON of a payload
pub fn content_hash<T: Serialize + ?Sized>(payload: &T) -> CalcResult<String> {
    Ok(sha256_hex(canonical_json(payload)?.as_bytes()))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// `serialize_with` adapter that writes a field in canonical (rounded) form
pub fn serialize_rounded<T, S>(payload: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    let value = canonical_value(payload).map_err(serde::ser::Error::custom)?;
    value.serialize(serializer)
}

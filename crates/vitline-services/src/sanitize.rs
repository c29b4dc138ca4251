//! Payload sanitizing — key stripping applied before a payload is encoded.

use serde_json::{Map, Value};

/// Remove every `id` key at every nesting level.
///
/// Receivers mint fresh identifiers on import, so host ids never leave
/// the device.
pub fn strip_ids(value: &Value) -> Value {
    strip_key(value, "id")
}

/// Remove every `description` key at every nesting level. Lossy; only
/// used when a payload would otherwise need too many frames.
pub fn strip_descriptions(value: &Value) -> Value {
    strip_key(value, "description")
}

/// Copy of `value` with all object entries named `key` removed, recursing
/// through objects and arrays. Scalars are returned unchanged.
pub fn strip_key(value: &Value, key: &str) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|v| strip_key(v, key)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| (k.clone(), strip_key(v, key)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

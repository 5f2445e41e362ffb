//! Dynamic JSON documents.
//!
//! A [`Document`] is a JSON object whose keys keep their insertion order
//! (serde_json is built with `preserve_order`). Untyped model fields and
//! ad-hoc filter objects use it. Serialization is plain JSON text: what is
//! stored is exactly what is read back.

use serde_json::{Map, Number, Value};

/// An insertion-ordered JSON object.
pub type Document = Map<String, Value>;

/// Render a float as a JSON number, keeping integral values integral so that
/// `10` round-trips as `10` rather than `10.0`.
pub fn json_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::Number(Number::from(value as i64))
    } else {
        Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Parse JSON text that must hold an object.
pub fn parse_document(text: &str) -> Result<Document, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("expected a JSON object".into()),
        Err(err) => Err(format!("invalid JSON: {}", err)),
    }
}

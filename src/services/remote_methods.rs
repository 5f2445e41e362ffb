//! Remote methods served by the remoting listener.
//!
//! Each method is a pure mapping from already-marshalled arguments to a
//! result value; the HTTP wrapping lives in `remoting_handlers`.

use crate::models::{document::Document, document::json_number, geo_point::GeoPoint};
use serde_json::{Value, json};

pub const SECRET: &str = "shhh!";

/// Body returned by the binary method.
pub const BINARY_PAYLOAD: &[u8] = &[0x01, 0x02, 0x03];

pub fn get_secret() -> &'static str {
    SECRET
}

pub fn transform(input: &str) -> String {
    format!("transformed: {}", input)
}

/// Echo a point back as `{lat, lng}`.
pub fn geopoint(here: GeoPoint) -> Value {
    json!({
        "lat": json_number(here.lat),
        "lng": json_number(here.lng),
    })
}

/// The JSON text of a filter, keys in the order they arrived.
pub fn list(filter: &Document) -> String {
    Value::Object(filter.clone()).to_string()
}

/// The raw `Authorization` header, or null when absent.
pub fn get_auth(header: Option<&str>) -> Value {
    header.map_or(Value::Null, |h| Value::String(h.to_string()))
}

/// Static method shared by both test classes.
pub fn favorite_person() -> &'static str {
    "You"
}

/// Instance of `SimpleClass` / `ContractClass`, constructed from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeter {
    name: String,
}

impl Greeter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn greet(&self, other: &str) -> String {
        format!("Hi, {}!", other)
    }
}

/// Class names exposed with static and instance methods.
pub const SHARED_CLASSES: [&str; 2] = ["SimpleClass", "ContractClass"];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::parse_document;

    #[test]
    fn secret_and_transform() {
        assert_eq!(get_secret(), "shhh!");
        assert_eq!(transform("x"), "transformed: x");
        assert_eq!(transform(""), "transformed: ");
    }

    #[test]
    fn geopoint_keeps_integers() {
        let point = GeoPoint::new(10.0, 20.0).unwrap();
        assert_eq!(geopoint(point).to_string(), r#"{"lat":10,"lng":20}"#);
        let point = GeoPoint::new(10.5, -20.25).unwrap();
        assert_eq!(geopoint(point).to_string(), r#"{"lat":10.5,"lng":-20.25}"#);
    }

    #[test]
    fn list_is_exact_serialization() {
        let text = r#"{"where":{"age":{"gt":"21"}},"limit":5}"#;
        assert_eq!(list(&parse_document(text).unwrap()), text);
    }

    #[test]
    fn auth_header_echo() {
        assert_eq!(get_auth(Some("Bearer abc")), json!("Bearer abc"));
        assert_eq!(get_auth(None), Value::Null);
    }

    #[test]
    fn shared_classes() {
        let greeter = Greeter::new("Ann");
        assert_eq!(greeter.get_name(), "Ann");
        assert_eq!(greeter.greet("Bob"), "Hi, Bob!");
        assert_eq!(favorite_person(), "You");
        assert_eq!(SHARED_CLASSES, ["SimpleClass", "ContractClass"]);
    }
}

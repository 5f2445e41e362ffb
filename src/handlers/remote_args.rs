//! Argument marshalling for remote methods.
//!
//! Arguments come from the query string and then the request body (a JSON
//! object or a urlencoded form), later sources overriding earlier ones.
//! Bracketed keys nest: `filter[where][age][gt]=21` becomes
//! `{"filter":{"where":{"age":{"gt":"21"}}}}`. Values taken from query
//! strings and forms stay strings; object-typed arguments decode JSON text
//! on demand.

use crate::{
    errors::AppError,
    models::document::{Document, parse_document},
    models::geo_point::GeoPoint,
};
use axum::http::{HeaderMap, header};
use serde_json::Value;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RemoteArgs {
    values: Document,
}

impl RemoteArgs {
    /// Merge the raw query string and the request body into one argument set.
    pub fn collect(query: Option<&str>, headers: &HeaderMap, body: &[u8]) -> Result<Self, AppError> {
        let mut args = Self::default();
        if let Some(query) = query {
            args.extend_pairs(query.as_bytes());
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(args);
        }
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("application/json") {
            match serde_json::from_slice::<Value>(body) {
                Ok(Value::Object(map)) => args.values.extend(map),
                Ok(_) => return Err(AppError::bad_request("request body must be a JSON object")),
                Err(err) => return Err(AppError::bad_request(format!("invalid JSON body: {}", err))),
            }
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            args.extend_pairs(body);
        }
        Ok(args)
    }

    fn extend_pairs(&mut self, input: &[u8]) {
        for (key, value) in form_urlencoded::parse(input) {
            self.insert(&key, Value::String(value.into_owned()));
        }
    }

    /// Set `key`, expanding bracket notation into nested objects.
    pub fn insert(&mut self, key: &str, value: Value) {
        let path = split_brackets(key);
        insert_path(&mut self.values, &path, value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        match self.values.get(name) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    /// A required string argument. Scalars are rendered as text.
    pub fn string(&self, name: &str) -> Result<String, AppError> {
        match self.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(missing(name)),
        }
    }

    /// A required object argument, given inline or as JSON text.
    pub fn object(&self, name: &str) -> Result<Document, AppError> {
        match self.get(name) {
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(Value::String(text)) => parse_document(text)
                .map_err(|err| AppError::bad_request(format!("`{}`: {}", name, err))),
            Some(_) => Err(AppError::bad_request(format!("`{}` must be an object", name))),
            None => Err(missing(name)),
        }
    }

    pub fn geo_point(&self, name: &str) -> Result<GeoPoint, AppError> {
        let value = self.get(name).ok_or_else(|| missing(name))?;
        GeoPoint::from_value(value).map_err(|err| AppError::bad_request(format!("`{}`: {}", name, err)))
    }
}

fn missing(name: &str) -> AppError {
    AppError::bad_request(format!("`{}` is a required argument", name))
}

/// `a[b][c]` → `["a", "b", "c"]`. Keys that are not well-formed bracket
/// paths are used verbatim.
fn split_brackets(key: &str) -> Vec<&str> {
    let Some(open) = key.find('[') else {
        return vec![key];
    };
    if open == 0 || !key.ends_with(']') {
        return vec![key];
    }

    let mut path = vec![&key[..open]];
    let inner = &key[open + 1..key.len() - 1];
    for segment in inner.split("][") {
        if segment.contains('[') || segment.contains(']') {
            return vec![key];
        }
        path.push(segment);
    }
    path
}

fn insert_path(target: &mut Document, path: &[&str], value: Value) {
    match path {
        [] => {}
        [last] => {
            target.insert((*last).to_string(), value);
        }
        [first, rest @ ..] => {
            let slot = target
                .entry((*first).to_string())
                .or_insert_with(|| Value::Object(Document::new()));
            if !slot.is_object() {
                *slot = Value::Object(Document::new());
            }
            if let Value::Object(child) = slot {
                insert_path(child, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};
    use serde_json::json;

    fn headers(content_type: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers
    }

    #[test]
    fn brackets_nest_and_values_stay_strings() {
        let args = RemoteArgs::collect(
            Some("filter[where][age][gt]=21&filter[limit]=5"),
            &HeaderMap::new(),
            b"",
        )
        .unwrap();
        assert_eq!(
            Value::Object(args.object("filter").unwrap()),
            json!({"where": {"age": {"gt": "21"}}, "limit": "5"})
        );
    }

    #[test]
    fn body_overrides_query() {
        let args = RemoteArgs::collect(
            Some("str=query&other=kept"),
            &headers("application/json"),
            br#"{"str": "body"}"#,
        )
        .unwrap();
        assert_eq!(args.string("str").unwrap(), "body");
        assert_eq!(args.string("other").unwrap(), "kept");

        let args = RemoteArgs::collect(
            None,
            &headers("application/x-www-form-urlencoded"),
            b"str=a+b",
        )
        .unwrap();
        assert_eq!(args.string("str").unwrap(), "a b");
    }

    #[test]
    fn json_text_decodes_for_objects() {
        let args =
            RemoteArgs::collect(Some(r#"here={"lat":10,"lng":20}"#), &HeaderMap::new(), b"").unwrap();
        assert_eq!(args.geo_point("here").unwrap(), GeoPoint { lat: 10.0, lng: 20.0 });
        assert_eq!(args.object("here").unwrap()["lat"], json!(10));
    }

    #[test]
    fn missing_and_malformed_arguments_are_bad_requests() {
        let args = RemoteArgs::collect(Some("str=&filter=3"), &HeaderMap::new(), b"").unwrap();
        assert_eq!(args.string("str").unwrap(), "");
        assert_eq!(args.string("nope").unwrap_err().status, StatusCode::BAD_REQUEST);
        assert_eq!(args.object("filter").unwrap_err().status, StatusCode::BAD_REQUEST);
        assert_eq!(args.geo_point("here").unwrap_err().status, StatusCode::BAD_REQUEST);

        let err = RemoteArgs::collect(None, &headers("application/json"), b"[1]").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn malformed_bracket_keys_are_literal() {
        assert_eq!(split_brackets("a[b]c"), vec!["a[b]c"]);
        assert_eq!(split_brackets("[a]"), vec!["[a]"]);
        assert_eq!(split_brackets("a[b][c]"), vec!["a", "b", "c"]);
    }
}

//! Query filters understood by the Memory datasource.

use crate::models::document::{Document, parse_document};
use serde::Deserialize;
use serde_json::Value;

/// `{where?, order?, limit?, skip?}` as sent by clients in `?filter=`.
///
/// Unknown keys such as `include` or `fields` are accepted and ignored.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Filter {
    #[serde(rename = "where", default)]
    pub where_clause: Option<Document>,

    #[serde(default)]
    pub order: Option<OrderSpec>,

    #[serde(default)]
    pub limit: Option<u64>,

    #[serde(default, alias = "offset")]
    pub skip: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OrderSpec {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// One `field DIRECTION` term of an `order` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub field: String,
    pub direction: Direction,
}

impl Filter {
    /// Parse the JSON text of a `filter` query parameter. Absent or blank
    /// text is the empty filter.
    pub fn from_query(text: Option<&str>) -> Result<Self, String> {
        match text.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(text) => Self::from_document(parse_document(text)?),
        }
    }

    /// Build a filter from an object. Bracket-notation query strings deliver
    /// `limit`, `skip` and `offset` as text, so numeric strings are accepted.
    pub fn from_document(mut doc: Document) -> Result<Self, String> {
        for key in ["limit", "skip", "offset"] {
            if let Some(Value::String(text)) = doc.get(key) {
                let number = text
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| format!("invalid filter: `{}` must be a number", key))?;
                doc.insert(key.to_string(), Value::from(number));
            }
        }
        serde_json::from_value(Value::Object(doc))
            .map_err(|err| format!("invalid filter: {}", err))
    }

    /// A filter that only carries a `where` clause.
    pub fn with_where(where_clause: Document) -> Self {
        Self {
            where_clause: Some(where_clause),
            ..Self::default()
        }
    }

    pub fn order_terms(&self) -> Result<Vec<OrderTerm>, String> {
        let raw: Vec<&str> = match &self.order {
            None => return Ok(Vec::new()),
            Some(OrderSpec::One(s)) => s.split(',').collect(),
            Some(OrderSpec::Many(list)) => list.iter().map(String::as_str).collect(),
        };

        raw.into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|term| {
                let mut parts = term.split_whitespace();
                let field = parts.next().unwrap_or_default().to_string();
                let direction = match parts.next() {
                    None => Direction::Asc,
                    Some(d) if d.eq_ignore_ascii_case("asc") => Direction::Asc,
                    Some(d) if d.eq_ignore_ascii_case("desc") => Direction::Desc,
                    Some(d) => return Err(format!("invalid order direction `{}`", d)),
                };
                if parts.next().is_some() {
                    return Err(format!("invalid order term `{}`", term));
                }
                Ok(OrderTerm { field, direction })
            })
            .collect()
    }
}

//! The sample model seeded at startup.

use crate::models::document::Document;
use crate::services::memory_store::Model;
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// A widget record.
///
/// `bars` keeps the exact JSON number it was given, so integers are echoed
/// back as integers. `data` is an arbitrary nested document.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Widget {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bars: Option<Number>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Document>,
}

impl Model for Widget {
    const NAME: &'static str = "widget";
    const TABLE: &'static str = "widgets";

    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("`name` can't be blank".into());
        }
        Ok(())
    }
}

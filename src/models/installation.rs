//! Push-notification device registrations.

use crate::services::memory_store::Model;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// One device registered for push notifications.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Installation {
    pub app_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<Number>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,

    pub device_token: String,

    /// Platform name, e.g. `android` or `ios`.
    pub device_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriptions: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

impl Model for Installation {
    const NAME: &'static str = "installation";
    const TABLE: &'static str = "installations";

    fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("appId", &self.app_id),
            ("deviceToken", &self.device_token),
            ("deviceType", &self.device_type),
        ] {
            if value.trim().is_empty() {
                return Err(format!("`{}` can't be blank", field));
            }
        }
        Ok(())
    }

    fn before_save(&mut self, _is_new: bool) {
        let now = Utc::now();
        if self.created.is_none() {
            self.created = Some(now);
        }
        self.modified = Some(now);
    }
}

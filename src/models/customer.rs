//! Customers (the user model) and their access tokens.

use crate::services::memory_store::{Model, Record};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Default token lifetime: two weeks, in seconds.
pub const DEFAULT_TOKEN_TTL: i64 = 1_209_600;

/// Longest lifetime a client may ask for: one year, in seconds.
pub const MAX_TOKEN_TTL: i64 = 31_556_926;

/// A stored customer. `password` always holds an Argon2 hash.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub email: String,

    pub password: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
}

impl Model for Customer {
    const NAME: &'static str = "customer";
    const TABLE: &'static str = "customers";

    fn validate(&self) -> Result<(), String> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err("`email` can't be blank".into());
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err("`email` is invalid".into()),
        }
        if self.password.is_empty() {
            return Err("`password` can't be blank".into());
        }
        Ok(())
    }
}

/// What clients see of a customer: everything but the password hash.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerView {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
}

impl From<Record<Customer>> for CustomerView {
    fn from(record: Record<Customer>) -> Self {
        Self {
            id: record.id,
            email: record.data.email,
            username: record.data.username,
            email_verified: record.data.email_verified,
            realm: record.data.realm,
        }
    }
}

/// A login session. Valid while `created + ttl` lies in the future.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    /// Opaque 64-character token string.
    pub id: String,

    /// Lifetime in seconds.
    pub ttl: i64,

    pub created: DateTime<Utc>,

    /// Owning customer.
    pub user_id: i64,
}

impl AccessToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.created + Duration::seconds(self.ttl) <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(email: &str) -> Customer {
        Customer {
            email: email.into(),
            password: "hash".into(),
            username: None,
            email_verified: None,
            realm: None,
        }
    }

    #[test]
    fn email_must_look_like_an_address() {
        assert!(customer("ann@example.com").validate().is_ok());
        assert!(customer("ann").validate().is_err());
        assert!(customer("@example.com").validate().is_err());
        assert!(customer("  ").validate().is_err());
    }

    #[test]
    fn view_hides_the_password() {
        let view = CustomerView::from(Record {
            id: 7,
            data: customer("ann@example.com"),
        });
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], 7);
        assert!(json.get("password").is_none());
    }

    #[test]
    fn token_expiry_is_created_plus_ttl() {
        let created = Utc::now();
        let token = AccessToken {
            id: "t".into(),
            ttl: 60,
            created,
            user_id: 1,
        };
        assert!(!token.is_expired_at(created + Duration::seconds(59)));
        assert!(token.is_expired_at(created + Duration::seconds(60)));
    }
}

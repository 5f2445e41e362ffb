//! AuthService: customer registration, login sessions and access tokens.
//!
//! Passwords are hashed with Argon2 on the blocking pool. Tokens live in the
//! `access_tokens` table; an expired token is deleted the first time it is
//! presented.

use crate::models::{
    customer::{AccessToken, Customer, CustomerView, DEFAULT_TOKEN_TTL, MAX_TOKEN_TTL},
    document::Document,
    filter::Filter,
};
use crate::services::memory_store::{ModelStore, Record, StoreError, is_unique_violation};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tokio::task;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login failed")]
    LoginFailed,
    #[error("authorization required: {0}")]
    Unauthorized(String),
    #[error("invalid current password")]
    InvalidPassword,
    #[error("{field} `{value}` is already taken")]
    AlreadyTaken { field: &'static str, value: String },
    #[error("{0}")]
    Invalid(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Join(#[from] task::JoinError),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Body of a login request. Either `email` or `username` identifies the
/// customer.
#[derive(Debug, Default, Deserialize)]
pub struct Credentials {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Requested token lifetime in seconds.
    pub ttl: Option<i64>,
}

#[derive(Clone)]
pub struct AuthService {
    db: Arc<SqlitePool>,
    customers: ModelStore<Customer>,
}

impl AuthService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self {
            customers: ModelStore::new(db.clone()),
            db,
        }
    }

    /// Create a customer from a client document. The plaintext `password`
    /// is replaced by its hash before anything is stored.
    pub async fn register(&self, mut doc: Document) -> AuthResult<CustomerView> {
        let password = match doc.get("password") {
            Some(Value::String(p)) if !p.is_empty() => p.clone(),
            _ => return Err(AuthError::Invalid("`password` can't be blank".into())),
        };

        for field in ["email", "username"] {
            if let Some(Value::String(value)) = doc.get(field) {
                let taken = self
                    .customers
                    .count(Some(&single(field, value)))
                    .await?;
                if taken > 0 {
                    return Err(AuthError::AlreadyTaken {
                        field,
                        value: value.clone(),
                    });
                }
            }
        }

        let email = doc.get("email").cloned();
        let username = doc.get("username").cloned();
        doc.insert("password".into(), Value::String(hash_password(password).await?));

        // A concurrent sign-up can pass the check above; the unique indexes
        // on email and username settle it.
        let record = match self.customers.create(doc).await {
            Ok(record) => record,
            Err(StoreError::Sqlx(err)) if is_unique_violation(&err) => {
                let (field, value) = if err.to_string().contains("username") {
                    ("username", username)
                } else {
                    ("email", email)
                };
                return Err(AuthError::AlreadyTaken {
                    field,
                    value: value.and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default(),
                });
            }
            Err(err) => return Err(err.into()),
        };
        info!("registered customer {}", record.id);
        Ok(record.into())
    }

    /// Check credentials and issue a fresh token.
    pub async fn login(
        &self,
        credentials: Credentials,
    ) -> AuthResult<(AccessToken, Record<Customer>)> {
        let lookup = match (&credentials.email, &credentials.username) {
            (Some(email), _) => single("email", email),
            (None, Some(username)) => single("username", username),
            (None, None) => return Err(AuthError::LoginFailed),
        };
        let password = credentials.password.ok_or(AuthError::LoginFailed)?;

        let customer = self
            .customers
            .find_one(&Filter::with_where(lookup))
            .await?
            .ok_or(AuthError::LoginFailed)?;

        if !verify_password(password, customer.data.password.clone()).await? {
            debug!("wrong password for customer {}", customer.id);
            return Err(AuthError::LoginFailed);
        }

        let ttl = match credentials.ttl {
            Some(ttl) if ttl > 0 => ttl.min(MAX_TOKEN_TTL),
            _ => DEFAULT_TOKEN_TTL,
        };
        let token = self.issue_token(customer.id, ttl).await?;
        Ok((token, customer))
    }

    pub async fn issue_token(&self, user_id: i64, ttl: i64) -> AuthResult<AccessToken> {
        let token = AccessToken {
            id: format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
            ttl,
            created: Utc::now(),
            user_id,
        };

        sqlx::query("INSERT INTO access_tokens (id, user_id, ttl, created) VALUES (?, ?, ?, ?)")
            .bind(&token.id)
            .bind(token.user_id)
            .bind(token.ttl)
            .bind(token.created)
            .execute(&*self.db)
            .await?;

        debug!("issued token for customer {}", user_id);
        Ok(token)
    }

    /// The live token with this id, if any.
    pub async fn resolve_token(&self, id: &str) -> AuthResult<Option<AccessToken>> {
        let token = sqlx::query_as::<_, AccessToken>(
            "SELECT id, user_id, ttl, created FROM access_tokens WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;

        match token {
            Some(token) if token.is_expired_at(Utc::now()) => {
                self.revoke(&token.id).await?;
                debug!("expired token for customer {} removed", token.user_id);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Delete a token; returns whether it existed.
    pub async fn revoke(&self, id: &str) -> AuthResult<bool> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn change_password(
        &self,
        token: &AccessToken,
        old_password: String,
        new_password: String,
    ) -> AuthResult<()> {
        if new_password.is_empty() {
            return Err(AuthError::Invalid("`newPassword` can't be blank".into()));
        }

        let customer = self.customers.get(token.user_id).await?;
        if !verify_password(old_password, customer.data.password).await? {
            return Err(AuthError::InvalidPassword);
        }

        let hash = hash_password(new_password).await?;
        self.customers
            .update_attributes(token.user_id, single("password", &hash))
            .await?;
        info!("customer {} changed password", token.user_id);
        Ok(())
    }

    /// Load a customer on behalf of `token`; only the owner may read it.
    pub async fn find_customer(&self, token: &AccessToken, id: i64) -> AuthResult<CustomerView> {
        ensure_owner(token, id)?;
        Ok(self.customers.get(id).await?.into())
    }

    /// All live tokens of a customer, oldest first; owner only.
    pub async fn tokens_for(&self, token: &AccessToken, id: i64) -> AuthResult<Vec<AccessToken>> {
        ensure_owner(token, id)?;
        let now = Utc::now();
        let tokens = sqlx::query_as::<_, AccessToken>(
            "SELECT id, user_id, ttl, created FROM access_tokens WHERE user_id = ? ORDER BY created",
        )
        .bind(id)
        .fetch_all(&*self.db)
        .await?;
        Ok(tokens
            .into_iter()
            .filter(|t| !t.is_expired_at(now))
            .collect())
    }
}

fn ensure_owner(token: &AccessToken, id: i64) -> AuthResult<()> {
    if token.user_id == id {
        Ok(())
    } else {
        Err(AuthError::Unauthorized(format!(
            "customer {} is not accessible with this token",
            id
        )))
    }
}

fn single(field: &str, value: &str) -> Document {
    let mut doc = Document::new();
    doc.insert(field.to_string(), json!(value));
    doc
}

async fn hash_password(password: String) -> AuthResult<String> {
    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hash(e.to_string()))
    })
    .await?
}

async fn verify_password(password: String, hash: String) -> AuthResult<bool> {
    task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash).map_err(|e| AuthError::Hash(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await?
}

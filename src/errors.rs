use crate::services::{
    auth_service::AuthError, memory_store::StoreError, storage_service::StorageError,
};
use axum::{
    Json,
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        let message = msg.into();
        tracing::error!("internal error: {}", message);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for 401 Unauthorized
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

/// Extractor rejections keep axum's status and text but use our envelope.
macro_rules! from_rejection {
    ($($rejection:ty),+) => {
        $(impl From<$rejection> for AppError {
            fn from(rejection: $rejection) -> Self {
                AppError::new(rejection.status(), rejection.body_text())
            }
        })+
    };
}

from_rejection!(JsonRejection, PathRejection, QueryRejection, MultipartRejection);

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::Duplicate { .. } => StatusCode::CONFLICT,
            StoreError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            StoreError::Sqlx(_) | StoreError::Json(_) => {
                return AppError::internal(err.to_string());
            }
        };
        AppError::new(status, err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        let status = match &err {
            StorageError::ContainerNotFound(_) | StorageError::FileNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            StorageError::ContainerAlreadyExists(_) => StatusCode::CONFLICT,
            StorageError::InvalidName { .. } => StatusCode::BAD_REQUEST,
            StorageError::Io(_) => return AppError::internal(err.to_string()),
        };
        AppError::new(status, err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let status = match err {
            AuthError::Store(inner) => return inner.into(),
            AuthError::LoginFailed | AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::InvalidPassword => StatusCode::BAD_REQUEST,
            AuthError::AlreadyTaken { .. } | AuthError::Invalid(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AuthError::Hash(_) | AuthError::Sqlx(_) | AuthError::Join(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            return AppError::internal(err.to_string());
        }
        AppError::new(status, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn service_errors_map_to_statuses() {
        let cases: Vec<(AppError, StatusCode)> = vec![
            (
                StoreError::NotFound { model: "widget", id: 3 }.into(),
                StatusCode::NOT_FOUND,
            ),
            (
                StoreError::Validation { model: "widget", reason: "x".into() }.into(),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                StoreError::InvalidQuery("bad".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                StorageError::ContainerAlreadyExists("c".into()).into(),
                StatusCode::CONFLICT,
            ),
            (
                StorageError::Io(io::Error::other("disk")).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AuthError::LoginFailed.into(), StatusCode::UNAUTHORIZED),
            (
                AuthError::Store(StoreError::NotFound { model: "customer", id: 1 }).into(),
                StatusCode::NOT_FOUND,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status, status, "{}", err);
        }
    }

    #[test]
    fn rejections_keep_their_status() {
        let err: AppError = JsonRejection::from(
            axum::extract::rejection::MissingJsonContentType::default(),
        )
        .into();
        assert_eq!(err.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(err.message.contains("Content-Type"));
    }

    #[test]
    fn message_is_kept() {
        let err: AppError = StoreError::NotFound { model: "widget", id: 3 }.into();
        assert_eq!(err.message, "widget with id 3 not found");
    }
}

//! Customer registration, login sessions and owner-only reads.

use crate::{
    errors::AppError,
    handlers::access_token::require_token,
    models::{
        customer::{AccessToken, CustomerView},
        document::Document,
    },
    services::auth_service::{AuthService, Credentials},
};
use axum::{
    Json,
    extract::{
        Path, Query, RawQuery, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub include: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: AccessToken,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<CustomerView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordReq {
    pub old_password: String,
    pub new_password: String,
}

/// POST `/customers`
pub async fn create_customer(
    State(auth): State<AuthService>,
    body: Result<Json<Document>, JsonRejection>,
) -> Result<Json<CustomerView>, AppError> {
    let Json(doc) = body?;
    Ok(Json(auth.register(doc).await?))
}

/// POST `/customers/login[?include=user]`
pub async fn login(
    State(auth): State<AuthService>,
    query: Result<Query<LoginQuery>, QueryRejection>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let (Query(q), Json(credentials)) = (query?, body?);
    let (token, customer) = auth.login(credentials).await?;
    let user = (q.include.as_deref() == Some("user")).then(|| CustomerView::from(customer));
    Ok(Json(LoginResponse { token, user }))
}

/// POST `/customers/logout`
pub async fn logout(
    State(auth): State<AuthService>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let token = require_token(&auth, &headers, query.as_deref()).await?;
    auth.revoke(&token.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/customers/change-password`
pub async fn change_password(
    State(auth): State<AuthService>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Result<Json<ChangePasswordReq>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(req) = body?;
    let token = require_token(&auth, &headers, query.as_deref()).await?;
    auth.change_password(&token, req.old_password, req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/customers/{id}`
pub async fn get_customer(
    State(auth): State<AuthService>,
    id: Result<Path<i64>, PathRejection>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Json<CustomerView>, AppError> {
    let Path(id) = id?;
    let token = require_token(&auth, &headers, query.as_deref()).await?;
    Ok(Json(auth.find_customer(&token, id).await?))
}

/// GET `/customers/{id}/accessTokens`
pub async fn access_tokens(
    State(auth): State<AuthService>,
    id: Result<Path<i64>, PathRejection>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Json<Vec<AccessToken>>, AppError> {
    let Path(id) = id?;
    let token = require_token(&auth, &headers, query.as_deref()).await?;
    Ok(Json(auth.tokens_for(&token, id).await?))
}

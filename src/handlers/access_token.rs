//! Locating the caller's access token on a request.

use crate::{
    errors::AppError, models::customer::AccessToken, services::auth_service::AuthService,
};
use axum::http::{HeaderMap, header};

/// The token id carried by a request: the `Authorization` header (raw or
/// `Bearer <id>`) wins over the `access_token` query parameter.
pub fn token_id(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    from_header.or_else(|| {
        form_urlencoded::parse(query?.as_bytes())
            .find(|(key, value)| key == "access_token" && !value.is_empty())
            .map(|(_, value)| value.into_owned())
    })
}

/// Resolve the caller's token or fail with 401.
pub async fn require_token(
    auth: &AuthService,
    headers: &HeaderMap,
    query: Option<&str>,
) -> Result<AccessToken, AppError> {
    let id = token_id(headers, query)
        .ok_or_else(|| AppError::unauthorized("authorization required"))?;
    auth.resolve_token(&id)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid or expired access token"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_forms_and_query_fallback() {
        let mut headers = HeaderMap::new();
        assert_eq!(token_id(&headers, Some("access_token=q1")), Some("q1".into()));
        assert_eq!(token_id(&headers, Some("other=1")), None);
        assert_eq!(token_id(&headers, None), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("raw-id"));
        assert_eq!(token_id(&headers, Some("access_token=q1")), Some("raw-id".into()));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(token_id(&headers, None), Some("abc".into()));
    }
}

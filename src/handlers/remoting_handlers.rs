//! HTTP wrappers around the remote methods.
//!
//! Every method answers `{"data": result}` except `geopoint`, which answers
//! the point itself, and `binary`, which answers raw bytes.

use crate::{
    errors::AppError,
    handlers::remote_args::RemoteArgs,
    services::remote_methods::{self, BINARY_PAYLOAD, Greeter},
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, RawQuery},
    http::{HeaderMap, header},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::{Value, json};

fn data(value: impl Serialize) -> Json<Value> {
    Json(json!({ "data": value }))
}

pub async fn get_secret() -> Json<Value> {
    data(remote_methods::get_secret())
}

pub async fn transform(
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let args = RemoteArgs::collect(query.as_deref(), &headers, &body)?;
    Ok(data(remote_methods::transform(&args.string("str")?)))
}

pub async fn geopoint(
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let args = RemoteArgs::collect(query.as_deref(), &headers, &body)?;
    Ok(Json(remote_methods::geopoint(args.geo_point("here")?)))
}

pub async fn list(
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let args = RemoteArgs::collect(query.as_deref(), &headers, &body)?;
    Ok(data(remote_methods::list(&args.object("filter")?)))
}

pub async fn get_auth(headers: HeaderMap) -> Json<Value> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    data(remote_methods::get_auth(raw))
}

pub async fn binary() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Bytes::from_static(BINARY_PAYLOAD),
    )
}

pub async fn favorite_person() -> Json<Value> {
    data(remote_methods::favorite_person())
}

pub async fn get_name(Path(name): Path<String>) -> Json<Value> {
    data(Greeter::new(name).get_name())
}

pub async fn greet(
    Path(name): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let args = RemoteArgs::collect(query.as_deref(), &headers, &body)?;
    Ok(data(Greeter::new(name).greet(&args.string("other")?)))
}

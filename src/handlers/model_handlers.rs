//! Generic CRUD handlers, mounted once per datastore model.
//!
//! `filter` and `where` arrive either as JSON text (`?filter={"limit":1}`)
//! or in bracket notation (`?filter[limit]=1`).

use crate::{
    errors::AppError,
    handlers::remote_args::RemoteArgs,
    models::{document::Document, document::parse_document, filter::Filter},
    services::memory_store::{Model, ModelStore, Record},
};
use axum::{
    Json,
    extract::{
        Path, RawQuery, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::HeaderMap,
};
use serde_json::{Value, json};

fn query_args(query: Option<&str>) -> Result<RemoteArgs, AppError> {
    RemoteArgs::collect(query, &HeaderMap::new(), &[])
}

fn parse_filter(query: Option<&str>) -> Result<Filter, AppError> {
    let filter = match query_args(query)?.get("filter") {
        None => Filter::from_query(None),
        Some(Value::String(text)) => Filter::from_query(Some(text)),
        Some(Value::Object(doc)) => Filter::from_document(doc.clone()),
        Some(_) => Err("`filter` must be an object".to_string()),
    };
    filter.map_err(AppError::bad_request)
}

fn parse_where(query: Option<&str>) -> Result<Option<Document>, AppError> {
    match query_args(query)?.get("where") {
        None => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => parse_document(text).map(Some).map_err(AppError::bad_request),
        Some(Value::Object(doc)) => Ok(Some(doc.clone())),
        Some(_) => Err(AppError::bad_request("`where` must be an object")),
    }
}

/// GET `/{plural}?filter=`: matching records.
pub async fn find<T: Model>(
    State(store): State<ModelStore<T>>,
    RawQuery(query): RawQuery,
) -> Result<Json<Vec<Record<T>>>, AppError> {
    Ok(Json(store.find(&parse_filter(query.as_deref())?).await?))
}

/// GET `/{plural}/findOne?filter=`: first match or 404.
pub async fn find_one<T: Model>(
    State(store): State<ModelStore<T>>,
    RawQuery(query): RawQuery,
) -> Result<Json<Record<T>>, AppError> {
    store
        .find_one(&parse_filter(query.as_deref())?)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("no {} matches the filter", T::NAME)))
}

/// GET `/{plural}/count?where=`
pub async fn count<T: Model>(
    State(store): State<ModelStore<T>>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, AppError> {
    let where_clause = parse_where(query.as_deref())?;
    let count = store.count(where_clause.as_ref()).await?;
    Ok(Json(json!({ "count": count })))
}

pub async fn create<T: Model>(
    State(store): State<ModelStore<T>>,
    body: Result<Json<Document>, JsonRejection>,
) -> Result<Json<Record<T>>, AppError> {
    let Json(doc) = body?;
    Ok(Json(store.create(doc).await?))
}

pub async fn upsert<T: Model>(
    State(store): State<ModelStore<T>>,
    body: Result<Json<Document>, JsonRejection>,
) -> Result<Json<Record<T>>, AppError> {
    let Json(doc) = body?;
    Ok(Json(store.upsert(doc).await?))
}

pub async fn find_by_id<T: Model>(
    State(store): State<ModelStore<T>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Record<T>>, AppError> {
    let Path(id) = id?;
    Ok(Json(store.get(id).await?))
}

pub async fn update_attributes<T: Model>(
    State(store): State<ModelStore<T>>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<Document>, JsonRejection>,
) -> Result<Json<Record<T>>, AppError> {
    let (Path(id), Json(patch)) = (id?, body?);
    Ok(Json(store.update_attributes(id, patch).await?))
}

pub async fn delete_by_id<T: Model>(
    State(store): State<ModelStore<T>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(id) = id?;
    let count = store.delete_by_id(id).await?;
    Ok(Json(json!({ "count": count })))
}

pub async fn exists<T: Model>(
    State(store): State<ModelStore<T>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let Path(id) = id?;
    let exists = store.exists(id).await?;
    Ok(Json(json!({ "exists": exists })))
}

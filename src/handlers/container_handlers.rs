//! HTTP handlers for containers and their files.
//! Uploads and downloads stream through `StorageService` without buffering
//! whole files in memory.

use crate::{
    errors::AppError,
    models::container::{Container, FileInfo},
    services::storage_service::{ContainerStore, StorageService},
};
use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, State,
        multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::io;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// Request body for `POST /containers`.
#[derive(Debug, Deserialize)]
pub struct CreateContainerReq {
    pub name: String,
}

/// GET `/containers`: every container, sorted by name.
pub async fn list_containers(
    State(service): State<StorageService>,
) -> Result<Json<Vec<Container>>, AppError> {
    Ok(Json(service.list_containers().await?))
}

/// POST `/containers`
pub async fn create_container(
    State(service): State<StorageService>,
    body: Result<Json<CreateContainerReq>, JsonRejection>,
) -> Result<Json<Container>, AppError> {
    let Json(req) = body?;
    Ok(Json(service.create_container(&req.name).await?))
}

/// DELETE `/containers`: remove every container.
pub async fn destroy_all_containers(
    State(service): State<StorageService>,
) -> Result<StatusCode, AppError> {
    service.destroy_all().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_container(
    State(service): State<StorageService>,
    Path(container): Path<String>,
) -> Result<Json<Container>, AppError> {
    Ok(Json(service.get_container(&container).await?))
}

pub async fn destroy_container(
    State(service): State<StorageService>,
    Path(container): Path<String>,
) -> Result<StatusCode, AppError> {
    service.destroy_container(&container).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_files(
    State(service): State<StorageService>,
    Path(container): Path<String>,
) -> Result<Json<Vec<FileInfo>>, AppError> {
    Ok(Json(service.list_files(&container).await?))
}

pub async fn get_file(
    State(service): State<StorageService>,
    Path((container, file)): Path<(String, String)>,
) -> Result<Json<FileInfo>, AppError> {
    Ok(Json(service.get_file(&container, &file).await?))
}

pub async fn remove_file(
    State(service): State<StorageService>,
    Path((container, file)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    service.remove_file(&container, &file).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/containers/{container}/upload`: multipart form.
///
/// File parts are stored under their filename and reported per field;
/// plain parts are echoed back under `fields`.
pub async fn upload(
    State(service): State<StorageService>,
    Path(container): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, AppError> {
    let mut multipart = multipart?;
    // Fail before reading the body when the container is missing.
    service.get_container(&container).await?;

    let mut files = Map::new();
    let mut fields = Map::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("malformed multipart body: {}", err)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let stream = field.map_err(io::Error::other);
                let uploaded = service
                    .upload_file_stream(&container, &file_name, content_type, stream)
                    .await?;
                debug!("uploaded {}/{} ({} bytes)", container, file_name, uploaded.size);
                let entry = serde_json::to_value(uploaded)
                    .map_err(|err| AppError::internal(err.to_string()))?;
                push_entry(&mut files, field_name, entry);
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| AppError::bad_request(format!("unreadable field: {}", err)))?;
                push_entry(&mut fields, field_name, Value::String(text));
            }
        }
    }

    Ok(Json(json!({ "result": { "files": files, "fields": fields } })))
}

fn push_entry(target: &mut Map<String, Value>, key: String, value: Value) {
    match target.entry(key).or_insert_with(|| Value::Array(Vec::new())) {
        Value::Array(items) => items.push(value),
        other => *other = Value::Array(vec![value]),
    }
}

/// GET `/containers/{container}/download/{file}` as a streaming response.
pub async fn download(
    State(service): State<StorageService>,
    Path((container, file)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let (info, handle) = service.open_file(&container, &file).await?;
    let body = Body::from_stream(ReaderStream::new(handle));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_file_headers(response.headers_mut(), &info);
    Ok(response)
}

fn set_file_headers(headers: &mut HeaderMap, info: &FileInfo) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(info.size));
    if let Ok(value) = HeaderValue::from_str(&info.mtime.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}

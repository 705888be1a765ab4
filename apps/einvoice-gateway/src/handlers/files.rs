//! Invoice uploads and signed downloads

use std::sync::Arc;

use axum::{
    extract::{multipart::Multipart, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use einvoice_report::ReportError;

use super::{read_file_part, AuthUser};
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::StoredFile;

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(rename = "fileName")]
    pub file_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ObjectQuery {
    pub filename: String,
    pub expires: i64,
    pub signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileLink {
    pub file_name: String,
    pub uploaded_date: String,
    pub url: String,
}

fn presign(state: &AppState, file: &StoredFile) -> Result<String, ApiError> {
    Ok(state
        .objects
        .presign(&file.file_key, &file.file_name, state.config.download_ttl)?)
}

/// POST /upload/v1
pub async fn upload(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let upload = read_file_part(&mut multipart, "invoice").await?;
    if upload.bytes.is_empty() {
        return Err(ReportError::EmptyInput.into());
    }

    let content_type = upload
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let file_key = state.objects.put(upload.bytes, &content_type).await?;

    let file = StoredFile {
        file_name: upload.file_name,
        file_key,
        uploaded_date: state.clock.today().format("%d-%m-%Y").to_string(),
    };
    state.users.add_file(&user.username, &file).await?;

    info!(user = %user.username, file = %file.file_name, "Uploaded invoice");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "File uploaded successfully": file.file_name })),
    ))
}

/// GET /download/v1?fileName=
pub async fn download(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<DownloadQuery>,
) -> Result<Json<Value>, ApiError> {
    let file = state
        .users
        .find_file(&user.username, &query.file_name)
        .await?
        .ok_or(ApiError::FileNotFound)?;

    Ok(Json(json!({ "url": presign(&state, &file)? })))
}

/// GET /download/all, newest upload first
pub async fn download_all(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let files = state
        .users
        .files(&user.username)
        .await?
        .into_iter()
        .rev()
        .map(|file| {
            Ok(FileLink {
                url: presign(&state, &file)?,
                file_name: file.file_name,
                uploaded_date: file.uploaded_date,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(Json(json!({ "files": files })))
}

/// GET /objects/:key, reached through a presigned link
pub async fn fetch_object(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<ObjectQuery>,
) -> Result<Response, ApiError> {
    state
        .objects
        .verify(&key, &query.filename, query.expires, &query.signature)?;
    let object = state.objects.get(&key).await?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        query.filename.replace(['"', '\\'], "_")
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    let content_type = HeaderValue::from_str(&object.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        object.bytes,
    )
        .into_response())
}

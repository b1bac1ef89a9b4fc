//! Public site endpoints
//!
//! - GET /api/ping - Liveness check
//! - GET /storage/{*path} - Stored course and news images

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    Json,
};
use serde::Serialize;

use crate::api::common::ApiPath;
use crate::api::middleware::{ApiError, AppState};
use crate::services::storage::{content_type_for, StorageError, DOCUMENTS_DIR};

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub pong: bool,
}

/// GET /api/ping
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse { pong: true })
}

/// GET /storage/{*path}
///
/// Documents are only reachable through the download endpoints.
pub async fn serve_storage(State(state): State<AppState>, ApiPath(path): ApiPath<String>) -> Result<Response, ApiError> {
    let path = path.trim_start_matches('/');
    if path.split('/').next() == Some(DOCUMENTS_DIR) {
        return Err(ApiError::not_found("File not found"));
    }

    let data = state.storage.read(path).await.map_err(|e| match e {
        StorageError::NotFound | StorageError::InvalidPath(_) => ApiError::not_found("File not found"),
        StorageError::Io(e) => ApiError::internal_error(format!("Failed to read file: {}", e)),
    })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(path))
        .header(header::CACHE_CONTROL, "public, max-age=31536000, immutable")
        .body(Body::from(data))
        .map_err(|e| ApiError::internal_error(format!("Failed to build file response: {}", e)))
}

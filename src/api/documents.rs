//! Document API endpoints
//!
//! Admin:
//! - POST /api/admin/documents/upload (multipart)
//! - GET /api/admin/documents?category=&search=&page=
//! - GET|PUT|DELETE /api/admin/documents/{id}
//! - PATCH /api/admin/documents/{id}/toggle-status
//! - GET /api/admin/documents/{id}/preview, /download
//!
//! Public (active documents only):
//! - GET /api/documents, GET /api/documents/{id}
//! - GET /api/documents/{id}/preview, /download

use axum::{
    body::Body,
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{
    list_params, non_empty, ApiJson, ApiPath, MessageResponse, MultipartForm, ADMIN_DOCUMENTS_PER_PAGE,
    PUBLIC_DOCUMENTS_PER_PAGE,
};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Document, DocumentFilter, PagedResult};
use crate::services::{DocumentUpdate, DocumentUpload, FileDownload};

/// Build the admin document routes
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_documents))
        .route("/upload", post(upload_document))
        .route(
            "/{id}",
            get(get_document).put(update_document).delete(delete_document),
        )
        .route("/{id}/toggle-status", patch(toggle_document_status))
        .route("/{id}/preview", get(preview_document))
        .route("/{id}/download", get(download_document))
}

/// Build the public document routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_public_documents))
        .route("/{id}", get(get_public_document))
        .route("/{id}/preview", get(preview_public_document))
        .route("/{id}/download", get(download_public_document))
}

/// `?category=&search=&page=`
#[derive(Debug, Default, Deserialize)]
pub struct DocumentListQuery {
    pub page: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
}

impl DocumentListQuery {
    fn filter(self, active_only: bool) -> DocumentFilter {
        DocumentFilter {
            category: non_empty(self.category),
            search: non_empty(self.search),
            active_only,
        }
    }
}

/// `{ message, document }`
#[derive(Debug, Serialize)]
struct DocumentResponse {
    message: &'static str,
    document: Document,
}

/// POST /api/admin/documents/upload
async fn upload_document(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = MultipartForm::read(multipart).await?;
    let input = DocumentUpload {
        title: form.text("title"),
        description: form.text("description"),
        category: form.text("category"),
        price: form.text("price"),
        file: form.file("file"),
    };

    let document = state.document_service.upload(input, Some(auth.user.id)).await?;
    Ok((
        StatusCode::CREATED,
        Json(DocumentResponse {
            message: "Document uploaded successfully",
            document,
        }),
    ))
}

/// GET /api/admin/documents
async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<DocumentListQuery>,
) -> Result<Json<PagedResult<Document>>, ApiError> {
    let params = list_params(query.page.as_deref(), ADMIN_DOCUMENTS_PER_PAGE);
    let filter = query.filter(false);
    Ok(Json(state.document_service.list(&filter, &params).await?))
}

/// GET /api/admin/documents/{id}
async fn get_document(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> Result<Json<Document>, ApiError> {
    Ok(Json(state.document_service.get(id).await?))
}

/// PUT /api/admin/documents/{id}
async fn update_document(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<DocumentUpdate>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let document = state.document_service.update(id, body).await?;
    Ok(Json(DocumentResponse {
        message: "Document updated successfully",
        document,
    }))
}

/// DELETE /api/admin/documents/{id}
async fn delete_document(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.document_service.delete(id).await?;
    Ok(Json(MessageResponse::new("Document deleted successfully")))
}

/// PATCH /api/admin/documents/{id}/toggle-status
async fn toggle_document_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let document = state.document_service.toggle_status(id).await?;
    Ok(Json(DocumentResponse {
        message: "Document status updated successfully",
        document,
    }))
}

/// GET /api/admin/documents/{id}/preview
async fn preview_document(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> Result<Response, ApiError> {
    let document = state.document_service.get(id).await?;
    let file = state.document_service.preview(&document).await?;
    file_response(file, Disposition::Inline)
}

/// GET /api/admin/documents/{id}/download
async fn download_document(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> Result<Response, ApiError> {
    let document = state.document_service.get(id).await?;
    let file = state.document_service.download(&document).await?;
    file_response(file, Disposition::Attachment)
}

/// GET /api/documents
async fn list_public_documents(
    State(state): State<AppState>,
    Query(query): Query<DocumentListQuery>,
) -> Result<Json<PagedResult<Document>>, ApiError> {
    let params = list_params(query.page.as_deref(), PUBLIC_DOCUMENTS_PER_PAGE);
    let filter = query.filter(true);
    Ok(Json(state.document_service.list(&filter, &params).await?))
}

/// GET /api/documents/{id}
async fn get_public_document(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> Result<Json<Document>, ApiError> {
    Ok(Json(state.document_service.view(id).await?))
}

/// GET /api/documents/{id}/preview
async fn preview_public_document(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> Result<Response, ApiError> {
    let document = state.document_service.get_active(id).await?;
    let file = state.document_service.preview(&document).await?;
    file_response(file, Disposition::Inline)
}

/// GET /api/documents/{id}/download
async fn download_public_document(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> Result<Response, ApiError> {
    let document = state.document_service.get_active(id).await?;
    let file = state.document_service.download(&document).await?;
    file_response(file, Disposition::Attachment)
}

#[derive(Debug, Clone, Copy)]
enum Disposition {
    Inline,
    Attachment,
}

/// Send a stored file with its content type and disposition
fn file_response(file: FileDownload, disposition: Disposition) -> Result<Response, ApiError> {
    let kind = match disposition {
        Disposition::Inline => "inline",
        Disposition::Attachment => "attachment",
    };
    let content_disposition = format!("{}; filename=\"{}\"", kind, header_file_name(&file.file_name));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.content_type)
        .header(header::CONTENT_LENGTH, file.data.len())
        .header(header::CONTENT_DISPOSITION, content_disposition)
        .body(Body::from(file.data))
        .map_err(|e| ApiError::internal_error(format!("Failed to build file response: {}", e)))
}

/// File name safe to quote inside a Content-Disposition header
fn header_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim().is_empty() {
        "download".to_string()
    } else {
        cleaned
    }
}

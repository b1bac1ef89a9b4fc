//! Common API utilities and shared types
//!
//! Pagination defaults, query-string helpers, message bodies, the JSON and
//! path extractors that answer with [`ApiError`], and the multipart form
//! reader used by the upload endpoints.

use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{FromRequest, FromRequestParts, Multipart, Path, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::api::middleware::ApiError;
use crate::models::ListParams;
use crate::services::validation::{label, parse_bool};
use crate::services::UploadedFile;

// ============================================================================
// Pagination Defaults
// ============================================================================

pub const ADMIN_DOCUMENTS_PER_PAGE: u32 = 10;
pub const PUBLIC_DOCUMENTS_PER_PAGE: u32 = 12;
pub const COURSES_PER_PAGE: u32 = 15;
pub const NEWS_PER_PAGE: u32 = 15;
pub const TESTS_PER_PAGE: u32 = 15;
pub const USERS_PER_PAGE: u32 = 10;

/// Page number with the endpoint's fixed page size; a missing or
/// unparsable page means the first one
pub fn list_params(page: Option<&str>, per_page: u32) -> ListParams {
    let page = page.and_then(|p| p.trim().parse().ok()).unwrap_or(1);
    ListParams::new(page, per_page)
}

// ============================================================================
// Query Types
// ============================================================================

/// `?search=&page=`
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub page: Option<String>,
    pub search: Option<String>,
}

/// Treat empty query values as absent
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Boolean filter; unrecognised values count as false
pub fn query_flag(value: Option<&str>) -> Option<bool> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    Some(parse_bool(value).unwrap_or(false))
}

/// Integer filter; unparsable values are ignored
pub fn query_id(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse().ok())
}

// ============================================================================
// Extractors
// ============================================================================

/// JSON body whose type errors become field-level validation errors
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            let (field, message) = describe_data_error(&err.body_text());
            ApiError::validation_error(&field, message)
        }
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::bad_request("Expected request with `Content-Type: application/json`")
        }
        other if other.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            ApiError::payload_too_large("The request body is too large")
        }
        other => ApiError::bad_request(format!("Invalid JSON body: {}", other.body_text())),
    }
}

/// Split a deserialization failure into the offending field key
/// (`questions.0.points`) and a readable message.
fn describe_data_error(text: &str) -> (String, String) {
    let detail = text.split_once("target type: ").map_or(text, |(_, d)| d);
    let detail = detail.split(" at line ").next().unwrap_or(detail);

    let (path, message) = match detail.split_once(": ") {
        Some((path, message)) if is_field_path(path) => (field_key(path), message),
        _ => (String::new(), detail),
    };

    if let Some(missing) = message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split('`').next())
    {
        let field = if path.is_empty() {
            missing.to_string()
        } else {
            format!("{}.{}", path, missing)
        };
        let message = format!("The {} field is required.", label(&field));
        return (field, message);
    }

    let field = if path.is_empty() { "body".to_string() } else { path };
    let message = format!("The {} field has an invalid value ({}).", label(&field), message);
    (field, message)
}

fn is_field_path(path: &str) -> bool {
    !path.is_empty() && path != "." && !path.contains(char::is_whitespace)
}

/// `questions[0].options` -> `questions.0.options`
fn field_key(path: &str) -> String {
    path.replace('[', ".").replace(']', "").trim_start_matches('.').to_string()
}

/// Path parameters; values that do not parse name no resource, so they are 404
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(PathRejection::FailedToDeserializePathParams(err)) => {
                tracing::debug!(path = %parts.uri.path(), "Unparsable path parameter: {}", err.body_text());
                Err(ApiError::not_found("Resource not found"))
            }
            Err(rejection) => {
                tracing::error!("Path extraction failed: {}", rejection.body_text());
                Err(ApiError::internal_error("Internal server error"))
            }
        }
    }
}

// ============================================================================
// Response Bodies
// ============================================================================

/// `{ "message": ... }`
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Multipart Forms
// ============================================================================

/// A multipart body split into text fields and uploaded files
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    /// Read every part of the body; later parts with the same name win
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .map(str::to_string)
                        .unwrap_or_else(|| "application/octet-stream".to_string());
                    let data = field.bytes().await.map_err(multipart_error)?;
                    // Browsers send an empty part for an untouched file input
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    form.files.insert(
                        name,
                        UploadedFile {
                            file_name,
                            content_type,
                            data: data.to_vec(),
                        },
                    );
                }
                None => {
                    let text = field.text().await.map_err(multipart_error)?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// Remove and return a text field
    pub fn text(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    /// Remove and return an uploaded file
    pub fn file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    #[cfg(test)]
    pub fn with_text(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("The uploaded file is too large")
    } else {
        ApiError::bad_request(format!("Invalid multipart body: {}", err.body_text()))
    }
}

//! Pieces shared by the document, course, news and test services

use crate::services::category::CategoryServiceError;
use crate::services::storage::{StorageError, UploadedFile};
use crate::services::validation::ValidationErrors;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum ContentServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ValidationError(ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl ContentServiceError {
    pub fn not_found(what: &str) -> Self {
        ContentServiceError::NotFound(format!("{} not found", what))
    }
}

impl From<ValidationErrors> for ContentServiceError {
    fn from(errors: ValidationErrors) -> Self {
        ContentServiceError::ValidationError(errors)
    }
}

impl From<StorageError> for ContentServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => ContentServiceError::NotFound(err.to_string()),
            StorageError::InvalidPath(_) => ContentServiceError::BadRequest(err.to_string()),
            StorageError::Io(e) => ContentServiceError::InternalError(anyhow::Error::new(e).context("Storage failure")),
        }
    }
}

impl From<CategoryServiceError> for ContentServiceError {
    fn from(err: CategoryServiceError) -> Self {
        match err {
            CategoryServiceError::NotFound => ContentServiceError::not_found("Category"),
            CategoryServiceError::ValidationError(errors) => ContentServiceError::ValidationError(errors),
            CategoryServiceError::InUse(message) => ContentServiceError::BadRequest(message),
            CategoryServiceError::InternalError(e) => ContentServiceError::InternalError(e),
        }
    }
}

/// A stored file ready to be sent back to a client
#[derive(Debug, Clone)]
pub struct FileDownload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Check an uploaded file's extension and size
pub fn validate_file(
    errors: &mut ValidationErrors,
    field: &str,
    file: &UploadedFile,
    allowed: &[String],
    max_bytes: u64,
) {
    let ext = file.extension().unwrap_or_default();
    if !allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)) {
        errors.add(
            field,
            format!("The {} field must be a file of type: {}.", field.replace('_', " "), allowed.join(", ")),
        );
    }
    if file.size() > max_bytes {
        errors.add(
            field,
            format!(
                "The {} field must not be greater than {} kilobytes.",
                field.replace('_', " "),
                max_bytes / 1024
            ),
        );
    }
}

/// Accept RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM` or a bare date
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Trimmed optional text; blank counts as absent
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

//! Document model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A downloadable file offered for sale or free download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    /// Name of the linked category, joined in on read
    pub category_name: Option<String>,
    pub price: f64,
    /// Path relative to the storage root
    pub file_path: Option<String>,
    /// Original client-side file name
    pub file_name: String,
    /// MIME type reported by the uploader
    pub file_type: String,
    pub file_size: i64,
    pub is_active: bool,
    /// Number of purchases
    pub buy_number: i64,
    pub views_count: i64,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Lowercased extension of the stored file, if any
    pub fn extension(&self) -> Option<String> {
        let path = self.file_path.as_deref().unwrap_or(&self.file_name);
        std::path::Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }

    /// Only PDFs can be previewed inline
    pub fn is_previewable(&self) -> bool {
        self.extension().as_deref() == Some("pdf")
    }
}

/// Row values for a new document
#[derive(Debug, Clone)]
pub struct CreateDocumentInput {
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub price: f64,
    pub file_path: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub created_by: Option<i64>,
}

/// Editable metadata of a document
#[derive(Debug, Clone)]
pub struct UpdateDocumentInput {
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub price: f64,
    pub is_active: Option<bool>,
}

/// Filters for document listings
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    /// Category name
    pub category: Option<String>,
    /// Substring of title or description
    pub search: Option<String>,
    /// Restrict to active documents
    pub active_only: bool,
}

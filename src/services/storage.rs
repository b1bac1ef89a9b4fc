//! Public file storage
//!
//! Uploaded documents and images live on local disk under a single root.
//! Callers only ever see paths relative to that root (`documents/...`,
//! `courses/images/...`), which is also what the database stores.

use chrono::Utc;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

pub const DOCUMENTS_DIR: &str = "documents";
pub const COURSE_IMAGES_DIR: &str = "courses/images";
pub const COURSE_CERTIFICATES_DIR: &str = "courses/certificates";
pub const NEWS_IMAGES_DIR: &str = "news/images";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("File not found on disk")]
    NotFound,

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file received from a multipart upload
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Lowercased extension of the client-side file name
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .map(|e| e.to_lowercase())
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a relative storage path onto disk, refusing anything that could
    /// escape the root
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let path = Path::new(relative);
        let mut parts = 0;
        for component in path.components() {
            match component {
                Component::Normal(_) => parts += 1,
                Component::CurDir => {}
                _ => return Err(StorageError::InvalidPath(relative.to_string())),
            }
        }
        if parts == 0 {
            return Err(StorageError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(path))
    }

    /// Write bytes to `{dir}/{file_name}` and return the relative path
    pub async fn store(&self, dir: &str, file_name: &str, data: &[u8]) -> Result<String, StorageError> {
        let relative = format!("{}/{}", dir.trim_matches('/'), file_name);
        let target = self.resolve(&relative)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, data).await?;
        tracing::info!(path = %relative, size = data.len(), "Stored file");
        Ok(relative)
    }

    /// Store an uploaded document as `documents/{unix_ts}_{name}`
    ///
    /// A same-second upload of the same name gets a counter after the
    /// timestamp instead of overwriting.
    pub async fn store_document(&self, file: &UploadedFile) -> Result<String, StorageError> {
        let base = sanitize_file_name(&file.file_name);
        let ts = Utc::now().timestamp();
        let mut name = format!("{}_{}", ts, base);
        let mut counter = 1;
        while self.exists(&format!("{}/{}", DOCUMENTS_DIR, name)).await {
            name = format!("{}_{}_{}", ts, counter, base);
            counter += 1;
        }
        self.store(DOCUMENTS_DIR, &name, &file.data).await
    }

    /// Store an uploaded image under a random name in `dir`
    pub async fn store_image(&self, dir: &str, file: &UploadedFile) -> Result<String, StorageError> {
        let ext = file.extension().unwrap_or_else(|| "bin".to_string());
        let name = format!("{}.{}", Uuid::new_v4(), ext);
        self.store(dir, &name, &file.data).await
    }

    pub async fn read(&self, relative: &str) -> Result<Vec<u8>, StorageError> {
        let target = self.resolve(relative)?;
        match fs::read(&target).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, relative: &str) -> bool {
        match self.resolve(relative) {
            Ok(target) => fs::metadata(&target).await.map(|m| m.is_file()).unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Remove a stored file; returns whether anything was deleted
    pub async fn delete(&self, relative: &str) -> Result<bool, StorageError> {
        let target = self.resolve(relative)?;
        match fs::remove_file(&target).await {
            Ok(()) => {
                tracing::info!(path = %relative, "Deleted file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete several files, logging rather than failing on errors
    pub async fn delete_quietly(&self, paths: &[&str]) {
        for path in paths {
            if let Err(e) = self.delete(path).await {
                tracing::warn!(path = %path, error = %e, "Failed to delete stored file");
            }
        }
    }
}

/// Last path segment of a client file name with unsafe characters replaced
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// MIME type for a stored file, by extension
pub fn content_type_for(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "rtf" => "application/rtf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

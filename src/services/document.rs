//! Document service
//!
//! Uploaded files (PDFs, Word documents, plain and rich text) with a title,
//! a category and a price. The file itself lives in [`Storage`]; the row
//! keeps its relative path.

use crate::config::StorageConfig;
use crate::db::repositories::{DocumentRepository, DocumentTotals};
use crate::models::{
    CategoryKind, CreateDocumentInput, Document, DocumentFilter, ListParams, PagedResult, UpdateDocumentInput,
};
use crate::services::category::CategoryService;
use crate::services::content::{validate_file, ContentServiceError, FileDownload};
use crate::services::storage::{content_type_for, Storage, UploadedFile};
use crate::services::validation::ValidationErrors;
use serde::Deserialize;
use std::sync::Arc;

const MAX_TITLE_LENGTH: usize = 255;
const MAX_DESCRIPTION_LENGTH: usize = 500;
const MAX_CATEGORY_LENGTH: usize = 100;

/// Multipart upload form
#[derive(Debug, Clone, Default)]
pub struct DocumentUpload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<String>,
    pub file: Option<UploadedFile>,
}

/// JSON body of the document update endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

/// Validated metadata common to upload and update
struct DocumentFields {
    title: String,
    description: String,
    category: String,
    price: f64,
}

pub struct DocumentService {
    repo: Arc<dyn DocumentRepository>,
    categories: Arc<CategoryService>,
    storage: Arc<Storage>,
    config: StorageConfig,
}

impl DocumentService {
    pub fn new(
        repo: Arc<dyn DocumentRepository>,
        categories: Arc<CategoryService>,
        storage: Arc<Storage>,
        config: StorageConfig,
    ) -> Self {
        Self {
            repo,
            categories,
            storage,
            config,
        }
    }

    pub async fn upload(&self, input: DocumentUpload, created_by: Option<i64>) -> Result<Document, ContentServiceError> {
        let mut errors = ValidationErrors::new();
        let fields = validate_fields(
            &mut errors,
            input.title.as_deref(),
            input.description.as_deref(),
            input.category.as_deref(),
            input.price.as_deref(),
        );
        match input.file.as_ref() {
            Some(file) => validate_file(
                &mut errors,
                "file",
                file,
                &self.config.document_extensions,
                self.config.max_document_size,
            ),
            None => {
                errors.add("file", "The file field is required.");
            }
        }
        errors.finish()?;

        let (Some(fields), Some(file)) = (fields, input.file) else {
            return Err(anyhow::anyhow!("Validated document upload is incomplete").into());
        };

        let file_path = self.storage.store_document(&file).await?;

        let file_type = if file.content_type.is_empty() || file.content_type == "application/octet-stream" {
            content_type_for(&file.file_name).to_string()
        } else {
            file.content_type.clone()
        };
        let created = async {
            let category = self
                .categories
                .find_or_create_by_name(CategoryKind::Document, &fields.category)
                .await?;
            let document = self
                .repo
                .create(&CreateDocumentInput {
                    title: fields.title,
                    description: Some(fields.description),
                    category_id: Some(category.id),
                    price: fields.price,
                    file_path: file_path.clone(),
                    file_name: file.file_name.clone(),
                    file_type,
                    file_size: file.size() as i64,
                    created_by,
                })
                .await?;
            Ok::<_, ContentServiceError>(document)
        }
        .await;

        match created {
            Ok(document) => {
                tracing::info!(document_id = document.id, path = %file_path, "Document uploaded");
                Ok(document)
            }
            Err(e) => {
                self.storage.delete_quietly(&[file_path.as_str()]).await;
                Err(e)
            }
        }
    }

    pub async fn list(&self, filter: &DocumentFilter, params: &ListParams) -> Result<PagedResult<Document>, ContentServiceError> {
        let (documents, total) = self.repo.list(filter, params).await?;
        Ok(PagedResult::new(documents, total, params))
    }

    pub async fn get(&self, id: i64) -> Result<Document, ContentServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ContentServiceError::not_found("Document"))
    }

    /// Active documents only; inactive ones look missing to the public
    pub async fn get_active(&self, id: i64) -> Result<Document, ContentServiceError> {
        let document = self.get(id).await?;
        if !document.is_active {
            return Err(ContentServiceError::not_found("Document"));
        }
        Ok(document)
    }

    /// Public detail view; counts the view
    pub async fn view(&self, id: i64) -> Result<Document, ContentServiceError> {
        let mut document = self.get_active(id).await?;
        self.repo.increment_views(id).await?;
        document.views_count += 1;
        Ok(document)
    }

    pub async fn update(&self, id: i64, input: DocumentUpdate) -> Result<Document, ContentServiceError> {
        self.get(id).await?;

        let mut errors = ValidationErrors::new();
        let price = price_text(input.price.as_ref());
        let fields = validate_fields(
            &mut errors,
            input.title.as_deref(),
            input.description.as_deref(),
            input.category.as_deref(),
            price.as_deref(),
        );
        errors.finish()?;
        let Some(fields) = fields else {
            return Err(anyhow::anyhow!("Validated document update is incomplete").into());
        };

        let category = self
            .categories
            .find_or_create_by_name(CategoryKind::Document, &fields.category)
            .await?;
        self.repo
            .update(
                id,
                &UpdateDocumentInput {
                    title: fields.title,
                    description: Some(fields.description),
                    category_id: Some(category.id),
                    price: fields.price,
                    is_active: input.is_active,
                },
            )
            .await?;

        self.get(id).await
    }

    pub async fn toggle_status(&self, id: i64) -> Result<Document, ContentServiceError> {
        let mut document = self.get(id).await?;
        self.repo.set_active(id, !document.is_active).await?;
        document.is_active = !document.is_active;
        tracing::info!(document_id = id, is_active = document.is_active, "Document status toggled");
        Ok(document)
    }

    /// Delete the row and its stored file
    pub async fn delete(&self, id: i64) -> Result<(), ContentServiceError> {
        let document = self.get(id).await?;
        self.repo.delete(id).await?;
        if let Some(path) = document.file_path.as_deref() {
            self.storage.delete_quietly(&[path]).await;
        }
        tracing::info!(document_id = id, "Document deleted");
        Ok(())
    }

    /// Inline PDF view of a document
    pub async fn preview(&self, document: &Document) -> Result<FileDownload, ContentServiceError> {
        let path = stored_path(document)?;
        if !self.storage.exists(path).await {
            return Err(ContentServiceError::NotFound("File not found on disk".to_string()));
        }
        if !document.is_previewable() {
            return Err(ContentServiceError::BadRequest(
                "Preview is only available for PDF files".to_string(),
            ));
        }

        Ok(FileDownload {
            file_name: document.file_name.clone(),
            content_type: "application/pdf".to_string(),
            data: self.storage.read(path).await?,
        })
    }

    /// The stored file under its original name
    pub async fn download(&self, document: &Document) -> Result<FileDownload, ContentServiceError> {
        let path = stored_path(document)?;
        if !self.storage.exists(path).await {
            return Err(ContentServiceError::NotFound("File not found on disk".to_string()));
        }

        Ok(FileDownload {
            file_name: document.file_name.clone(),
            content_type: content_type_for(path).to_string(),
            data: self.storage.read(path).await?,
        })
    }

    pub async fn totals(&self) -> Result<DocumentTotals, ContentServiceError> {
        Ok(self.repo.totals().await?)
    }
}

fn stored_path(document: &Document) -> Result<&str, ContentServiceError> {
    document
        .file_path
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ContentServiceError::NotFound("File not found".to_string()))
}

/// A JSON price may arrive as a number or a numeric string
fn price_text(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn validate_fields(
    errors: &mut ValidationErrors,
    title: Option<&str>,
    description: Option<&str>,
    category: Option<&str>,
    price: Option<&str>,
) -> Option<DocumentFields> {
    let title = errors.required("title", title);
    if let Some(title) = title {
        errors.max_chars("title", title, MAX_TITLE_LENGTH);
    }
    let description = errors.required("description", description);
    if let Some(description) = description {
        errors.max_chars("description", description, MAX_DESCRIPTION_LENGTH);
    }
    let category = errors.required("category", category);
    if let Some(category) = category {
        errors.max_chars("category", category, MAX_CATEGORY_LENGTH);
    }
    let price = errors.number("price", price);
    if let Some(price) = price {
        errors.at_least("price", price, 0.0);
    }

    Some(DocumentFields {
        title: title?.to_string(),
        description: description?.to_string(),
        category: category?.to_string(),
        price: price?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::{SqlxCategoryRepository, SqlxDocumentRepository};
    use crate::db::{create_test_pool, migrations};
    use tempfile::TempDir;

    async fn setup_service() -> (DocumentService, TempDir) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");

        let dir = TempDir::new().unwrap();
        let categories = Arc::new(CategoryService::new(
            SqlxCategoryRepository::boxed(pool.clone()),
            create_cache(&CacheConfig::default()),
        ));
        let config = StorageConfig {
            path: dir.path().to_path_buf(),
            ..Default::default()
        };
        let service = DocumentService::new(
            SqlxDocumentRepository::boxed(pool),
            categories,
            Arc::new(Storage::new(dir.path())),
            config,
        );
        (service, dir)
    }

    fn upload(name: &str, data: &[u8]) -> DocumentUpload {
        DocumentUpload {
            title: Some("Fire Safety Handbook".to_string()),
            description: Some("Evacuation procedures".to_string()),
            category: Some("Safety".to_string()),
            price: Some("19.99".to_string()),
            file: Some(UploadedFile {
                file_name: name.to_string(),
                content_type: "application/octet-stream".to_string(),
                data: data.to_vec(),
            }),
        }
    }

    #[tokio::test]
    async fn test_failed_store_leaves_no_category() {
        let (service, dir) = setup_service().await;
        // A plain file where the documents directory should be
        std::fs::write(dir.path().join("documents"), b"").unwrap();

        assert!(service.upload(upload("handbook.pdf", b"%PDF-1.4"), None).await.is_err());
        assert!(service.categories.list(CategoryKind::Document).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_stores_file_and_category() {
        let (service, dir) = setup_service().await;
        let document = service.upload(upload("handbook.pdf", b"%PDF-1.4"), None).await.unwrap();

        assert_eq!(document.category_name.as_deref(), Some("Safety"));
        assert_eq!(document.file_name, "handbook.pdf");
        assert_eq!(document.file_type, "application/pdf");
        assert_eq!(document.file_size, 8);
        assert!((document.price - 19.99).abs() < f64::EPSILON);
        assert!(document.is_active);

        let path = document.file_path.unwrap();
        assert!(path.starts_with("documents/"));
        assert!(dir.path().join(path).is_file());
    }

    #[tokio::test]
    async fn test_upload_validation_writes_nothing() {
        let (service, dir) = setup_service().await;
        let mut input = upload("virus.exe", b"MZ");
        input.price = Some("-5".to_string());
        input.title = None;

        match service.upload(input, None).await.unwrap_err() {
            ContentServiceError::ValidationError(errors) => {
                assert!(errors.has("file"));
                assert!(errors.has("price"));
                assert!(errors.has("title"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(!dir.path().join("documents").exists());
        let page = service.list(&DocumentFilter::default(), &ListParams::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_update_toggle_and_view() {
        let (service, _dir) = setup_service().await;
        let document = service.upload(upload("handbook.pdf", b"%PDF"), None).await.unwrap();

        let update = DocumentUpdate {
            title: Some("Handbook v2".to_string()),
            description: Some("Updated".to_string()),
            category: Some("Compliance".to_string()),
            price: Some(serde_json::json!(0)),
            is_active: None,
        };
        let updated = service.update(document.id, update).await.unwrap();
        assert_eq!(updated.title, "Handbook v2");
        assert_eq!(updated.category_name.as_deref(), Some("Compliance"));
        assert!(updated.is_active);

        let toggled = service.toggle_status(document.id).await.unwrap();
        assert!(!toggled.is_active);
        assert!(matches!(service.view(document.id).await, Err(ContentServiceError::NotFound(_))));

        service.toggle_status(document.id).await.unwrap();
        assert_eq!(service.view(document.id).await.unwrap().views_count, 1);
        assert_eq!(service.totals().await.unwrap().views, 1);
    }

    #[tokio::test]
    async fn test_preview_and_download() {
        let (service, dir) = setup_service().await;
        let pdf = service.upload(upload("handbook.pdf", b"%PDF"), None).await.unwrap();
        let txt = service.upload(upload("notes.txt", b"hello"), None).await.unwrap();

        let preview = service.preview(&pdf).await.unwrap();
        assert_eq!(preview.content_type, "application/pdf");
        assert_eq!(preview.data, b"%PDF");

        assert!(matches!(service.preview(&txt).await, Err(ContentServiceError::BadRequest(_))));
        let download = service.download(&txt).await.unwrap();
        assert_eq!(download.file_name, "notes.txt");
        assert_eq!(download.content_type, "text/plain");

        std::fs::remove_file(dir.path().join(pdf.file_path.as_deref().unwrap())).unwrap();
        match service.download(&pdf).await.unwrap_err() {
            ContentServiceError::NotFound(message) => assert_eq!(message, "File not found on disk"),
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let (service, dir) = setup_service().await;
        let document = service.upload(upload("handbook.pdf", b"%PDF"), None).await.unwrap();
        let path = dir.path().join(document.file_path.as_deref().unwrap());

        service.delete(document.id).await.unwrap();
        assert!(!path.exists());
        assert!(matches!(service.get(document.id).await, Err(ContentServiceError::NotFound(_))));
    }
}

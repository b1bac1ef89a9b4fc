//! Document repository
//!
//! Reads join the category name in so listings can show it without a second
//! query.

use crate::db::{on_pool, DynDatabasePool, LastInsertId};
use crate::models::{CreateDocumentInput, Document, DocumentFilter, ListParams, UpdateDocumentInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use sqlx::Row;
use std::sync::Arc;

use super::filter::{bind_values, WhereClause};

/// Aggregate counters across all documents
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentTotals {
    pub total: i64,
    pub active: i64,
    pub views: i64,
    pub purchases: i64,
}

/// Document repository trait
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn create(&self, input: &CreateDocumentInput) -> Result<Document>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Document>>;

    /// List documents newest first
    async fn list(&self, filter: &DocumentFilter, params: &ListParams) -> Result<(Vec<Document>, i64)>;

    /// Update editable metadata, returning whether the row exists
    async fn update(&self, id: i64, input: &UpdateDocumentInput) -> Result<bool>;

    async fn set_active(&self, id: i64, is_active: bool) -> Result<()>;

    async fn increment_views(&self, id: i64) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn totals(&self) -> Result<DocumentTotals>;
}

/// SQLx-based document repository implementation
pub struct SqlxDocumentRepository {
    pool: DynDatabasePool,
}

impl SqlxDocumentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DocumentRepository> {
        Arc::new(Self::new(pool))
    }
}

const DOCUMENT_SELECT: &str = r#"
    SELECT d.id, d.title, d.description, d.category_id, c.name AS category_name, d.price,
           d.file_path, d.file_name, d.file_type, d.file_size, d.is_active, d.buy_number,
           d.views_count, d.created_by, d.created_at, d.updated_at
    FROM documents d
    LEFT JOIN categories c ON c.id = d.category_id
"#;

macro_rules! row_to_document {
    ($row:expr) => {{
        let row = $row;
        Document {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            category_id: row.try_get("category_id")?,
            category_name: row.try_get("category_name")?,
            price: row.try_get("price")?,
            file_path: row.try_get("file_path")?,
            file_name: row.try_get("file_name")?,
            file_type: row.try_get("file_type")?,
            file_size: row.try_get("file_size")?,
            is_active: row.try_get("is_active")?,
            buy_number: row.try_get("buy_number")?,
            views_count: row.try_get("views_count")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }
    }};
}

#[async_trait]
impl DocumentRepository for SqlxDocumentRepository {
    async fn create(&self, input: &CreateDocumentInput) -> Result<Document> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO documents (title, description, category_id, price, file_path, file_name,
                                       file_type, file_size, is_active, buy_number, views_count,
                                       created_by, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?, ?)
                "#,
            )
            .bind(&input.title)
            .bind(&input.description)
            .bind(input.category_id)
            .bind(input.price)
            .bind(&input.file_path)
            .bind(&input.file_name)
            .bind(&input.file_type)
            .bind(input.file_size)
            .bind(true)
            .bind(input.created_by)
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to create document")?
            .inserted_id()
        });

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Document {} vanished after insert", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Document>> {
        let sql = format!("{} WHERE d.id = ?", DOCUMENT_SELECT);
        on_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get document by ID")?;
            match row {
                Some(row) => Ok(Some(row_to_document!(&row))),
                None => Ok(None),
            }
        })
    }

    async fn list(&self, filter: &DocumentFilter, params: &ListParams) -> Result<(Vec<Document>, i64)> {
        let mut clause = WhereClause::new();
        clause
            .eq_bool("d.is_active", filter.active_only.then_some(true))
            .eq_text("c.name", filter.category.as_deref())
            .search(&["d.title", "d.description"], filter.search.as_deref());
        let where_sql = clause.sql();

        let list_sql = format!(
            "{}{} ORDER BY d.created_at DESC, d.id DESC LIMIT ? OFFSET ?",
            DOCUMENT_SELECT, where_sql
        );
        let count_sql = format!(
            "SELECT COUNT(*) AS count FROM documents d LEFT JOIN categories c ON c.id = d.category_id{}",
            where_sql
        );

        on_pool!(self.pool, |p| {
            let rows = bind_values!(sqlx::query(&list_sql), clause.binds())
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to list documents")?;
            let mut documents = Vec::with_capacity(rows.len());
            for row in &rows {
                documents.push(row_to_document!(row));
            }

            let total: i64 = bind_values!(sqlx::query(&count_sql), clause.binds())
                .fetch_one(p)
                .await
                .context("Failed to count documents")?
                .try_get("count")?;

            Ok((documents, total))
        })
    }

    async fn update(&self, id: i64, input: &UpdateDocumentInput) -> Result<bool> {
        on_pool!(self.pool, |p| {
            let result = sqlx::query(
                r#"
                UPDATE documents
                SET title = ?, description = ?, category_id = ?, price = ?,
                    is_active = COALESCE(?, is_active), updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&input.title)
            .bind(&input.description)
            .bind(input.category_id)
            .bind(input.price)
            .bind(input.is_active)
            .bind(Utc::now())
            .bind(id)
            .execute(p)
            .await
            .context("Failed to update document")?;
            Ok(result.rows_affected() > 0)
        })
    }

    async fn set_active(&self, id: i64, is_active: bool) -> Result<()> {
        on_pool!(self.pool, |p| {
            sqlx::query("UPDATE documents SET is_active = ?, updated_at = ? WHERE id = ?")
                .bind(is_active)
                .bind(Utc::now())
                .bind(id)
                .execute(p)
                .await
                .context("Failed to update document status")?;
            Ok(())
        })
    }

    async fn increment_views(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |p| {
            sqlx::query("UPDATE documents SET views_count = views_count + 1 WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to increment document views")?;
            Ok(())
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        on_pool!(self.pool, |p| {
            let result = sqlx::query("DELETE FROM documents WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete document")?;
            Ok(result.rows_affected() > 0)
        })
    }

    async fn totals(&self) -> Result<DocumentTotals> {
        on_pool!(self.pool, |p| {
            let row = sqlx::query(
                r#"
                SELECT COUNT(*) AS total,
                       CAST(COALESCE(SUM(CASE WHEN is_active THEN 1 ELSE 0 END), 0) AS SIGNED) AS active,
                       CAST(COALESCE(SUM(views_count), 0) AS SIGNED) AS views,
                       CAST(COALESCE(SUM(buy_number), 0) AS SIGNED) AS purchases
                FROM documents
                "#,
            )
            .fetch_one(p)
            .await
            .context("Failed to aggregate documents")?;
            Ok(DocumentTotals {
                total: row.try_get("total")?,
                active: row.try_get("active")?,
                views: row.try_get("views")?,
                purchases: row.try_get("purchases")?,
            })
        })
    }
}

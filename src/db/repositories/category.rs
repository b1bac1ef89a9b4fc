//! Category repository
//!
//! Database operations for categories of every [`CategoryKind`].
//!
//! - `CategoryRepository` trait defining the interface for category data access
//! - `SqlxCategoryRepository` implementing the trait for SQLite and MySQL

use crate::db::{on_pool, DynDatabasePool, LastInsertId};
use crate::models::{Category, CategoryKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Create a new category
    async fn create(&self, category: &Category) -> Result<Category>;

    /// Get category by ID within a kind
    async fn get_by_id(&self, kind: CategoryKind, id: i64) -> Result<Option<Category>>;

    /// Get category by exact name within a kind
    async fn get_by_name(&self, kind: CategoryKind, name: &str) -> Result<Option<Category>>;

    /// List categories ordered by sort order, then name
    async fn list(&self, kind: CategoryKind) -> Result<Vec<Category>>;

    /// List categories ordered by name
    async fn list_by_name(&self, kind: CategoryKind, active_only: bool) -> Result<Vec<Category>>;

    /// Update a category
    async fn update(&self, category: &Category) -> Result<Category>;

    /// Delete a category, returning whether a row was removed
    async fn delete(&self, kind: CategoryKind, id: i64) -> Result<bool>;

    /// Check if a name is taken within a kind, ignoring `exclude_id`
    async fn exists_by_name(&self, kind: CategoryKind, name: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Check if a slug is taken within a kind, ignoring `exclude_id`
    async fn exists_by_slug(&self, kind: CategoryKind, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Number of content rows of the category's kind that reference it
    async fn count_usage(&self, kind: CategoryKind, id: i64) -> Result<i64>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

const CATEGORY_COLUMNS: &str =
    "id, kind, name, slug, description, color, icon, is_active, sort_order, created_at, updated_at";

macro_rules! row_to_category {
    ($row:expr) => {{
        let row = $row;
        let kind: String = row.try_get("kind")?;
        Category {
            id: row.try_get("id")?,
            kind: CategoryKind::from_str(&kind)?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            description: row.try_get("description")?,
            color: row.try_get("color")?,
            icon: row.try_get("icon")?,
            is_active: row.try_get("is_active")?,
            sort_order: row.try_get("sort_order")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }
    }};
}

impl SqlxCategoryRepository {
    async fn fetch_list(&self, sql: &str, kind: CategoryKind) -> Result<Vec<Category>> {
        on_pool!(self.pool, |p| {
            let rows = sqlx::query(sql)
                .bind(kind.as_str())
                .fetch_all(p)
                .await
                .context("Failed to list categories")?;
            let mut categories = Vec::with_capacity(rows.len());
            for row in &rows {
                categories.push(row_to_category!(row));
            }
            Ok(categories)
        })
    }

    async fn fetch_one(&self, column: &str, kind: CategoryKind, value: &str) -> Result<Option<Category>> {
        let sql = format!(
            "SELECT {} FROM categories WHERE kind = ? AND {} = ?",
            CATEGORY_COLUMNS, column
        );
        on_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(kind.as_str())
                .bind(value)
                .fetch_optional(p)
                .await
                .with_context(|| format!("Failed to get category by {}", column))?;
            match row {
                Some(row) => Ok(Some(row_to_category!(&row))),
                None => Ok(None),
            }
        })
    }

    async fn exists(&self, column: &str, kind: CategoryKind, value: &str, exclude_id: Option<i64>) -> Result<bool> {
        let sql = format!(
            "SELECT COUNT(*) AS count FROM categories WHERE kind = ? AND {} = ? AND id <> ?",
            column
        );
        on_pool!(self.pool, |p| {
            let count: i64 = sqlx::query(&sql)
                .bind(kind.as_str())
                .bind(value)
                .bind(exclude_id.unwrap_or(0))
                .fetch_one(p)
                .await
                .with_context(|| format!("Failed to check category {}", column))?
                .try_get("count")?;
            Ok(count > 0)
        })
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO categories (kind, name, slug, description, color, icon, is_active, sort_order, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(category.kind.as_str())
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .bind(&category.color)
            .bind(&category.icon)
            .bind(category.is_active)
            .bind(category.sort_order)
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to create category")?
            .inserted_id()
        });

        Ok(Category {
            id,
            created_at: now,
            updated_at: now,
            ..category.clone()
        })
    }

    async fn get_by_id(&self, kind: CategoryKind, id: i64) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE kind = ? AND id = ?", CATEGORY_COLUMNS);
        on_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(kind.as_str())
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get category by ID")?;
            match row {
                Some(row) => Ok(Some(row_to_category!(&row))),
                None => Ok(None),
            }
        })
    }

    async fn get_by_name(&self, kind: CategoryKind, name: &str) -> Result<Option<Category>> {
        self.fetch_one("name", kind, name).await
    }

    async fn list(&self, kind: CategoryKind) -> Result<Vec<Category>> {
        let sql = format!(
            "SELECT {} FROM categories WHERE kind = ? ORDER BY sort_order, name",
            CATEGORY_COLUMNS
        );
        self.fetch_list(&sql, kind).await
    }

    async fn list_by_name(&self, kind: CategoryKind, active_only: bool) -> Result<Vec<Category>> {
        let active = if active_only { " AND is_active = 1" } else { "" };
        let sql = format!(
            "SELECT {} FROM categories WHERE kind = ?{} ORDER BY name",
            CATEGORY_COLUMNS, active
        );
        self.fetch_list(&sql, kind).await
    }

    async fn update(&self, category: &Category) -> Result<Category> {
        let now = Utc::now();
        on_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                UPDATE categories
                SET name = ?, slug = ?, description = ?, color = ?, icon = ?, is_active = ?, sort_order = ?, updated_at = ?
                WHERE kind = ? AND id = ?
                "#,
            )
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .bind(&category.color)
            .bind(&category.icon)
            .bind(category.is_active)
            .bind(category.sort_order)
            .bind(now)
            .bind(category.kind.as_str())
            .bind(category.id)
            .execute(p)
            .await
            .context("Failed to update category")?;
        });

        Ok(Category {
            updated_at: now,
            ..category.clone()
        })
    }

    async fn delete(&self, kind: CategoryKind, id: i64) -> Result<bool> {
        on_pool!(self.pool, |p| {
            let result = sqlx::query("DELETE FROM categories WHERE kind = ? AND id = ?")
                .bind(kind.as_str())
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete category")?;
            Ok(result.rows_affected() > 0)
        })
    }

    async fn exists_by_name(&self, kind: CategoryKind, name: &str, exclude_id: Option<i64>) -> Result<bool> {
        self.exists("name", kind, name, exclude_id).await
    }

    async fn exists_by_slug(&self, kind: CategoryKind, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        self.exists("slug", kind, slug, exclude_id).await
    }

    async fn count_usage(&self, kind: CategoryKind, id: i64) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) AS count FROM {} WHERE category_id = ?",
            kind.content_table()
        );
        on_pool!(self.pool, |p| {
            let count: i64 = sqlx::query(&sql)
                .bind(id)
                .fetch_one(p)
                .await
                .context("Failed to count category usage")?
                .try_get("count")?;
            Ok(count)
        })
    }
}

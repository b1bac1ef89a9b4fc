//! News repository

use crate::db::{on_pool, DynDatabasePool, LastInsertId};
use crate::models::{ListParams, News, NewsFilter, NewsInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use sqlx::Row;
use std::sync::Arc;

use super::filter::{bind_values, WhereClause};

/// Aggregate counters across all news articles
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewsTotals {
    pub total: i64,
    pub published: i64,
    pub views: i64,
}

/// News repository trait
#[async_trait]
pub trait NewsRepository: Send + Sync {
    async fn create(&self, input: &NewsInput) -> Result<News>;

    async fn get_by_id(&self, id: i64) -> Result<Option<News>>;

    /// List articles newest first
    async fn list(&self, filter: &NewsFilter, params: &ListParams) -> Result<(Vec<News>, i64)>;

    /// Overwrite an article; image columns given as `None` are kept
    async fn update(&self, id: i64, input: &NewsInput) -> Result<bool>;

    async fn increment_views(&self, id: i64) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn totals(&self) -> Result<NewsTotals>;
}

/// SQLx-based news repository implementation
pub struct SqlxNewsRepository {
    pool: DynDatabasePool,
}

impl SqlxNewsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NewsRepository> {
        Arc::new(Self::new(pool))
    }
}

const NEWS_SELECT: &str = r#"
    SELECT n.id, n.title, n.slug, n.description, n.content, n.image_path, n.featured_image,
           n.category_id, c.name AS category_name, n.is_published, n.is_featured, n.published_at,
           n.views_count, n.likes_count, n.comments_count, n.created_by, n.created_at, n.updated_at
    FROM news n
    LEFT JOIN categories c ON c.id = n.category_id
"#;

macro_rules! row_to_news {
    ($row:expr) => {{
        let row = $row;
        News {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            slug: row.try_get("slug")?,
            description: row.try_get("description")?,
            content: row.try_get("content")?,
            image_path: row.try_get("image_path")?,
            featured_image: row.try_get("featured_image")?,
            category_id: row.try_get("category_id")?,
            category_name: row.try_get("category_name")?,
            is_published: row.try_get("is_published")?,
            is_featured: row.try_get("is_featured")?,
            published_at: row.try_get("published_at")?,
            views_count: row.try_get("views_count")?,
            likes_count: row.try_get("likes_count")?,
            comments_count: row.try_get("comments_count")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }
    }};
}

#[async_trait]
impl NewsRepository for SqlxNewsRepository {
    async fn create(&self, input: &NewsInput) -> Result<News> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO news (title, slug, description, content, image_path, featured_image, category_id,
                                  is_published, is_featured, published_at, created_by, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&input.title)
            .bind(&input.slug)
            .bind(&input.description)
            .bind(&input.content)
            .bind(&input.image_path)
            .bind(&input.featured_image)
            .bind(input.category_id)
            .bind(input.is_published)
            .bind(input.is_featured)
            .bind(input.published_at)
            .bind(input.created_by)
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to create news")?
            .inserted_id()
        });

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("News {} vanished after insert", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<News>> {
        let sql = format!("{} WHERE n.id = ?", NEWS_SELECT);
        on_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get news by ID")?;
            match row {
                Some(row) => Ok(Some(row_to_news!(&row))),
                None => Ok(None),
            }
        })
    }

    async fn list(&self, filter: &NewsFilter, params: &ListParams) -> Result<(Vec<News>, i64)> {
        let mut clause = WhereClause::new();
        clause
            .eq_int("n.category_id", filter.category_id)
            .eq_bool("n.is_published", filter.published)
            .eq_bool("n.is_featured", filter.featured)
            .search(&["n.title", "n.description", "n.content"], filter.search.as_deref());
        let where_sql = clause.sql();

        let list_sql = format!(
            "{}{} ORDER BY n.created_at DESC, n.id DESC LIMIT ? OFFSET ?",
            NEWS_SELECT, where_sql
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM news n{}", where_sql);

        on_pool!(self.pool, |p| {
            let rows = bind_values!(sqlx::query(&list_sql), clause.binds())
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to list news")?;
            let mut items = Vec::with_capacity(rows.len());
            for row in &rows {
                items.push(row_to_news!(row));
            }

            let total: i64 = bind_values!(sqlx::query(&count_sql), clause.binds())
                .fetch_one(p)
                .await
                .context("Failed to count news")?
                .try_get("count")?;

            Ok((items, total))
        })
    }

    async fn update(&self, id: i64, input: &NewsInput) -> Result<bool> {
        on_pool!(self.pool, |p| {
            let result = sqlx::query(
                r#"
                UPDATE news
                SET title = ?, slug = ?, description = ?, content = ?,
                    image_path = COALESCE(?, image_path), featured_image = COALESCE(?, featured_image),
                    category_id = ?, is_published = ?, is_featured = ?, published_at = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&input.title)
            .bind(&input.slug)
            .bind(&input.description)
            .bind(&input.content)
            .bind(&input.image_path)
            .bind(&input.featured_image)
            .bind(input.category_id)
            .bind(input.is_published)
            .bind(input.is_featured)
            .bind(input.published_at)
            .bind(Utc::now())
            .bind(id)
            .execute(p)
            .await
            .context("Failed to update news")?;
            Ok(result.rows_affected() > 0)
        })
    }

    async fn increment_views(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |p| {
            sqlx::query("UPDATE news SET views_count = views_count + 1 WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to increment news views")?;
            Ok(())
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        on_pool!(self.pool, |p| {
            let result = sqlx::query("DELETE FROM news WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete news")?;
            Ok(result.rows_affected() > 0)
        })
    }

    async fn totals(&self) -> Result<NewsTotals> {
        on_pool!(self.pool, |p| {
            let row = sqlx::query(
                r#"
                SELECT COUNT(*) AS total,
                       CAST(COALESCE(SUM(CASE WHEN is_published THEN 1 ELSE 0 END), 0) AS SIGNED) AS published,
                       CAST(COALESCE(SUM(views_count), 0) AS SIGNED) AS views
                FROM news
                "#,
            )
            .fetch_one(p)
            .await
            .context("Failed to aggregate news")?;
            Ok(NewsTotals {
                total: row.try_get("total")?,
                published: row.try_get("published")?,
                views: row.try_get("views")?,
            })
        })
    }
}

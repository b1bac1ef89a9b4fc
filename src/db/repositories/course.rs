//! Course repository

use crate::db::{on_pool, DynDatabasePool, LastInsertId};
use crate::models::{Course, CourseFilter, CourseInput, CourseType, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

use super::filter::{bind_values, WhereClause};

/// Aggregate counters across all courses
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CourseTotals {
    pub total: i64,
    pub published: i64,
    pub featured: i64,
    pub views: i64,
    pub enrollments: i64,
}

/// Course repository trait
#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn create(&self, input: &CourseInput) -> Result<Course>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>>;

    /// List courses newest first
    async fn list(&self, filter: &CourseFilter, params: &ListParams) -> Result<(Vec<Course>, i64)>;

    /// Overwrite a course; image columns given as `None` are kept
    async fn update(&self, id: i64, input: &CourseInput) -> Result<bool>;

    async fn increment_views(&self, id: i64) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Check if a title is taken, ignoring `exclude_id`
    async fn exists_by_title(&self, title: &str, exclude_id: Option<i64>) -> Result<bool>;

    async fn totals(&self) -> Result<CourseTotals>;
}

/// SQLx-based course repository implementation
pub struct SqlxCourseRepository {
    pool: DynDatabasePool,
}

impl SqlxCourseRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CourseRepository> {
        Arc::new(Self::new(pool))
    }
}

const COURSE_SELECT: &str = r#"
    SELECT co.id, co.title, co.slug, co.description, co.content, co.price, co.course_type,
           co.category_id, c.name AS category_name, co.featured_image, co.certificate_template,
           co.max_students, co.current_students, co.duration_hours, co.requirements,
           co.learning_outcomes, co.zoom_link, co.schedule, co.is_published, co.is_featured,
           co.views_count, co.enrollments_count, co.completion_rate, co.created_by,
           co.created_at, co.updated_at
    FROM courses co
    LEFT JOIN categories c ON c.id = co.category_id
"#;

fn parse_schedule(raw: Option<String>) -> Option<serde_json::Value> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
}

fn encode_schedule(schedule: &Option<serde_json::Value>) -> Option<String> {
    schedule.as_ref().map(|v| v.to_string())
}

macro_rules! row_to_course {
    ($row:expr) => {{
        let row = $row;
        let course_type: String = row.try_get("course_type")?;
        Course {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            slug: row.try_get("slug")?,
            description: row.try_get("description")?,
            content: row.try_get("content")?,
            price: row.try_get("price")?,
            course_type: CourseType::from_str(&course_type)?,
            category_id: row.try_get("category_id")?,
            category_name: row.try_get("category_name")?,
            featured_image: row.try_get("featured_image")?,
            certificate_template: row.try_get("certificate_template")?,
            max_students: row.try_get("max_students")?,
            current_students: row.try_get("current_students")?,
            duration_hours: row.try_get("duration_hours")?,
            requirements: row.try_get("requirements")?,
            learning_outcomes: row.try_get("learning_outcomes")?,
            zoom_link: row.try_get("zoom_link")?,
            schedule: parse_schedule(row.try_get("schedule")?),
            is_published: row.try_get("is_published")?,
            is_featured: row.try_get("is_featured")?,
            views_count: row.try_get("views_count")?,
            enrollments_count: row.try_get("enrollments_count")?,
            completion_rate: row.try_get("completion_rate")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }
    }};
}

#[async_trait]
impl CourseRepository for SqlxCourseRepository {
    async fn create(&self, input: &CourseInput) -> Result<Course> {
        let now = Utc::now();
        let schedule = encode_schedule(&input.schedule);
        let id = on_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO courses (title, slug, description, content, price, course_type, category_id,
                                     featured_image, certificate_template, max_students, duration_hours,
                                     requirements, learning_outcomes, zoom_link, schedule, is_published,
                                     is_featured, created_by, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&input.title)
            .bind(&input.slug)
            .bind(&input.description)
            .bind(&input.content)
            .bind(input.price)
            .bind(input.course_type.to_string())
            .bind(input.category_id)
            .bind(&input.featured_image)
            .bind(&input.certificate_template)
            .bind(input.max_students)
            .bind(input.duration_hours)
            .bind(&input.requirements)
            .bind(&input.learning_outcomes)
            .bind(&input.zoom_link)
            .bind(&schedule)
            .bind(input.is_published)
            .bind(input.is_featured)
            .bind(input.created_by)
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to create course")?
            .inserted_id()
        });

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Course {} vanished after insert", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>> {
        let sql = format!("{} WHERE co.id = ?", COURSE_SELECT);
        on_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get course by ID")?;
            match row {
                Some(row) => Ok(Some(row_to_course!(&row))),
                None => Ok(None),
            }
        })
    }

    async fn list(&self, filter: &CourseFilter, params: &ListParams) -> Result<(Vec<Course>, i64)> {
        let course_type = filter.course_type.map(|t| t.to_string());
        let mut clause = WhereClause::new();
        clause
            .eq_text("co.course_type", course_type.as_deref())
            .eq_text("c.name", filter.category.as_deref())
            .eq_bool("co.is_published", filter.published)
            .eq_bool("co.is_featured", filter.featured)
            .search(&["co.title", "co.description"], filter.search.as_deref());
        let where_sql = clause.sql();

        let list_sql = format!(
            "{}{} ORDER BY co.created_at DESC, co.id DESC LIMIT ? OFFSET ?",
            COURSE_SELECT, where_sql
        );
        let count_sql = format!(
            "SELECT COUNT(*) AS count FROM courses co LEFT JOIN categories c ON c.id = co.category_id{}",
            where_sql
        );

        on_pool!(self.pool, |p| {
            let rows = bind_values!(sqlx::query(&list_sql), clause.binds())
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to list courses")?;
            let mut courses = Vec::with_capacity(rows.len());
            for row in &rows {
                courses.push(row_to_course!(row));
            }

            let total: i64 = bind_values!(sqlx::query(&count_sql), clause.binds())
                .fetch_one(p)
                .await
                .context("Failed to count courses")?
                .try_get("count")?;

            Ok((courses, total))
        })
    }

    async fn update(&self, id: i64, input: &CourseInput) -> Result<bool> {
        let schedule = encode_schedule(&input.schedule);
        on_pool!(self.pool, |p| {
            let result = sqlx::query(
                r#"
                UPDATE courses
                SET title = ?, slug = ?, description = ?, content = ?, price = ?, course_type = ?,
                    category_id = ?, featured_image = COALESCE(?, featured_image),
                    certificate_template = COALESCE(?, certificate_template), max_students = ?,
                    duration_hours = ?, requirements = ?, learning_outcomes = ?, zoom_link = ?,
                    schedule = ?, is_published = ?, is_featured = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&input.title)
            .bind(&input.slug)
            .bind(&input.description)
            .bind(&input.content)
            .bind(input.price)
            .bind(input.course_type.to_string())
            .bind(input.category_id)
            .bind(&input.featured_image)
            .bind(&input.certificate_template)
            .bind(input.max_students)
            .bind(input.duration_hours)
            .bind(&input.requirements)
            .bind(&input.learning_outcomes)
            .bind(&input.zoom_link)
            .bind(&schedule)
            .bind(input.is_published)
            .bind(input.is_featured)
            .bind(Utc::now())
            .bind(id)
            .execute(p)
            .await
            .context("Failed to update course")?;
            Ok(result.rows_affected() > 0)
        })
    }

    async fn increment_views(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |p| {
            sqlx::query("UPDATE courses SET views_count = views_count + 1 WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to increment course views")?;
            Ok(())
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        on_pool!(self.pool, |p| {
            let result = sqlx::query("DELETE FROM courses WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete course")?;
            Ok(result.rows_affected() > 0)
        })
    }

    async fn exists_by_title(&self, title: &str, exclude_id: Option<i64>) -> Result<bool> {
        on_pool!(self.pool, |p| {
            let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM courses WHERE title = ? AND id <> ?")
                .bind(title)
                .bind(exclude_id.unwrap_or(0))
                .fetch_one(p)
                .await
                .context("Failed to check course title")?
                .try_get("count")?;
            Ok(count > 0)
        })
    }

    async fn totals(&self) -> Result<CourseTotals> {
        on_pool!(self.pool, |p| {
            let row = sqlx::query(
                r#"
                SELECT COUNT(*) AS total,
                       CAST(COALESCE(SUM(CASE WHEN is_published THEN 1 ELSE 0 END), 0) AS SIGNED) AS published,
                       CAST(COALESCE(SUM(CASE WHEN is_featured THEN 1 ELSE 0 END), 0) AS SIGNED) AS featured,
                       CAST(COALESCE(SUM(views_count), 0) AS SIGNED) AS views,
                       CAST(COALESCE(SUM(enrollments_count), 0) AS SIGNED) AS enrollments
                FROM courses
                "#,
            )
            .fetch_one(p)
            .await
            .context("Failed to aggregate courses")?;
            Ok(CourseTotals {
                total: row.try_get("total")?,
                published: row.try_get("published")?,
                featured: row.try_get("featured")?,
                views: row.try_get("views")?,
                enrollments: row.try_get("enrollments")?,
            })
        })
    }
}

//! Test (quiz) repository
//!
//! Questions are stored as a JSON array in the `questions` column.

use crate::db::{on_pool, DynDatabasePool, LastInsertId};
use crate::models::{ListParams, Question, Test, TestFilter, TestInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

use super::filter::{bind_values, WhereClause};

/// Test repository trait
#[async_trait]
pub trait TestRepository: Send + Sync {
    async fn create(&self, input: &TestInput) -> Result<Test>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Test>>;

    /// List tests newest first
    async fn list(&self, filter: &TestFilter, params: &ListParams) -> Result<(Vec<Test>, i64)>;

    /// All tests of one course, oldest first
    async fn list_by_course(&self, course_id: i64) -> Result<Vec<Test>>;

    /// Overwrite a test, returning whether the row exists
    async fn update(&self, id: i64, input: &TestInput) -> Result<bool>;

    async fn set_active(&self, id: i64, is_active: bool) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Delete every test of a course, returning how many were removed
    async fn delete_by_course(&self, course_id: i64) -> Result<u64>;

    /// Total and active test counts
    async fn counts(&self) -> Result<(i64, i64)>;
}

/// SQLx-based test repository implementation
pub struct SqlxTestRepository {
    pool: DynDatabasePool,
}

impl SqlxTestRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TestRepository> {
        Arc::new(Self::new(pool))
    }
}

const TEST_SELECT: &str = r#"
    SELECT t.id, t.title, t.description, t.course_id, co.title AS course_title,
           t.time_limit_minutes, t.passing_score, t.max_attempts, t.is_active, t.questions,
           t.created_by, t.created_at, t.updated_at
    FROM tests t
    LEFT JOIN courses co ON co.id = t.course_id
"#;

fn parse_questions(raw: &str) -> Result<Vec<Question>> {
    serde_json::from_str(raw).context("Stored questions are not valid JSON")
}

macro_rules! row_to_test {
    ($row:expr) => {{
        let row = $row;
        let questions: String = row.try_get("questions")?;
        Test {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            course_id: row.try_get("course_id")?,
            course_title: row.try_get("course_title")?,
            time_limit_minutes: row.try_get("time_limit_minutes")?,
            passing_score: row.try_get("passing_score")?,
            max_attempts: row.try_get("max_attempts")?,
            is_active: row.try_get("is_active")?,
            questions: parse_questions(&questions)?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }
    }};
}

impl SqlxTestRepository {
    async fn fetch_many(&self, sql: &str, clause: &WhereClause, limits: Option<&ListParams>) -> Result<Vec<Test>> {
        on_pool!(self.pool, |p| {
            let mut query = bind_values!(sqlx::query(sql), clause.binds());
            if let Some(params) = limits {
                query = query.bind(params.limit()).bind(params.offset());
            }
            let rows = query.fetch_all(p).await.context("Failed to list tests")?;
            let mut tests = Vec::with_capacity(rows.len());
            for row in &rows {
                tests.push(row_to_test!(row));
            }
            Ok(tests)
        })
    }
}

#[async_trait]
impl TestRepository for SqlxTestRepository {
    async fn create(&self, input: &TestInput) -> Result<Test> {
        let now = Utc::now();
        let questions = serde_json::to_string(&input.questions).context("Failed to encode questions")?;
        let id = on_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO tests (title, description, course_id, time_limit_minutes, passing_score,
                                   max_attempts, is_active, questions, created_by, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&input.title)
            .bind(&input.description)
            .bind(input.course_id)
            .bind(input.time_limit_minutes)
            .bind(input.passing_score)
            .bind(input.max_attempts)
            .bind(input.is_active)
            .bind(&questions)
            .bind(input.created_by)
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to create test")?
            .inserted_id()
        });

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Test {} vanished after insert", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Test>> {
        let sql = format!("{} WHERE t.id = ?", TEST_SELECT);
        on_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get test by ID")?;
            match row {
                Some(row) => Ok(Some(row_to_test!(&row))),
                None => Ok(None),
            }
        })
    }

    async fn list(&self, filter: &TestFilter, params: &ListParams) -> Result<(Vec<Test>, i64)> {
        let mut clause = WhereClause::new();
        clause
            .eq_int("t.course_id", filter.course_id)
            .eq_bool("t.is_active", filter.active);
        let where_sql = clause.sql();

        let list_sql = format!(
            "{}{} ORDER BY t.created_at DESC, t.id DESC LIMIT ? OFFSET ?",
            TEST_SELECT, where_sql
        );
        let tests = self.fetch_many(&list_sql, &clause, Some(params)).await?;

        let count_sql = format!("SELECT COUNT(*) AS count FROM tests t{}", where_sql);
        let total = on_pool!(self.pool, |p| {
            let count: i64 = bind_values!(sqlx::query(&count_sql), clause.binds())
                .fetch_one(p)
                .await
                .context("Failed to count tests")?
                .try_get("count")?;
            count
        });

        Ok((tests, total))
    }

    async fn list_by_course(&self, course_id: i64) -> Result<Vec<Test>> {
        let mut clause = WhereClause::new();
        clause.eq_int("t.course_id", Some(course_id));
        let sql = format!("{}{} ORDER BY t.created_at, t.id", TEST_SELECT, clause.sql());
        self.fetch_many(&sql, &clause, None).await
    }

    async fn update(&self, id: i64, input: &TestInput) -> Result<bool> {
        let questions = serde_json::to_string(&input.questions).context("Failed to encode questions")?;
        on_pool!(self.pool, |p| {
            let result = sqlx::query(
                r#"
                UPDATE tests
                SET title = ?, description = ?, course_id = ?, time_limit_minutes = ?, passing_score = ?,
                    max_attempts = ?, is_active = ?, questions = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&input.title)
            .bind(&input.description)
            .bind(input.course_id)
            .bind(input.time_limit_minutes)
            .bind(input.passing_score)
            .bind(input.max_attempts)
            .bind(input.is_active)
            .bind(&questions)
            .bind(Utc::now())
            .bind(id)
            .execute(p)
            .await
            .context("Failed to update test")?;
            Ok(result.rows_affected() > 0)
        })
    }

    async fn set_active(&self, id: i64, is_active: bool) -> Result<()> {
        on_pool!(self.pool, |p| {
            sqlx::query("UPDATE tests SET is_active = ?, updated_at = ? WHERE id = ?")
                .bind(is_active)
                .bind(Utc::now())
                .bind(id)
                .execute(p)
                .await
                .context("Failed to update test status")?;
            Ok(())
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        on_pool!(self.pool, |p| {
            let result = sqlx::query("DELETE FROM tests WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete test")?;
            Ok(result.rows_affected() > 0)
        })
    }

    async fn delete_by_course(&self, course_id: i64) -> Result<u64> {
        on_pool!(self.pool, |p| {
            let result = sqlx::query("DELETE FROM tests WHERE course_id = ?")
                .bind(course_id)
                .execute(p)
                .await
                .context("Failed to delete course tests")?;
            Ok(result.rows_affected())
        })
    }

    async fn counts(&self) -> Result<(i64, i64)> {
        on_pool!(self.pool, |p| {
            let row = sqlx::query(
                r#"
                SELECT COUNT(*) AS total,
                       CAST(COALESCE(SUM(CASE WHEN is_active THEN 1 ELSE 0 END), 0) AS SIGNED) AS active
                FROM tests
                "#,
            )
            .fetch_one(p)
            .await
            .context("Failed to count tests")?;
            Ok((row.try_get("total")?, row.try_get("active")?))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::QuestionType;

    async fn setup() -> (SqlxTestRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");

        let course_id = sqlx::query(
            "INSERT INTO courses (title, slug, description, content, course_type) VALUES ('Fire Safety', 'fire-safety', 'd', 'c', 'online')",
        )
        .execute(pool.as_sqlite().unwrap())
        .await
        .unwrap()
        .last_insert_rowid();

        (SqlxTestRepository::new(pool), course_id)
    }

    fn input(title: &str, course_id: i64) -> TestInput {
        TestInput {
            title: title.to_string(),
            description: None,
            course_id,
            time_limit_minutes: 30,
            passing_score: 70,
            max_attempts: 3,
            is_active: true,
            questions: vec![Question {
                question: "Is water wet?".to_string(),
                question_type: QuestionType::TrueFalse,
                options: None,
                correct_answer: "true".to_string(),
                points: 10,
                explanation: Some("Yes".to_string()),
            }],
            created_by: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_with_questions() {
        let (repo, course_id) = setup().await;
        let test = repo.create(&input("Quiz 1", course_id)).await.unwrap();

        assert_eq!(test.course_title.as_deref(), Some("Fire Safety"));
        assert_eq!(test.questions.len(), 1);
        assert_eq!(test.questions[0].question_type, QuestionType::TrueFalse);
        assert_eq!(test.total_points(), 10);
    }

    #[tokio::test]
    async fn test_list_and_filters() {
        let (repo, course_id) = setup().await;
        let first = repo.create(&input("Quiz 1", course_id)).await.unwrap();
        repo.create(&input("Quiz 2", course_id)).await.unwrap();
        repo.set_active(first.id, false).await.unwrap();

        let params = ListParams::new(1, 15);
        let (tests, total) = repo.list(&TestFilter::default(), &params).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(tests[0].title, "Quiz 2");

        let active = TestFilter { active: Some(true), ..Default::default() };
        assert_eq!(repo.list(&active, &params).await.unwrap().1, 1);

        let other_course = TestFilter { course_id: Some(course_id + 1), ..Default::default() };
        assert_eq!(repo.list(&other_course, &params).await.unwrap().1, 0);

        let by_course = repo.list_by_course(course_id).await.unwrap();
        assert_eq!(by_course.len(), 2);
        assert_eq!(by_course[0].title, "Quiz 1");

        assert_eq!(repo.counts().await.unwrap(), (2, 1));
    }

    #[tokio::test]
    async fn test_update_and_delete_by_course() {
        let (repo, course_id) = setup().await;
        let test = repo.create(&input("Quiz 1", course_id)).await.unwrap();

        let mut update = input("Quiz 1 (revised)", course_id);
        update.passing_score = 90;
        assert!(repo.update(test.id, &update).await.unwrap());
        let stored = repo.get_by_id(test.id).await.unwrap().unwrap();
        assert_eq!(stored.passing_score, 90);

        repo.create(&input("Quiz 2", course_id)).await.unwrap();
        assert_eq!(repo.delete_by_course(course_id).await.unwrap(), 2);
        assert!(!repo.delete(test.id).await.unwrap());
    }
}

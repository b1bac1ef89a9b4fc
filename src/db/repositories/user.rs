//! User repository
//!
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::db::{on_pool, DynDatabasePool, LastInsertId};
use crate::models::{CreateUserInput, ListParams, User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

use super::filter::{bind_values, WhereClause};

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, input: &CreateUserInput) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist every column of `user`
    async fn update(&self, user: &User) -> Result<User>;

    /// Delete a user, returning whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// List users newest first, optionally searching names and email
    async fn list(&self, params: &ListParams, search: Option<&str>) -> Result<(Vec<User>, i64)>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const USER_COLUMNS: &str =
    "id, username, first_name, last_name, email, phone, password_hash, role, created_at, updated_at";

macro_rules! row_to_user {
    ($row:expr) => {{
        let row = $row;
        let role: String = row.try_get("role")?;
        User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            password_hash: row.try_get("password_hash")?,
            role: UserRole::from_str(&role).unwrap_or_default(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }
    }};
}

impl SqlxUserRepository {
    async fn find_one(&self, column: &str, value: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column);
        on_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(value)
                .fetch_optional(p)
                .await
                .with_context(|| format!("Failed to get user by {}", column))?;
            match row {
                Some(row) => Ok(Some(row_to_user!(&row))),
                None => Ok(None),
            }
        })
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, input: &CreateUserInput) -> Result<User> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO users (username, first_name, last_name, email, phone, password_hash, role, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&input.username)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.password_hash)
            .bind(input.role.to_string())
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to create user")?
            .inserted_id()
        });

        Ok(User {
            id,
            username: input.username.clone(),
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            email: input.email.clone(),
            phone: input.phone.clone(),
            password_hash: input.password_hash.clone(),
            role: input.role,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        on_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get user by ID")?;
            match row {
                Some(row) => Ok(Some(row_to_user!(&row))),
                None => Ok(None),
            }
        })
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        self.find_one("username", username).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_one("email", email).await
    }

    async fn update(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        on_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                UPDATE users
                SET username = ?, first_name = ?, last_name = ?, email = ?, phone = ?,
                    password_hash = ?, role = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&user.username)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.email)
            .bind(&user.phone)
            .bind(&user.password_hash)
            .bind(user.role.to_string())
            .bind(now)
            .bind(user.id)
            .execute(p)
            .await
            .context("Failed to update user")?;
        });

        let mut updated = user.clone();
        updated.updated_at = now;
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        on_pool!(self.pool, |p| {
            let result = sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete user")?;
            Ok(result.rows_affected() > 0)
        })
    }

    async fn count(&self) -> Result<i64> {
        on_pool!(self.pool, |p| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM users")
                .fetch_one(p)
                .await
                .context("Failed to count users")?;
            Ok(row.try_get("count")?)
        })
    }

    async fn list(&self, params: &ListParams, search: Option<&str>) -> Result<(Vec<User>, i64)> {
        let mut clause = WhereClause::new();
        clause.search(&["first_name", "last_name", "email"], search);
        let where_sql = clause.sql();

        let list_sql = format!(
            "SELECT {} FROM users{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            USER_COLUMNS, where_sql
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM users{}", where_sql);

        on_pool!(self.pool, |p| {
            let rows = bind_values!(sqlx::query(&list_sql), clause.binds())
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to list users")?;
            let mut users = Vec::with_capacity(rows.len());
            for row in &rows {
                users.push(row_to_user!(row));
            }

            let total: i64 = bind_values!(sqlx::query(&count_sql), clause.binds())
                .fetch_one(p)
                .await
                .context("Failed to count users")?
                .try_get("count")?;

            Ok((users, total))
        })
    }
}

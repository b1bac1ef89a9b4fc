//! Personal access token repository
//!
//! Tokens are looked up by the SHA-256 hash of the bearer value.

use crate::db::{on_pool, DynDatabasePool, LastInsertId};
use crate::models::PersonalAccessToken;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

/// Token repository trait
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Store a new token hash for a user
    async fn create(
        &self,
        user_id: i64,
        name: &str,
        token_hash: &str,
        abilities: &[String],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<PersonalAccessToken>;

    /// Find a token by its hash
    async fn get_by_hash(&self, token_hash: &str) -> Result<Option<PersonalAccessToken>>;

    /// Record that the token was just used
    async fn touch(&self, id: i64) -> Result<()>;

    /// Delete a token
    async fn delete(&self, id: i64) -> Result<()>;

    /// Delete all tokens for a user
    async fn delete_by_user(&self, user_id: i64) -> Result<()>;

    /// Delete tokens whose expiry has passed
    async fn delete_expired(&self) -> Result<u64>;
}

/// SQLx-based token repository implementation
pub struct SqlxTokenRepository {
    pool: DynDatabasePool,
}

impl SqlxTokenRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TokenRepository> {
        Arc::new(Self::new(pool))
    }
}

fn parse_abilities(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_else(|| vec!["*".to_string()])
}

#[async_trait]
impl TokenRepository for SqlxTokenRepository {
    async fn create(
        &self,
        user_id: i64,
        name: &str,
        token_hash: &str,
        abilities: &[String],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<PersonalAccessToken> {
        let now = Utc::now();
        let abilities_json = serde_json::to_string(abilities).context("Failed to encode abilities")?;

        let id = on_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO personal_access_tokens (user_id, name, token_hash, abilities, expires_at, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(user_id)
            .bind(name)
            .bind(token_hash)
            .bind(&abilities_json)
            .bind(expires_at)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to create access token")?
            .inserted_id()
        });

        Ok(PersonalAccessToken {
            id,
            user_id,
            name: name.to_string(),
            token_hash: token_hash.to_string(),
            abilities: abilities.to_vec(),
            last_used_at: None,
            expires_at,
            created_at: now,
        })
    }

    async fn get_by_hash(&self, token_hash: &str) -> Result<Option<PersonalAccessToken>> {
        on_pool!(self.pool, |p| {
            let row = sqlx::query(
                r#"
                SELECT id, user_id, name, token_hash, abilities, last_used_at, expires_at, created_at
                FROM personal_access_tokens
                WHERE token_hash = ?
                "#,
            )
            .bind(token_hash)
            .fetch_optional(p)
            .await
            .context("Failed to get access token")?;

            match row {
                Some(row) => Ok(Some(PersonalAccessToken {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    name: row.try_get("name")?,
                    token_hash: row.try_get("token_hash")?,
                    abilities: parse_abilities(row.try_get("abilities")?),
                    last_used_at: row.try_get("last_used_at")?,
                    expires_at: row.try_get("expires_at")?,
                    created_at: row.try_get("created_at")?,
                })),
                None => Ok(None),
            }
        })
    }

    async fn touch(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |p| {
            sqlx::query("UPDATE personal_access_tokens SET last_used_at = ? WHERE id = ?")
                .bind(Utc::now())
                .bind(id)
                .execute(p)
                .await
                .context("Failed to update token usage")?;
            Ok(())
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |p| {
            sqlx::query("DELETE FROM personal_access_tokens WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete access token")?;
            Ok(())
        })
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        on_pool!(self.pool, |p| {
            sqlx::query("DELETE FROM personal_access_tokens WHERE user_id = ?")
                .bind(user_id)
                .execute(p)
                .await
                .context("Failed to delete user tokens")?;
            Ok(())
        })
    }

    async fn delete_expired(&self) -> Result<u64> {
        on_pool!(self.pool, |p| {
            let result = sqlx::query(
                "DELETE FROM personal_access_tokens WHERE expires_at IS NOT NULL AND expires_at <= ?",
            )
            .bind(Utc::now())
            .execute(p)
            .await
            .context("Failed to delete expired tokens")?;
            Ok(result.rows_affected())
        })
    }
}

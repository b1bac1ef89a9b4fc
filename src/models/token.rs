//! Personal access token model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bearer token issued to a user. Only the SHA-256 hash of the
/// plain token is ever stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalAccessToken {
    pub id: i64,
    pub user_id: i64,
    /// Token label, e.g. "auth_token"
    pub name: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    /// Granted abilities, `["*"]` by default
    pub abilities: Vec<String>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PersonalAccessToken {
    /// Check if the token has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }

    /// Check whether the token grants an ability
    pub fn can(&self, ability: &str) -> bool {
        self.abilities.iter().any(|a| a == "*" || a == ability)
    }
}

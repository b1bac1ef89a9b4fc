//! User service
//!
//! Registration, login and bearer-token authentication, plus the user
//! management used by the admin panel.

use crate::db::repositories::{TokenRepository, UserRepository};
use crate::models::{
    CreateUserInput, ListParams, PagedResult, PersonalAccessToken, UpdateUserInput, User, UserRole,
};
use crate::services::password::{hash_password, verify_password};
use crate::services::token::{generate_token, hash_token, AUTH_TOKEN_NAME};
use crate::services::validation::ValidationErrors;
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_USERNAME_LENGTH: usize = 50;
const MAX_PHONE_LENGTH: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("{0}")]
    AuthenticationError(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("{0}")]
    ValidationError(ValidationErrors),

    #[error("User not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ValidationErrors> for UserServiceError {
    fn from(errors: ValidationErrors) -> Self {
        UserServiceError::ValidationError(errors)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

/// `email` may hold either an email address or a username
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginInput {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Body of the user create and update endpoints
///
/// Roles are only assigned through [`AdminUserUpdate`]; a `role` key here is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPayload {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

/// Body of the admin user update endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// A signed-in user and the plain token issued for them
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn TokenRepository>,
    token_ttl_days: i64,
}

impl UserService {
    /// `token_ttl_days` of 0 issues tokens that never expire
    pub fn new(users: Arc<dyn UserRepository>, tokens: Arc<dyn TokenRepository>, token_ttl_days: i64) -> Self {
        Self {
            users,
            tokens,
            token_ttl_days,
        }
    }

    pub async fn register(&self, input: RegisterInput) -> Result<AuthSession, UserServiceError> {
        let mut errors = ValidationErrors::new();

        let username = errors.required("username", input.username.as_deref()).map(str::to_string);
        if let Some(ref username) = username {
            errors.max_chars("username", username, MAX_USERNAME_LENGTH);
        }
        let email = self.validate_email(&mut errors, input.email.as_deref(), None).await?;

        if let Some(password) = errors.required("password", input.password.as_deref()) {
            errors.min_chars("password", password, MIN_PASSWORD_LENGTH);
            if input.password_confirmation.as_deref() != input.password.as_deref() {
                errors.add("password", "The password field confirmation does not match.");
            }
        }
        let first_name = optional_text(&mut errors, "first_name", input.first_name.as_deref(), 255);
        let last_name = optional_text(&mut errors, "last_name", input.last_name.as_deref(), 255);
        let phone = optional_text(&mut errors, "phone", input.phone.as_deref(), MAX_PHONE_LENGTH);

        if let Some(ref username) = username {
            if self.users.get_by_username(username).await?.is_some() {
                errors.taken("username");
            }
        }
        errors.finish()?;

        // First account on a fresh install administers it
        let role = if self.users.count().await? == 0 {
            UserRole::Admin
        } else {
            UserRole::User
        };

        let password = input.password.unwrap_or_default();
        let password_hash = hash_password(&password).context("Failed to hash password")?;
        let user = self
            .users
            .create(&CreateUserInput {
                username: username.unwrap_or_default(),
                first_name: first_name.unwrap_or_default(),
                last_name: last_name.unwrap_or_default(),
                email: email.unwrap_or_default(),
                phone,
                password_hash,
                role,
            })
            .await?;

        tracing::info!(user_id = user.id, role = %user.role, "User registered");
        let token = self.issue_token(&user).await?;
        Ok(AuthSession { user, token })
    }

    pub async fn login(&self, input: LoginInput) -> Result<AuthSession, UserServiceError> {
        let mut errors = ValidationErrors::new();
        let identifier = input.email.as_deref().or(input.username.as_deref());
        let identifier = errors.required("email", identifier).map(str::to_string);
        let password = errors.required("password", input.password.as_deref()).map(str::to_string);
        errors.finish()?;

        let identifier = identifier.unwrap_or_default();
        let user = match self.users.get_by_email(&identifier).await? {
            Some(user) => Some(user),
            None => self.users.get_by_username(&identifier).await?,
        };

        let invalid = || UserServiceError::AuthenticationError("Invalid credentials".to_string());
        let user = user.ok_or_else(invalid)?;
        let password = password.unwrap_or_default();
        if !verify_password(&password, &user.password_hash).context("Failed to verify password")? {
            tracing::warn!(user_id = user.id, "Failed login attempt");
            return Err(invalid());
        }

        let token = self.issue_token(&user).await?;
        Ok(AuthSession { user, token })
    }

    /// Revoke the token that authenticated the current request
    pub async fn logout(&self, token_id: i64) -> Result<(), UserServiceError> {
        self.tokens.delete(token_id).await?;
        Ok(())
    }

    /// Create a new full-access token for a user and return it in plain text
    pub async fn issue_token(&self, user: &User) -> Result<String, UserServiceError> {
        let token = generate_token();
        let expires_at = (self.token_ttl_days > 0).then(|| Utc::now() + Duration::days(self.token_ttl_days));
        self.tokens
            .create(user.id, AUTH_TOKEN_NAME, &hash_token(&token), &["*".to_string()], expires_at)
            .await?;
        Ok(token)
    }

    /// Resolve a plain bearer token to its user
    ///
    /// Expired tokens are deleted on sight. A successful lookup stamps
    /// `last_used_at`.
    pub async fn authenticate(&self, token: &str) -> Result<(User, PersonalAccessToken), UserServiceError> {
        let record = self
            .tokens
            .get_by_hash(&hash_token(token))
            .await?
            .ok_or(UserServiceError::InvalidToken)?;

        if record.is_expired() {
            self.tokens.delete(record.id).await?;
            tracing::info!(token_id = record.id, "Deleted expired token");
            return Err(UserServiceError::TokenExpired);
        }

        let user = self
            .users
            .get_by_id(record.user_id)
            .await?
            .ok_or(UserServiceError::InvalidToken)?;

        self.tokens.touch(record.id).await?;
        Ok((user, record))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<User, UserServiceError> {
        self.users.get_by_id(id).await?.ok_or(UserServiceError::NotFound)
    }

    pub async fn list(&self, params: &ListParams, search: Option<&str>) -> Result<PagedResult<User>, UserServiceError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        let (users, total) = self.users.list(params, search).await?;
        Ok(PagedResult::new(users, total, params))
    }

    pub async fn count(&self) -> Result<i64, UserServiceError> {
        Ok(self.users.count().await?)
    }

    /// Create a user directly, bypassing registration's first-user rule
    pub async fn create(&self, input: UserPayload) -> Result<User, UserServiceError> {
        let mut errors = ValidationErrors::new();

        let username = errors.required("username", input.username.as_deref()).map(str::to_string);
        if let Some(ref username) = username {
            errors.max_chars("username", username, MAX_USERNAME_LENGTH);
            if self.users.get_by_username(username).await?.is_some() {
                errors.taken("username");
            }
        }
        let email = self.validate_email(&mut errors, input.email.as_deref(), None).await?;
        if let Some(password) = errors.required("password", input.password.as_deref()) {
            errors.min_chars("password", password, MIN_PASSWORD_LENGTH);
        }
        let first_name = optional_text(&mut errors, "first_name", input.first_name.as_deref(), 255);
        let last_name = optional_text(&mut errors, "last_name", input.last_name.as_deref(), 255);
        let phone = optional_text(&mut errors, "phone", input.phone.as_deref(), MAX_PHONE_LENGTH);
        errors.finish()?;

        let password_hash = hash_password(input.password.as_deref().unwrap_or_default())
            .context("Failed to hash password")?;
        let user = self
            .users
            .create(&CreateUserInput {
                username: username.unwrap_or_default(),
                first_name: first_name.unwrap_or_default(),
                last_name: last_name.unwrap_or_default(),
                email: email.unwrap_or_default(),
                phone,
                password_hash,
                role: UserRole::User,
            })
            .await?;

        tracing::info!(user_id = user.id, "User created");
        Ok(user)
    }

    /// Partial update: only the fields present in the payload change
    pub async fn update(&self, id: i64, input: UserPayload) -> Result<User, UserServiceError> {
        let user = self.get_by_id(id).await?;
        let mut errors = ValidationErrors::new();
        let mut changes = UpdateUserInput::default();

        if input.username.is_some() {
            if let Some(username) = errors.required("username", input.username.as_deref()) {
                errors.max_chars("username", username, MAX_USERNAME_LENGTH);
                if let Some(other) = self.users.get_by_username(username).await? {
                    if other.id != id {
                        errors.taken("username");
                    }
                }
                changes.username = Some(username.to_string());
            }
        }
        if input.email.is_some() {
            changes.email = self.validate_email(&mut errors, input.email.as_deref(), Some(id)).await?;
        }
        if let Some(password) = input.password.as_deref().filter(|p| !p.is_empty()) {
            errors.min_chars("password", password, MIN_PASSWORD_LENGTH);
        }
        changes.first_name = optional_text(&mut errors, "first_name", input.first_name.as_deref(), 255);
        changes.last_name = optional_text(&mut errors, "last_name", input.last_name.as_deref(), 255);
        changes.phone = optional_text(&mut errors, "phone", input.phone.as_deref(), MAX_PHONE_LENGTH);
        errors.finish()?;

        if let Some(password) = input.password.as_deref().filter(|p| !p.is_empty()) {
            changes.password_hash = Some(hash_password(password).context("Failed to hash password")?);
        }

        Ok(self.users.update(&apply_changes(user, changes)).await?)
    }

    /// Admin edit of a user's names, email and role; all four are required
    pub async fn admin_update(&self, id: i64, input: AdminUserUpdate) -> Result<User, UserServiceError> {
        let user = self.get_by_id(id).await?;
        let mut errors = ValidationErrors::new();

        let first_name = errors.required("first_name", input.first_name.as_deref()).map(str::to_string);
        if let Some(ref name) = first_name {
            errors.max_chars("first_name", name, 255);
        }
        let last_name = errors.required("last_name", input.last_name.as_deref()).map(str::to_string);
        if let Some(ref name) = last_name {
            errors.max_chars("last_name", name, 255);
        }
        let email = self.validate_email(&mut errors, input.email.as_deref(), Some(id)).await?;
        let role = match errors.required("role", input.role.as_deref()) {
            Some(role) => parse_role(&mut errors, Some(role)),
            None => None,
        };
        errors.finish()?;

        let changes = UpdateUserInput {
            first_name,
            last_name,
            email,
            role,
            ..Default::default()
        };
        let updated = self.users.update(&apply_changes(user, changes)).await?;
        tracing::info!(user_id = id, role = %updated.role, "User updated by admin");
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), UserServiceError> {
        self.tokens.delete_by_user(id).await?;
        if !self.users.delete(id).await? {
            return Err(UserServiceError::NotFound);
        }
        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }

    /// Required, well-formed and not used by another account
    async fn validate_email(
        &self,
        errors: &mut ValidationErrors,
        email: Option<&str>,
        ignore_id: Option<i64>,
    ) -> Result<Option<String>, UserServiceError> {
        let Some(email) = errors.required("email", email) else {
            return Ok(None);
        };
        errors.max_chars("email", email, 255).email("email", email);
        if let Some(other) = self.users.get_by_email(email).await? {
            if Some(other.id) != ignore_id {
                errors.taken("email");
            }
        }
        Ok(Some(email.to_string()))
    }
}

fn optional_text(errors: &mut ValidationErrors, field: &str, value: Option<&str>, max: usize) -> Option<String> {
    let value = value?.trim();
    errors.max_chars(field, value, max);
    Some(value.to_string())
}

fn parse_role(errors: &mut ValidationErrors, role: Option<&str>) -> Option<UserRole> {
    let role = role?;
    match role {
        "admin" | "user" => UserRole::from_str(role).ok(),
        _ => {
            errors.one_of("role", role, &["user", "admin"]);
            None
        }
    }
}

fn apply_changes(mut user: User, changes: UpdateUserInput) -> User {
    if let Some(username) = changes.username {
        user.username = username;
    }
    if let Some(first_name) = changes.first_name {
        user.first_name = first_name;
    }
    if let Some(last_name) = changes.last_name {
        user.last_name = last_name;
    }
    if let Some(email) = changes.email {
        user.email = email;
    }
    if changes.phone.is_some() {
        user.phone = changes.phone;
    }
    if let Some(password_hash) = changes.password_hash {
        user.password_hash = password_hash;
    }
    if let Some(role) = changes.role {
        user.role = role;
    }
    user
}

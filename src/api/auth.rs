//! Authentication API endpoints
//!
//! - POST /api/auth/register - Create an account and issue a token
//! - POST /api/auth/login - Issue a token for email (or username) + password
//! - POST /api/auth/logout - Revoke the current token
//! - GET /api/auth/user - Current user

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::api::common::ApiJson;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::User;
use crate::services::user::{AuthSession, LoginInput, RegisterInput};

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/user", get(current_user))
}

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.user_service.register(body).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/auth/login
async fn login(State(state): State<AppState>, ApiJson(body): ApiJson<LoginInput>) -> Result<Json<AuthSession>, ApiError> {
    let session = state.user_service.login(body).await?;
    Ok(Json(session))
}

/// POST /api/auth/logout
async fn logout(State(state): State<AppState>, auth: AuthenticatedUser) -> Result<StatusCode, ApiError> {
    state.user_service.logout(auth.token_id).await?;
    tracing::info!(user_id = auth.user.id, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/user
async fn current_user(auth: AuthenticatedUser) -> Json<User> {
    Json(auth.user)
}

//! User API endpoints
//!
//! Authenticated:
//! - GET /api/users, POST /api/users
//! - GET|PUT|DELETE /api/users/{id}
//!
//! Admin:
//! - GET /api/admin/users?search=&page=
//! - PUT|DELETE /api/admin/users/{id}

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;

use crate::api::common::{list_params, ApiJson, ApiPath, MessageResponse, SearchQuery, USERS_PER_PAGE};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{PagedResult, User};
use crate::services::user::{AdminUserUpdate, UserPayload};

/// Build the authenticated user routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
}

/// Build the admin user routes
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}", put(admin_update_user).delete(admin_delete_user))
}

#[derive(Debug, Serialize)]
struct UserUpdatedResponse {
    message: &'static str,
    user: User,
}

/// GET /api/users, GET /api/admin/users
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<PagedResult<User>>, ApiError> {
    let params = list_params(query.page.as_deref(), USERS_PER_PAGE);
    let users = state.user_service.list(&params, query.search.as_deref()).await?;
    Ok(Json(users))
}

/// POST /api/users
async fn create_user(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<UserPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.user_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/users/{id}
async fn get_user(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.get_by_id(id).await?))
}

/// PUT /api/users/{id}
async fn update_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UserPayload>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.update(id, body).await?))
}

/// DELETE /api/users/{id}
async fn delete_user(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> Result<StatusCode, ApiError> {
    state.user_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/admin/users/{id}
async fn admin_update_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<AdminUserUpdate>,
) -> Result<Json<UserUpdatedResponse>, ApiError> {
    let user = state.user_service.admin_update(id, body).await?;
    Ok(Json(UserUpdatedResponse {
        message: "User updated successfully",
        user,
    }))
}

/// DELETE /api/admin/users/{id}
async fn admin_delete_user(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.user_service.delete(id).await?;
    tracing::info!(user_id = id, admin_id = auth.user.id, "User deleted by admin");
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

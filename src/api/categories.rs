//! Category API endpoints
//!
//! One handler set serves every content type; the router for a kind is
//! mounted at `/api/admin/{kind}-categories`:
//! - GET|POST /
//! - GET|PUT|DELETE /{id}
//!
//! Plus:
//! - GET /api/admin/categories - document categories by name
//! - GET /api/document-categories - active document categories

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};

use crate::api::common::{ApiJson, ApiPath, MessageResponse};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{Category, CategoryKind, CreateCategoryInput, UpdateCategoryInput};

/// Build the admin category routes for one kind
pub fn router(kind: CategoryKind) -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
        .layer(Extension(kind))
}

/// Admin path segment of a kind's category routes
pub fn admin_path(kind: CategoryKind) -> String {
    format!("/admin/{}-categories", kind)
}

/// GET /api/admin/{kind}-categories
async fn list_categories(
    State(state): State<AppState>,
    Extension(kind): Extension<CategoryKind>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.category_service.list(kind).await?))
}

/// POST /api/admin/{kind}-categories
async fn create_category(
    State(state): State<AppState>,
    Extension(kind): Extension<CategoryKind>,
    ApiJson(body): ApiJson<CreateCategoryInput>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state.category_service.create(kind, body).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /api/admin/{kind}-categories/{id}
async fn get_category(
    State(state): State<AppState>,
    Extension(kind): Extension<CategoryKind>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.get(kind, id).await?))
}

/// PUT /api/admin/{kind}-categories/{id}
async fn update_category(
    State(state): State<AppState>,
    Extension(kind): Extension<CategoryKind>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateCategoryInput>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.update(kind, id, body).await?))
}

/// DELETE /api/admin/{kind}-categories/{id}
async fn delete_category(
    State(state): State<AppState>,
    Extension(kind): Extension<CategoryKind>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.category_service.delete(kind, id).await?;
    Ok(Json(MessageResponse::new("Category deleted successfully")))
}

/// GET /api/admin/categories
pub async fn list_document_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(
        state.category_service.list_by_name(CategoryKind::Document, false).await?,
    ))
}

/// GET /api/document-categories
pub async fn list_active_document_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(
        state.category_service.list_by_name(CategoryKind::Document, true).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_path_per_kind() {
        assert_eq!(admin_path(CategoryKind::Document), "/admin/document-categories");
        assert_eq!(admin_path(CategoryKind::Course), "/admin/course-categories");
        assert_eq!(admin_path(CategoryKind::News), "/admin/news-categories");
    }
}

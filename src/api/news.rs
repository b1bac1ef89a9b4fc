//! News API endpoints (admin)
//!
//! - GET /api/admin/news?category_id=&published=&featured=&search=&page=
//! - POST /api/admin/news (multipart)
//! - GET|PUT|DELETE /api/admin/news/{id}

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{
    list_params, non_empty, query_flag, query_id, ApiPath, MessageResponse, MultipartForm, NEWS_PER_PAGE,
};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{News, NewsFilter, PagedResult};
use crate::services::NewsForm;

/// Build the admin news routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_news).post(create_news))
        .route("/{id}", get(get_news).put(update_news).delete(delete_news))
}

#[derive(Debug, Default, Deserialize)]
pub struct NewsListQuery {
    pub page: Option<String>,
    pub category_id: Option<String>,
    pub published: Option<String>,
    pub featured: Option<String>,
    pub search: Option<String>,
}

fn news_form(mut form: MultipartForm) -> NewsForm {
    NewsForm {
        title: form.text("title"),
        description: form.text("description"),
        content: form.text("content"),
        category_id: form.text("category_id"),
        is_published: form.text("is_published"),
        is_featured: form.text("is_featured"),
        published_at: form.text("published_at"),
        image: form.file("image"),
        featured_image: form.file("featured_image"),
    }
}

/// GET /api/admin/news
async fn list_news(
    State(state): State<AppState>,
    Query(query): Query<NewsListQuery>,
) -> Result<Json<PagedResult<News>>, ApiError> {
    let params = list_params(query.page.as_deref(), NEWS_PER_PAGE);
    let filter = NewsFilter {
        category_id: query_id(query.category_id.as_deref()),
        published: query_flag(query.published.as_deref()),
        featured: query_flag(query.featured.as_deref()),
        search: non_empty(query.search),
    };
    Ok(Json(state.news_service.list(&filter, &params).await?))
}

/// POST /api/admin/news
async fn create_news(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = news_form(MultipartForm::read(multipart).await?);
    let news = state.news_service.create(form, Some(auth.user.id)).await?;
    Ok((StatusCode::CREATED, Json(news)))
}

/// GET /api/admin/news/{id}
async fn get_news(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> Result<Json<News>, ApiError> {
    Ok(Json(state.news_service.view(id).await?))
}

/// PUT /api/admin/news/{id}
async fn update_news(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    multipart: Multipart,
) -> Result<Json<News>, ApiError> {
    let form = news_form(MultipartForm::read(multipart).await?);
    Ok(Json(state.news_service.update(id, form).await?))
}

/// DELETE /api/admin/news/{id}
async fn delete_news(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> Result<Json<MessageResponse>, ApiError> {
    state.news_service.delete(id).await?;
    Ok(Json(MessageResponse::new("News deleted successfully")))
}

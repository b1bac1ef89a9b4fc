//! Course API endpoints (admin)
//!
//! - GET /api/admin/courses?type=&category=&published=&featured=&search=&page=
//! - POST /api/admin/courses (multipart)
//! - GET|PUT|DELETE /api/admin/courses/{id}
//! - GET /api/admin/courses/{id}/tests

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::str::FromStr;

use crate::api::common::{list_params, non_empty, query_flag, ApiPath, MessageResponse, MultipartForm, COURSES_PER_PAGE};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Course, CourseFilter, CourseType, PagedResult, Test};
use crate::services::CourseForm;

/// Build the admin course routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_courses).post(create_course))
        .route("/{id}", get(get_course).put(update_course).delete(delete_course))
        .route("/{id}/tests", get(course_tests))
}

#[derive(Debug, Default, Deserialize)]
pub struct CourseListQuery {
    pub page: Option<String>,
    #[serde(rename = "type")]
    pub course_type: Option<String>,
    pub category: Option<String>,
    pub published: Option<String>,
    pub featured: Option<String>,
    pub search: Option<String>,
}

impl CourseListQuery {
    fn filter(self) -> CourseFilter {
        CourseFilter {
            course_type: self
                .course_type
                .as_deref()
                .and_then(|t| CourseType::from_str(t.trim()).ok()),
            category: non_empty(self.category),
            published: query_flag(self.published.as_deref()),
            featured: query_flag(self.featured.as_deref()),
            search: non_empty(self.search),
        }
    }
}

/// Map multipart parts onto the course form
fn course_form(mut form: MultipartForm) -> CourseForm {
    CourseForm {
        title: form.text("title"),
        description: form.text("description"),
        content: form.text("content"),
        price: form.text("price"),
        course_type: form.text("type"),
        category: form.text("category"),
        max_students: form.text("max_students"),
        duration_hours: form.text("duration_hours"),
        requirements: form.text("requirements"),
        learning_outcomes: form.text("learning_outcomes"),
        zoom_link: form.text("zoom_link"),
        schedule: form.text("schedule"),
        is_published: form.text("is_published"),
        is_featured: form.text("is_featured"),
        featured_image: form.file("featured_image"),
        certificate_template: form.file("certificate_template"),
    }
}

/// GET /api/admin/courses
async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<CourseListQuery>,
) -> Result<Json<PagedResult<Course>>, ApiError> {
    let params = list_params(query.page.as_deref(), COURSES_PER_PAGE);
    let filter = query.filter();
    Ok(Json(state.course_service.list(&filter, &params).await?))
}

/// POST /api/admin/courses
async fn create_course(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = course_form(MultipartForm::read(multipart).await?);
    let course = state.course_service.create(form, Some(auth.user.id)).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// GET /api/admin/courses/{id}
async fn get_course(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> Result<Json<Course>, ApiError> {
    Ok(Json(state.course_service.view(id).await?))
}

/// PUT /api/admin/courses/{id}
async fn update_course(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    multipart: Multipart,
) -> Result<Json<Course>, ApiError> {
    let form = course_form(MultipartForm::read(multipart).await?);
    Ok(Json(state.course_service.update(id, form).await?))
}

/// DELETE /api/admin/courses/{id}
async fn delete_course(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.course_service.delete(id).await?;
    Ok(Json(MessageResponse::new("Course deleted successfully")))
}

/// GET /api/admin/courses/{id}/tests
async fn course_tests(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> Result<Json<Vec<Test>>, ApiError> {
    Ok(Json(state.course_service.tests(id).await?))
}

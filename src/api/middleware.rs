//! API middleware
//!
//! Contains:
//! - Application state shared by every handler
//! - The JSON error type and the mapping from service errors
//! - Authentication (bearer token validation)
//! - Authorization (admin role gate)

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::create_cache;
use crate::config::{Config, StorageConfig};
use crate::db::repositories::{
    SqlxCategoryRepository, SqlxCourseRepository, SqlxDocumentRepository, SqlxNewsRepository, SqlxTestRepository,
    SqlxTokenRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use crate::services::token::parse_bearer;
use crate::services::{
    CategoryService, CategoryServiceError, ContentServiceError, CourseService, DashboardService, DocumentService,
    NewsService, Storage, TestService, UserService, UserServiceError, ValidationErrors,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub category_service: Arc<CategoryService>,
    pub document_service: Arc<DocumentService>,
    pub course_service: Arc<CourseService>,
    pub news_service: Arc<NewsService>,
    pub test_service: Arc<TestService>,
    pub dashboard_service: Arc<DashboardService>,
    pub storage: Arc<Storage>,
    pub storage_config: Arc<StorageConfig>,
}

impl AppState {
    /// Wire repositories, cache, storage and services over one pool
    pub fn new(config: &Config, pool: DynDatabasePool) -> Self {
        let cache = create_cache(&config.cache);
        let storage = Arc::new(Storage::new(config.storage.path.clone()));

        let course_repo = SqlxCourseRepository::boxed(pool.clone());
        let test_repo = SqlxTestRepository::boxed(pool.clone());

        let user_service = Arc::new(UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxTokenRepository::boxed(pool.clone()),
            config.auth.token_ttl_days,
        ));
        let category_service = Arc::new(CategoryService::new(SqlxCategoryRepository::boxed(pool.clone()), cache));
        let document_service = Arc::new(DocumentService::new(
            SqlxDocumentRepository::boxed(pool.clone()),
            category_service.clone(),
            storage.clone(),
            config.storage.clone(),
        ));
        let course_service = Arc::new(CourseService::new(
            course_repo.clone(),
            test_repo.clone(),
            category_service.clone(),
            storage.clone(),
            config.storage.clone(),
        ));
        let news_service = Arc::new(NewsService::new(
            SqlxNewsRepository::boxed(pool.clone()),
            category_service.clone(),
            storage.clone(),
            config.storage.clone(),
        ));
        let test_service = Arc::new(TestService::new(test_repo, course_repo));
        let dashboard_service = Arc::new(DashboardService::new(
            document_service.clone(),
            course_service.clone(),
            news_service.clone(),
            test_service.clone(),
            user_service.clone(),
        ));

        Self {
            pool,
            user_service,
            category_service,
            document_service,
            course_service,
            news_service,
            test_service,
            dashboard_service,
            storage,
            storage_config: Arc::new(config.storage.clone()),
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    /// Id of the access token the request was made with
    pub token_id: i64,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Unauthorized"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(code: impl Into<String>, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new("PAYLOAD_TOO_LARGE", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    /// 422 carrying every field message under `details.errors`
    pub fn validation(errors: ValidationErrors) -> Self {
        let message = errors.to_string();
        Self::with_details(
            "VALIDATION_ERROR",
            message,
            serde_json::json!({ "errors": errors }),
        )
    }

    /// Single-field validation failure
    pub fn validation_error(field: &str, message: impl Into<String>) -> Self {
        Self::validation(ValidationErrors::single(field, message))
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::UNPROCESSABLE_ENTITY,
            "CONFLICT" => StatusCode::CONFLICT,
            "BAD_REQUEST" => StatusCode::BAD_REQUEST,
            "PAYLOAD_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::validation(errors)
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::Unauthorized | UserServiceError::InvalidToken | UserServiceError::TokenExpired => {
                ApiError::unauthorized(err.to_string())
            }
            UserServiceError::ValidationError(errors) => ApiError::validation(errors),
            UserServiceError::NotFound => ApiError::not_found(err.to_string()),
            UserServiceError::InternalError(e) => {
                tracing::error!("User service failure: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(err: CategoryServiceError) -> Self {
        match err {
            CategoryServiceError::NotFound => ApiError::not_found(err.to_string()),
            CategoryServiceError::ValidationError(errors) => ApiError::validation(errors),
            CategoryServiceError::InUse(msg) => ApiError::validation_error("category", msg),
            CategoryServiceError::InternalError(e) => {
                tracing::error!("Category service failure: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<ContentServiceError> for ApiError {
    fn from(err: ContentServiceError) -> Self {
        match err {
            ContentServiceError::NotFound(msg) => ApiError::not_found(msg),
            ContentServiceError::ValidationError(errors) => ApiError::validation(errors),
            ContentServiceError::BadRequest(msg) => ApiError::bad_request(msg),
            ContentServiceError::InternalError(e) => {
                tracing::error!("Content service failure: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

/// Extract the bearer token from the Authorization header
fn extract_bearer_token(request: &Request) -> Option<String> {
    let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    parse_bearer(value).map(str::to_string)
}

/// Authentication middleware
///
/// Rejects missing, unknown and expired tokens with 401; a valid token
/// has its `last_used_at` refreshed and the user attached to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&request).ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;

    let (user, access_token) = state.user_service.authenticate(&token).await.map_err(|e| {
        if !matches!(e, UserServiceError::InternalError(_)) {
            tracing::warn!(path = %request.uri().path(), "Rejected token: {}", e);
        }
        ApiError::from(e)
    })?;

    request.extensions_mut().insert(AuthenticatedUser {
        user,
        token_id: access_token.id,
    });
    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let auth = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;

    if auth.user.role != UserRole::Admin {
        return Err(ApiError::forbidden("Unauthorized. Admin access required."));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_auth(value: &str) -> Request<Body> {
        axum::http::Request::builder()
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_extract_bearer_token() {
        let request = request_with_auth("Bearer abc123");
        assert_eq!(extract_bearer_token(&request), Some("abc123".to_string()));
    }

    #[test]
    fn test_extract_bearer_token_rejects_other_schemes() {
        let request = request_with_auth("Basic dXNlcjpwYXNz");
        assert_eq!(extract_bearer_token(&request), None);

        let request = axum::http::Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_bearer_token(&request), None);
    }

    fn user_with_role(role: UserRole) -> AuthenticatedUser {
        let now = chrono::Utc::now();
        AuthenticatedUser {
            user: User {
                id: 1,
                username: "someone".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                email: "someone@example.com".to_string(),
                phone: None,
                password_hash: String::new(),
                role,
                created_at: now,
                updated_at: now,
            },
            token_id: 1,
        }
    }

    async fn admin_gate_status(auth: Option<AuthenticatedUser>) -> StatusCode {
        use axum::{middleware::from_fn, routing::get, Extension, Router};
        use tower::ServiceExt;

        let mut app = Router::new()
            .route("/", get(|| async { "ok" }))
            .route_layer(from_fn(require_admin));
        if let Some(auth) = auth {
            app = app.layer(Extension(auth));
        }

        let request = axum::http::Request::builder().uri("/").body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_require_admin() {
        assert_eq!(admin_gate_status(Some(user_with_role(UserRole::Admin))).await, StatusCode::OK);
        assert_eq!(
            admin_gate_status(Some(user_with_role(UserRole::User))).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(admin_gate_status(None).await, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::payload_too_large("x").status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ApiError::new("CONFLICT", "x").status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::internal_error("x").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_error_details() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "The title field is required.");
        errors.add("price", "The price must be a number.");

        let err = ApiError::from(errors);
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error.code, "VALIDATION_ERROR");
        let details = err.error.details.unwrap();
        assert_eq!(details["errors"]["title"][0], "The title field is required.");
        assert_eq!(details["errors"]["price"][0], "The price must be a number.");
    }

    #[test]
    fn test_service_error_mapping() {
        let err = ApiError::from(UserServiceError::TokenExpired);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.error.message, "Token expired");

        let err = ApiError::from(ContentServiceError::not_found("Document"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.error.message, "Document not found");

        let err = ApiError::from(ContentServiceError::BadRequest("Preview is only available for PDF files".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = ApiError::from(CategoryServiceError::InUse("in use".into()));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = ApiError::from(ContentServiceError::InternalError(anyhow::anyhow!("db down")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.error.message.contains("db down"));
    }
}

//! API layer - HTTP handlers and routing
//!
//! All JSON endpoints live under `/api`:
//! - Auth endpoints (register, login, logout, current user)
//! - User endpoints (authenticated) and user administration
//! - Document, course, news and test administration
//! - Per-type category administration
//! - Public document listing, preview and download
//! - Dashboard statistics
//!
//! Stored images are served from `/storage`.

pub mod auth;
pub mod categories;
pub mod common;
pub mod courses;
pub mod dashboard;
pub mod documents;
pub mod middleware;
pub mod news;
pub mod site;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::models::CategoryKind;

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Room for multipart framing and text fields around the largest file
const BODY_LIMIT_OVERHEAD: u64 = 1024 * 1024;

/// Build the `/api` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let mut admin_routes = Router::new()
        .nest("/admin/users", users::admin_router())
        .nest("/admin/documents", documents::admin_router())
        .nest("/admin/courses", courses::router())
        .nest("/admin/news", news::router())
        .nest("/admin/tests", tests::router())
        .route("/admin/categories", get(categories::list_document_categories))
        .route("/admin/stats", get(dashboard::get_stats));
    for kind in CategoryKind::ALL {
        admin_routes = admin_routes.nest(&categories::admin_path(kind), categories::router(kind));
    }
    let admin_routes = admin_routes
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/users", users::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .route("/ping", get(site::ping))
        .nest("/auth", auth::public_router())
        .nest("/documents", documents::public_router())
        .route("/document-categories", get(categories::list_active_document_categories))
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let largest_upload = state
        .storage_config
        .max_document_size
        .max(state.storage_config.max_image_size);
    let body_limit = usize::try_from(largest_upload + BODY_LIMIT_OVERHEAD).unwrap_or(usize::MAX);

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .route("/storage/{*path}", get(site::serve_storage))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    if cors_origin.trim() == "*" {
        return cors.allow_origin(Any);
    }
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!(cors_origin, "Invalid CORS origin, cross-origin requests will be refused");
            cors
        }
    }
}

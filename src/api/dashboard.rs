//! Admin dashboard API
//!
//! - GET /api/admin/stats

use axum::{extract::State, Json};

use crate::api::middleware::{ApiError, AppState};
use crate::services::DashboardStats;

/// GET /api/admin/stats
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(state.dashboard_service.stats().await?))
}

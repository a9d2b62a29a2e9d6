use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiResponse, AppState, HealthDto};

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthDto>> {
    let database = state.store.ping().await.is_ok();

    Json(ApiResponse::success(HealthDto {
        status: if database { "ok" } else { "degraded" },
        database,
        uptime_seconds: state.start_time.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
    }))
}

//! 健康检查 API

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;
use tracing::warn;

use crate::domain::HealthResponse;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}

/// 引擎可达返回 200，否则 503
///
/// GET /api/health
async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    match state.lifecycle.health_check().await {
        Ok(resp) => (StatusCode::OK, Json(resp)),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::unavailable(e.to_string())),
            )
        }
    }
}

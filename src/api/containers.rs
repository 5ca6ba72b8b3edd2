//! 容器管理 API
//!
//! 包含 /containers/* 端点

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::domain::{ActionResponse, ContainerStartRequest, ContainerStartResponse, ContainerSummary};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::detach;

/// 创建容器管理路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/containers", get(list_containers))
        .route("/containers/start", post(start_from_image))
        .route("/containers/:id/stop", post(stop_container))
        .route("/containers/:id/start", post(start_container))
        .route("/containers/:id", delete(remove_container))
}

/// GET /api/containers
async fn list_containers(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<ContainerSummary>>> {
    let lifecycle = state.lifecycle.clone();
    detach(async move { lifecycle.list_containers().await })
        .await
        .map(Json)
}

/// 从镜像启动新容器，自动分配宿主端口
///
/// POST /api/containers/start (json: imageId, containerName?)
async fn start_from_image(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ContainerStartRequest>, JsonRejection>,
) -> ApiResult<Json<ContainerStartResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::validation(e.body_text()))?;
    let lifecycle = state.lifecycle.clone();
    detach(async move { lifecycle.start_container_from_image(request).await })
        .await
        .map(Json)
}

/// POST /api/containers/:id/stop
async fn stop_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ActionResponse>> {
    let lifecycle = state.lifecycle.clone();
    detach(async move { lifecycle.stop_container(&id).await })
        .await
        .map(Json)
}

/// POST /api/containers/:id/start
async fn start_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ActionResponse>> {
    let lifecycle = state.lifecycle.clone();
    detach(async move { lifecycle.start_stopped_container(&id).await })
        .await
        .map(Json)
}

/// DELETE /api/containers/:id
async fn remove_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ActionResponse>> {
    let lifecycle = state.lifecycle.clone();
    detach(async move { lifecycle.remove_container(&id).await })
        .await
        .map(Json)
}

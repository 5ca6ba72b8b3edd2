//! API 模块
//!
//! HTTP handlers 和路由组装，所有路由挂在 `/api` 下

pub mod containers;
pub mod health;
pub mod images;
pub mod upload;

use axum::{extract::DefaultBodyLimit, Router};
use std::future::Future;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// 构建完整的 API 路由
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;

    let api = Router::new()
        .merge(health::router())
        .merge(images::router())
        .merge(containers::router());

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 在独立任务中执行操作
///
/// 客户端断开只会丢弃 handler 的 future，引擎侧的构建/导出/启动会继续跑完
pub(crate) async fn detach<T, F>(operation: F) -> ApiResult<T>
where
    F: Future<Output = ApiResult<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(operation)
        .await
        .map_err(|e| ApiError::internal(format!("Operation task failed: {}", e)))?
}

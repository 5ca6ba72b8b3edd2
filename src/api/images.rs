//! 镜像 API
//!
//! 包含构建、导出/下载、导入、删除和文件查看端点

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use axum::extract::multipart::MultipartRejection;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::config::env::constants::MAX_ADDITIONAL_FILES;
use crate::domain::{
    ActionResponse, BuildResponse, ExportRequest, ExportResponse, ImageFilesResponse,
    ImageSummary, ImportResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::services::build_context::BuildContextError;
use crate::services::{BuildRequest, ImportRequest};
use crate::state::AppState;

use super::detach;
use super::upload::{multipart_error, multipart_rejection, spool_field, text_field};

/// 创建镜像路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/images", get(list_images))
        .route("/images/:id", delete(delete_image))
        .route("/images/:id/files", get(image_files))
        .route("/build", post(build_image))
        .route("/export", post(export_image))
        .route("/download/:filename", get(download_export))
        .route("/import", post(import_image))
}

/// GET /api/images
async fn list_images(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<ImageSummary>>> {
    let lifecycle = state.lifecycle.clone();
    detach(async move { lifecycle.list_images().await })
        .await
        .map(Json)
}

/// 构建镜像
///
/// POST /api/build (multipart: dockerfile, additionalFiles[], imageName, imageTag)
async fn build_image(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<BuildResponse>> {
    let mut multipart = multipart.map_err(multipart_rejection)?;
    let upload_dir = &state.config.upload_dir;
    let mut request = BuildRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "dockerfile" => request.dockerfile = Some(spool_field(field, upload_dir).await?),
            "additionalFiles" | "additionalFiles[]" => {
                if request.additional_files.len() >= MAX_ADDITIONAL_FILES {
                    return Err(BuildContextError::TooManyFiles {
                        count: request.additional_files.len() + 1,
                        max: MAX_ADDITIONAL_FILES,
                    }
                    .into());
                }
                request
                    .additional_files
                    .push(spool_field(field, upload_dir).await?);
            }
            "imageName" => request.image_name = text_field(field).await?,
            "imageTag" => request.image_tag = Some(text_field(field).await?),
            _ => debug!(field = %name, "Ignoring unknown multipart field"),
        }
    }

    let lifecycle = state.lifecycle.clone();
    detach(async move { lifecycle.build_image(request).await })
        .await
        .map(Json)
}

/// 导出镜像
///
/// POST /api/export (json: imageId, imageName)
async fn export_image(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ExportRequest>, JsonRejection>,
) -> ApiResult<Json<ExportResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::validation(e.body_text()))?;
    let lifecycle = state.lifecycle.clone();
    detach(async move { lifecycle.export_image(request).await })
        .await
        .map(Json)
}

/// 下载导出文件
///
/// GET /api/download/:filename
async fn download_export(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let path = state.lifecycle.resolve_download(&filename).await?;
    let file = tokio::fs::File::open(&path).await?;
    let length = file.metadata().await?.len();

    let headers = [
        (header::CONTENT_TYPE, "application/x-tar".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
        (header::CONTENT_LENGTH, length.to_string()),
    ];
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((headers, body).into_response())
}

/// 导入镜像
///
/// POST /api/import (multipart: imageFile, imageName, imageTag)
async fn import_image(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ImportResponse>> {
    let mut multipart = multipart.map_err(multipart_rejection)?;
    let mut request = ImportRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "imageFile" => {
                request.archive = Some(spool_field(field, &state.config.upload_dir).await?)
            }
            "imageName" => request.image_name = Some(text_field(field).await?),
            "imageTag" => request.image_tag = Some(text_field(field).await?),
            _ => debug!(field = %name, "Ignoring unknown multipart field"),
        }
    }

    let lifecycle = state.lifecycle.clone();
    detach(async move { lifecycle.import_image(request).await })
        .await
        .map(Json)
}

/// DELETE /api/images/:id
async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ActionResponse>> {
    let lifecycle = state.lifecycle.clone();
    detach(async move { lifecycle.delete_image(&id).await })
        .await
        .map(Json)
}

/// 查看镜像内容目录
///
/// GET /api/images/:id/files
async fn image_files(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ImageFilesResponse>> {
    let lifecycle = state.lifecycle.clone();
    detach(async move { lifecycle.inspect_image_files(&id).await })
        .await
        .map(Json)
}

//! multipart 上传落盘
//!
//! 文件字段按块写入上传目录，返回的 `TransientFile` 在第一次写入前就已创建，
//! 中途出错时半个文件也会被删除

use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::error::{ApiError, ApiResult};
use crate::services::janitor::{upload_path, TransientFile};

/// 把文件字段写入上传目录，目录不存在时先创建
pub async fn spool_field(mut field: Field<'_>, dir: &Path) -> ApiResult<TransientFile> {
    let original = field
        .file_name()
        .or_else(|| field.name())
        .unwrap_or("upload")
        .to_string();

    tokio::fs::create_dir_all(dir).await?;
    let path = upload_path(dir, &original);
    let guard = TransientFile::new(path.clone(), original);

    let mut file = tokio::fs::File::create(&path).await?;
    let mut written = 0usize;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        file.write_all(&chunk).await?;
        written += chunk.len();
    }
    file.flush().await?;

    tracing::debug!(
        file = %guard.original_name(),
        path = %path.display(),
        bytes = written,
        "Spooled upload"
    );
    Ok(guard)
}

/// 读取文本字段
pub async fn text_field(field: Field<'_>) -> ApiResult<String> {
    field.text().await.map_err(multipart_error)
}

pub fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::validation(format!("Invalid multipart body: {}", err.body_text()))
}

pub fn multipart_rejection(rejection: MultipartRejection) -> ApiError {
    ApiError::validation(rejection.body_text())
}

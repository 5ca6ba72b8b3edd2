//! 统一错误处理
//!
//! 提供 `ApiError` 枚举实现 `IntoResponse`，所有操作的失败都映射成一致的 `{error: string}` 响应体

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::infra::engine::EngineError;
use crate::services::build_context::BuildContextError;

/// API 错误响应结构
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// 可直接展示给用户的错误信息
    pub error: String,
    /// 错误类别 (validation_error, engine_unavailable, ...)
    pub kind: &'static str,
    /// 失败前已经创建的容器 ID，供人工处理
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    /// 失败前已产生的构建日志
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

impl ErrorResponse {
    pub fn new(kind: &'static str, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind,
            container_id: None,
            logs: None,
        }
    }

    pub fn with_container_id(mut self, container_id: Option<String>) -> Self {
        self.container_id = container_id;
        self
    }

    pub fn with_logs(mut self, logs: Option<String>) -> Self {
        self.logs = logs;
        self
    }
}

/// 统一 API 错误类型
#[derive(Debug)]
pub enum ApiError {
    /// 400 - 缺少必填字段等客户端可修复的问题
    Validation(String),
    /// 503 - 无法连接容器引擎
    EngineUnavailable(String),
    /// 500 - 引擎拒绝了构建/导出/导入/生命周期操作
    EngineOperationFailed {
        message: String,
        /// 已创建但未能启动的容器
        container_id: Option<String>,
        /// 构建失败时的部分日志
        logs: Option<String>,
    },
    /// 500 - 导入后无法确定新镜像
    ImportResolutionFailed(String),
    /// 404 - 资源未找到
    NotFound(String),
    /// 500 - 内部错误（本地文件系统等）
    Internal(String),
}

impl ApiError {
    /// 创建校验错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// 创建未找到错误
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// 创建引擎操作失败错误
    pub fn engine_failed(message: impl Into<String>) -> Self {
        Self::EngineOperationFailed {
            message: message.into(),
            container_id: None,
            logs: None,
        }
    }

    /// 附加已创建容器的 ID（仅对引擎操作失败有效）
    pub fn with_container_id(self, id: impl Into<String>) -> Self {
        match self {
            ApiError::EngineOperationFailed { message, logs, .. } => {
                ApiError::EngineOperationFailed {
                    message,
                    container_id: Some(id.into()),
                    logs,
                }
            }
            other => other,
        }
    }

    /// 错误类别代码
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::EngineUnavailable(_) => "engine_unavailable",
            ApiError::EngineOperationFailed { .. } => "engine_operation_failed",
            ApiError::ImportResolutionFailed(_) => "import_resolution_failed",
            ApiError::NotFound(_) => "resource_not_found",
            ApiError::Internal(_) => "internal_error",
        }
    }

    /// HTTP 状态码
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::EngineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::EngineOperationFailed { .. }
            | ApiError::ImportResolutionFailed(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable(msg) => ApiError::EngineUnavailable(msg),
            other => ApiError::engine_failed(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<BuildContextError> for ApiError {
    fn from(err: BuildContextError) -> Self {
        match err {
            BuildContextError::Io(e) => ApiError::Internal(e.to_string()),
            other => ApiError::Validation(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        let body = match self {
            ApiError::NotFound(resource) => {
                ErrorResponse::new(kind, format!("{} not found", resource))
            }
            ApiError::EngineOperationFailed {
                message,
                container_id,
                logs,
            } => ErrorResponse::new(kind, message)
                .with_container_id(container_id)
                .with_logs(logs),
            ApiError::Validation(msg)
            | ApiError::EngineUnavailable(msg)
            | ApiError::ImportResolutionFailed(msg)
            | ApiError::Internal(msg) => ErrorResponse::new(kind, msg),
        };

        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Validation(m) => write!(f, "Validation error: {}", m),
            ApiError::EngineUnavailable(m) => write!(f, "Engine unavailable: {}", m),
            ApiError::EngineOperationFailed {
                message,
                container_id: Some(id),
                ..
            } => write!(f, "Engine operation failed: {} (container {})", message, id),
            ApiError::EngineOperationFailed { message, .. } => {
                write!(f, "Engine operation failed: {}", message)
            }
            ApiError::ImportResolutionFailed(m) => write!(f, "Import resolution failed: {}", m),
            ApiError::NotFound(r) => write!(f, "Not found: {}", r),
            ApiError::Internal(m) => write!(f, "Internal error: {}", m),
        }
    }
}

impl std::error::Error for ApiError {}

/// 便捷类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_skips_empty_fields() {
        let resp = ErrorResponse::new("validation_error", "imageName is required");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["error"], "imageName is required");
        assert!(json.get("containerId").is_none());
        assert!(json.get("logs").is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::EngineUnavailable("down".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::engine_failed("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_container_id_attached_only_to_engine_failures() {
        let err = ApiError::engine_failed("start failed").with_container_id("abc123");
        assert!(matches!(
            err,
            ApiError::EngineOperationFailed { container_id: Some(ref id), .. } if id == "abc123"
        ));

        let err = ApiError::validation("x").with_container_id("abc123");
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_engine_error_conversion() {
        let err: ApiError = EngineError::Unavailable("no daemon".into()).into();
        assert!(matches!(err, ApiError::EngineUnavailable(_)));

        let err: ApiError = EngineError::OperationFailed {
            operation: "rmi",
            message: "image is in use".into(),
        }
        .into();
        assert_eq!(err.kind(), "engine_operation_failed");
    }

    #[test]
    fn test_build_context_error_conversion() {
        let err: ApiError = BuildContextError::MissingDockerfile.into();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "dockerfile is required"));

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: ApiError = BuildContextError::Io(io).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

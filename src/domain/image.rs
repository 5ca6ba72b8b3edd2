//! 镜像相关领域模型

use serde::{Deserialize, Serialize};

/// 镜像信息（`docker images --format '{{json .}}'` 的一行）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageSummary {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub created_since: String,
    #[serde(default)]
    pub size: String,
}

/// 构建响应
#[derive(Debug, Clone, Serialize)]
pub struct BuildResponse {
    pub success: bool,
    pub message: String,
    /// 镜像引用 `name:tag`
    pub image: String,
    pub logs: String,
}

/// 导出请求
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    #[serde(default)]
    pub image_id: String,
    /// 导出文件名前缀，默认 `docker-image`
    #[serde(default)]
    pub image_name: Option<String>,
}

/// 导出产物，落盘后直到外部清理前一直保留
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArtifact {
    pub file_name: String,
    pub file_path: String,
    pub download_url: String,
}

/// 导出响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub artifact: ExportArtifact,
}

/// 导入后确定镜像 ID 所用的方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMethod {
    /// 输出中的 `Loaded image: <ref>`
    Exact,
    /// 输出中第一个 `sha256:<hex>`
    DigestScan,
    /// 镜像列表中最新的一个（并发导入时可能打错标签）
    Fallback,
}

impl ResolutionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMethod::Exact => "exact",
            ResolutionMethod::DigestScan => "digest-scan",
            ResolutionMethod::Fallback => "fallback",
        }
    }
}

/// 导入响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    /// 新打的标签 `name:tag`
    pub image_name: String,
    /// 被打标签的源镜像引用或 ID
    pub resolved_image: String,
    pub resolution_method: ResolutionMethod,
}

/// 镜像文件列表响应
#[derive(Debug, Clone, Serialize)]
pub struct ImageFilesResponse {
    pub success: bool,
    pub files: Vec<String>,
    pub raw: String,
}

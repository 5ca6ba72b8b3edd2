//! 生命周期协调
//!
//! 把「构建这个上下文」「导出这个镜像」「给容器找个空闲端口」这类请求翻译成按顺序执行的引擎调用。
//! 每个操作都是一个独立的请求/响应单元：
//! - 先校验必填字段，校验失败不会触发任何引擎调用
//! - 引擎调用严格按顺序执行，不重试
//! - 改变了引擎状态之后的失败会带上资源 ID 返回，方便人工处理

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::env::constants::{
    DEFAULT_EXPORT_NAME, DEFAULT_IMPORT_NAME, DEFAULT_TAG,
};
use crate::config::EnvConfig;
use crate::domain::{
    ActionResponse, BuildResponse, ContainerStartRequest, ContainerStartResponse,
    ContainerSummary, ExportArtifact, ExportRequest, ExportResponse, HealthResponse,
    ImageFilesResponse, ImageSummary, ImportResponse, ResolutionMethod,
};
use crate::error::{ApiError, ApiResult};
use crate::infra::{ContainerEngine, ContainerSpec};

use super::janitor::{sanitize_file_name, TransientFile};
use super::{build_context, file_inspector, import_resolver, port_allocator};

/// 构建请求
///
/// 上传文件由 `TransientFile` 持有，请求结束时一并删除
#[derive(Debug, Default)]
pub struct BuildRequest {
    pub image_name: String,
    pub image_tag: Option<String>,
    pub dockerfile: Option<TransientFile>,
    pub additional_files: Vec<TransientFile>,
}

/// 导入请求
#[derive(Debug, Default)]
pub struct ImportRequest {
    pub archive: Option<TransientFile>,
    pub image_name: Option<String>,
    pub image_tag: Option<String>,
}

/// 生命周期协调器
#[derive(Clone)]
pub struct Lifecycle {
    engine: Arc<dyn ContainerEngine>,
    config: EnvConfig,
}

impl Lifecycle {
    pub fn new(engine: Arc<dyn ContainerEngine>, config: EnvConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// 健康检查
    pub async fn health_check(&self) -> ApiResult<HealthResponse> {
        self.engine.ping().await?;
        Ok(HealthResponse::ok("Docker daemon is running"))
    }

    pub async fn list_images(&self) -> ApiResult<Vec<ImageSummary>> {
        Ok(self.engine.list_images().await?)
    }

    pub async fn list_containers(&self) -> ApiResult<Vec<ContainerSummary>> {
        Ok(self.engine.list_containers().await?)
    }

    /// 构建镜像
    ///
    /// 上传文件在读入构建上下文后立即删除；构建日志无论成败都返回
    pub async fn build_image(&self, request: BuildRequest) -> ApiResult<BuildResponse> {
        let BuildRequest {
            image_name,
            image_tag,
            dockerfile,
            additional_files,
        } = request;

        let assembled =
            build_context::assemble(&image_name, dockerfile.as_ref(), &additional_files).await;
        drop(dockerfile);
        drop(additional_files);
        let context = assembled?;

        let reference = format!(
            "{}:{}",
            image_name.trim(),
            or_default(image_tag.as_deref(), DEFAULT_TAG)
        );
        info!(image = %reference, context_bytes = context.len(), "Building image");

        let output = self.engine.build_image(context, &reference).await?;
        if !output.succeeded {
            error!(image = %reference, "Image build failed");
            return Err(ApiError::EngineOperationFailed {
                message: format!("Build of image {} failed", reference),
                container_id: None,
                logs: Some(output.logs),
            });
        }

        info!(image = %reference, "Image built");
        Ok(BuildResponse {
            success: true,
            message: format!("Image {} built successfully", reference),
            image: reference,
            logs: output.logs,
        })
    }

    /// 导出镜像为 tar
    ///
    /// 成功的导出文件会一直保留；失败时删除写了一半的文件
    pub async fn export_image(&self, request: ExportRequest) -> ApiResult<ExportResponse> {
        let image_id = require(&request.image_id, "imageId")?;
        let prefix = sanitize_file_name(or_default(
            request.image_name.as_deref(),
            DEFAULT_EXPORT_NAME,
        ));

        tokio::fs::create_dir_all(&self.config.export_dir).await?;
        let file_name = self.unique_export_name(&prefix).await;
        let file_path = self.config.export_dir.join(&file_name);

        info!(image = %image_id, file = %file_path.display(), "Exporting image");

        if let Err(e) = self.engine.save_image(image_id, &file_path).await {
            error!(image = %image_id, error = %e, "Image export failed");
            remove_partial_export(&file_path).await;
            return Err(e.into());
        }

        Ok(ExportResponse {
            success: true,
            message: format!("Image {} exported successfully", image_id),
            artifact: ExportArtifact {
                download_url: format!("/api/download/{}", file_name),
                file_path: file_path.to_string_lossy().into_owned(),
                file_name,
            },
        })
    }

    /// 定位可下载的导出文件
    ///
    /// 只接受导出目录下的单段文件名，`.`、`..` 和带路径分隔符的名字一律视为不存在
    pub async fn resolve_download(&self, file_name: &str) -> ApiResult<PathBuf> {
        let not_found = || ApiError::not_found(format!("Export file '{}'", file_name));

        let single_segment =
            std::path::Path::new(file_name).file_name() == Some(std::ffi::OsStr::new(file_name));
        if !single_segment || file_name.contains('\\') {
            return Err(not_found());
        }

        let path = self.config.export_dir.join(file_name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(not_found()),
        }
    }

    /// 从 tar 导入镜像并打标签
    pub async fn import_image(&self, request: ImportRequest) -> ApiResult<ImportResponse> {
        let archive = request
            .archive
            .ok_or_else(|| ApiError::validation("imageFile is required"))?;
        let repo = or_default(request.image_name.as_deref(), DEFAULT_IMPORT_NAME).to_string();
        let tag = or_default(request.image_tag.as_deref(), DEFAULT_TAG).to_string();
        let target = format!("{}:{}", repo, tag);

        info!(archive = %archive.original_name(), target = %target, "Importing image");

        let loaded = self.engine.load_image(archive.path()).await;
        drop(archive);
        let load_output = loaded?;

        let resolution = match import_resolver::resolve_from_output(&load_output) {
            Some(resolution) => resolution,
            None => {
                let images = self.engine.list_images().await?;
                import_resolver::resolve_from_listing(&images).ok_or_else(|| {
                    ApiError::ImportResolutionFailed(
                        "Could not determine the loaded image: load output had no reference and no images are listed"
                            .to_string(),
                    )
                })?
            }
        };

        if resolution.method == ResolutionMethod::Fallback {
            warn!(
                resolved = %resolution.reference,
                "Load output had no image reference, tagging the most recent image"
            );
        }

        self.engine
            .tag_image(&resolution.reference, &repo, &tag)
            .await
            .map_err(|e| match ApiError::from(e) {
                ApiError::EngineOperationFailed { message, .. } => ApiError::engine_failed(format!(
                    "Image loaded as {} but tagging as {} failed: {}",
                    resolution.reference, target, message
                )),
                other => other,
            })?;

        info!(
            resolved = %resolution.reference,
            method = resolution.method.as_str(),
            target = %target,
            "Image imported"
        );

        Ok(ImportResponse {
            success: true,
            message: format!("Image imported and tagged as {}", target),
            image_name: target,
            resolved_image: resolution.reference,
            resolution_method: resolution.method,
        })
    }

    /// 强制删除镜像
    pub async fn delete_image(&self, image_id: &str) -> ApiResult<ActionResponse> {
        let image_id = require(image_id, "imageId")?;
        self.engine.remove_image(image_id, true).await?;
        info!(image = %image_id, "Image deleted");
        Ok(ActionResponse::ok(format!("Image {} deleted", image_id)))
    }

    /// 列出镜像中的内容文件
    pub async fn inspect_image_files(&self, image_id: &str) -> ApiResult<ImageFilesResponse> {
        let image_id = require(image_id, "imageId")?;
        let listing = file_inspector::inspect(self.engine.as_ref(), image_id).await?;
        Ok(ImageFilesResponse {
            success: true,
            files: listing.files,
            raw: listing.raw,
        })
    }

    /// 从镜像创建并启动容器，自动分配宿主端口
    pub async fn start_container_from_image(
        &self,
        request: ContainerStartRequest,
    ) -> ApiResult<ContainerStartResponse> {
        let image_id = require(&request.image_id, "imageId")?;
        let container_name = request
            .container_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("container-{}", chrono::Utc::now().timestamp_millis()));

        let containers = self.engine.list_containers().await?;
        let used = port_allocator::used_ports(&containers, &[self.config.port]);
        let port = port_allocator::allocate(&used, self.config.container_start_port)
            .ok_or_else(|| {
                ApiError::internal(format!(
                    "No free host port at or above {}",
                    self.config.container_start_port
                ))
            })?;

        let spec = ContainerSpec::new(image_id)
            .name(container_name.clone())
            .bind_port(port, self.config.container_port);
        let container_id = self.engine.create_container(&spec).await?;

        if let Err(e) = self.engine.start_container(&container_id).await {
            error!(
                container_id = %container_id,
                port = port,
                error = %e,
                "Container created but failed to start"
            );
            return Err(ApiError::engine_failed(format!(
                "Container {} was created but failed to start: {}",
                container_id, e
            ))
            .with_container_id(container_id));
        }

        info!(
            container_id = %container_id,
            name = %container_name,
            image = %image_id,
            port = port,
            "Container started"
        );

        Ok(ContainerStartResponse {
            success: true,
            message: format!("Container started on port {}", port),
            container_id,
            container_name,
            port,
        })
    }

    pub async fn stop_container(&self, id: &str) -> ApiResult<ActionResponse> {
        let id = require(id, "containerId")?;
        self.engine.stop_container(id).await?;
        info!(container_id = %id, "Container stopped");
        Ok(ActionResponse::ok("Container stopped"))
    }

    /// 启动已停止的容器
    pub async fn start_stopped_container(&self, id: &str) -> ApiResult<ActionResponse> {
        let id = require(id, "containerId")?;
        self.engine.start_container(id).await?;
        info!(container_id = %id, "Container started");
        Ok(ActionResponse::ok("Container started"))
    }

    /// 强制删除容器
    pub async fn remove_container(&self, id: &str) -> ApiResult<ActionResponse> {
        let id = require(id, "containerId")?;
        self.engine.remove_container(id, true).await?;
        info!(container_id = %id, "Container removed");
        Ok(ActionResponse::ok("Container removed"))
    }

    /// `<prefix>-<millis>.tar`，极少数同毫秒冲突时追加随机后缀
    async fn unique_export_name(&self, prefix: &str) -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let name = format!("{}-{}.tar", prefix, millis);
        if !path_exists(&self.config.export_dir.join(&name)).await {
            return name;
        }
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}-{}.tar", prefix, millis, &nonce[..8])
    }
}

/// 必填字段校验
///
/// ID 和镜像引用会作为 docker 的位置参数，以 `-` 开头的值会被当成选项
fn require<'a>(value: &'a str, field: &str) -> ApiResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::validation(format!("{} is required", field)));
    }
    if value.starts_with('-') {
        return Err(ApiError::validation(format!(
            "{} must not start with '-'",
            field
        )));
    }
    Ok(value)
}

/// 空值或空白时使用默认值
fn or_default<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

async fn path_exists(path: &std::path::Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn remove_partial_export(path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!(file = %path.display(), "Removed partial export"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(file = %path.display(), error = %e, "Failed to remove partial export"),
    }
}

//! 临时资源清理
//!
//! - 上传文件：`TransientFile` 在 drop 时删除，覆盖成功、校验失败、引擎报错所有退出路径
//! - 临时容器：`with_transient_container` 创建后执行 body，无论结果如何都强制删除
//!
//! 导出的归档是交付物，不经过这里，不会被自动删除

use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::infra::{ContainerEngine, ContainerSpec, EngineResult};

/// 上传到临时目录的文件，离开作用域即删除
#[derive(Debug)]
pub struct TransientFile {
    path: PathBuf,
    original_name: String,
}

impl TransientFile {
    pub fn new(path: PathBuf, original_name: impl Into<String>) -> Self {
        Self {
            path,
            original_name: original_name.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 客户端提供的原始文件名
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

impl Drop for TransientFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed transient upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            // 清理失败只记录，不影响主操作结果
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove transient upload"),
        }
    }
}

/// 生成上传文件路径：`<millis>-<8位随机>-<文件名>`
pub fn upload_path(dir: &Path, original_name: &str) -> PathBuf {
    let millis = chrono::Utc::now().timestamp_millis();
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    dir.join(format!(
        "{}-{}-{}",
        millis,
        &nonce[..8],
        sanitize_file_name(original_name)
    ))
}

/// 只保留文件名中的安全字符，其余替换为 `_`
pub fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

/// 在临时容器中执行 `body`，之后无论成败都强制删除容器
///
/// 创建失败时若 `spec.name` 有值，仍按名字尝试删除可能残留的半成品容器
pub async fn with_transient_container<T, F, Fut>(
    engine: &dyn ContainerEngine,
    spec: &ContainerSpec,
    body: F,
) -> EngineResult<T>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let id = match engine.create_container(spec).await {
        Ok(id) => id,
        Err(e) => {
            if let Some(name) = &spec.name {
                if let Err(cleanup) = engine.remove_container(name, true).await {
                    // 通常是根本没创建出来
                    debug!(container = %name, error = %cleanup, "Nothing to clean up after failed create");
                }
            }
            return Err(e);
        }
    };

    let outcome = body(id.clone()).await;

    if let Err(e) = engine.remove_container(&id, true).await {
        warn!(container_id = %id, error = %e, "Failed to remove transient container");
    } else {
        debug!(container_id = %id, "Removed transient container");
    }

    outcome
}

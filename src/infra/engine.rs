//! 容器引擎抽象
//!
//! 镜像存储、构建后端、容器运行时都属于外部协作者，这里只定义本服务需要的操作集合

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::domain::{ContainerSummary, ImageSummary};

/// 引擎错误
#[derive(Debug, Error)]
pub enum EngineError {
    /// 无法连接守护进程（或找不到客户端）
    #[error("container engine unavailable: {0}")]
    Unavailable(String),

    /// 引擎拒绝了某个操作
    #[error("{operation} failed: {message}")]
    OperationFailed {
        operation: &'static str,
        message: String,
    },

    /// 引擎返回了无法解析的数据
    #[error("unexpected engine output from {operation}: {message}")]
    InvalidOutput {
        operation: &'static str,
        message: String,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;

/// 构建结果
///
/// 构建失败不算引擎错误：日志始终返回给调用方
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub succeeded: bool,
    pub logs: String,
}

/// 创建容器参数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerSpec {
    pub image: String,
    pub name: Option<String>,
    /// 覆盖镜像默认命令
    pub command: Vec<String>,
    /// 端口映射 (宿主端口, 容器端口)，协议固定 tcp
    pub port_bindings: Vec<(u16, u16)>,
}

impl ContainerSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn bind_port(mut self, host_port: u16, container_port: u16) -> Self {
        self.port_bindings.push((host_port, container_port));
        self
    }
}

/// 容器引擎
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// 检查守护进程是否可达
    async fn ping(&self) -> EngineResult<()>;

    /// 列出镜像，最新创建的在前
    async fn list_images(&self) -> EngineResult<Vec<ImageSummary>>;

    /// 列出全部容器（包括已停止的）
    async fn list_containers(&self) -> EngineResult<Vec<ContainerSummary>>;

    /// 用 tar 格式的构建上下文构建镜像，并打上 `reference` 标签
    async fn build_image(&self, context: Vec<u8>, reference: &str) -> EngineResult<BuildOutput>;

    /// 把镜像保存为 tar 归档写到 `dest`
    async fn save_image(&self, image: &str, dest: &Path) -> EngineResult<()>;

    /// 从 tar 归档加载镜像，返回引擎的原始多行输出
    async fn load_image(&self, archive: &Path) -> EngineResult<String>;

    async fn tag_image(&self, source: &str, repo: &str, tag: &str) -> EngineResult<()>;

    async fn remove_image(&self, image: &str, force: bool) -> EngineResult<()>;

    /// 创建容器，返回容器 ID
    async fn create_container(&self, spec: &ContainerSpec) -> EngineResult<String>;

    async fn start_container(&self, id: &str) -> EngineResult<()>;

    async fn stop_container(&self, id: &str) -> EngineResult<()>;

    async fn remove_container(&self, id: &str, force: bool) -> EngineResult<()>;

    /// 阻塞直到容器退出，返回退出码
    async fn wait_container(&self, id: &str) -> EngineResult<i64>;

    /// 容器的 stdout + stderr
    async fn container_logs(&self, id: &str) -> EngineResult<String>;
}

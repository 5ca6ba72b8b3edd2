//! 应用状态

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 全局 shutdown token，收到退出信号后取消，HTTP 服务据此停止接收新连接
static GLOBAL_SHUTDOWN: std::sync::OnceLock<CancellationToken> = std::sync::OnceLock::new();

/// 获取全局 shutdown token
pub fn get_shutdown_token() -> CancellationToken {
    GLOBAL_SHUTDOWN.get_or_init(CancellationToken::new).clone()
}

/// 触发全局 shutdown
pub fn trigger_shutdown() {
    if let Some(token) = GLOBAL_SHUTDOWN.get() {
        token.cancel();
    }
}

use crate::config::EnvConfig;
use crate::infra::{ContainerEngine, DockerCli};
use crate::services::Lifecycle;

/// 应用状态
pub struct AppState {
    /// 环境配置
    pub config: EnvConfig,
    /// 生命周期协调器
    pub lifecycle: Lifecycle,
    /// 服务启动时间
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// 使用 docker CLI 作为引擎
    pub fn new(config: EnvConfig) -> Self {
        let engine: Arc<dyn ContainerEngine> = Arc::new(DockerCli::new(config.docker_bin.clone()));
        Self::with_engine(config, engine)
    }

    pub fn with_engine(config: EnvConfig, engine: Arc<dyn ContainerEngine>) -> Self {
        let lifecycle = Lifecycle::new(engine, config.clone());
        Self {
            config,
            lifecycle,
            started_at: Utc::now(),
        }
    }

    /// 运行时长（秒）
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

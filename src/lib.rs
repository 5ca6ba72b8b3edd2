//! Docker Builder Agent - 镜像构建/导出/导入与容器管理控制面
//!
//! 位于容器引擎前面的 HTTP 服务：上传 Dockerfile 构建镜像、导出/导入 tar、
//! 查看镜像文件、按空闲端口启动容器

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;
pub mod state;

pub use config::{EnvConfig, RuntimeConfig};

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::env::constants::VERSION;
use crate::state::{get_shutdown_token, trigger_shutdown, AppState};

/// 初始化日志并运行服务，直到收到退出信号
pub async fn init_and_run_agent_with_config(runtime: RuntimeConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("docker_builder_agent=info,tower_http=info")),
        )
        .init();

    let config = EnvConfig::from_env().with_runtime(&runtime);
    run(config).await
}

/// 运行 HTTP 服务
pub async fn run(config: EnvConfig) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to create upload dir {}", config.upload_dir.display()))?;
    tokio::fs::create_dir_all(&config.export_dir)
        .await
        .with_context(|| format!("Failed to create export dir {}", config.export_dir.display()))?;

    let addr = format!("{}:{}", config.host, config.port);

    info!(
        version = VERSION,
        addr = %addr,
        docker = %config.docker_bin,
        upload_dir = %config.upload_dir.display(),
        export_dir = %config.export_dir.display(),
        "Starting docker builder agent"
    );

    let state = Arc::new(AppState::new(config));
    if let Err(e) = state.lifecycle.health_check().await {
        warn!(error = %e, "Docker daemon is not reachable yet, requests will fail until it is");
    }

    let app = api::router(state.clone());
    let listener = tokio::net::TcpListener::bind((state.config.host.as_str(), state.config.port))
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tokio::spawn(async {
        shutdown_signal().await;
        trigger_shutdown();
    });

    let token = get_shutdown_token();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .context("HTTP server error")?;

    info!(uptime_secs = state.uptime_secs(), "Agent stopped");
    Ok(())
}

/// 等待 Ctrl-C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

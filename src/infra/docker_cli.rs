//! 基于 docker CLI 的容器引擎实现
//!
//! 所有操作都通过 `docker` 子命令完成，列表用 `--format '{{json .}}'` 逐行解析

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, error};

use crate::domain::{ContainerSummary, ImageSummary};

use super::command::CommandRunner;
use super::engine::{BuildOutput, ContainerEngine, ContainerSpec, EngineError, EngineResult};

/// 守护进程不可达时 docker CLI 的典型输出
const UNREACHABLE_MARKERS: &[&str] = &[
    "Cannot connect to the Docker daemon",
    "error during connect",
    "Is the docker daemon running",
];

/// docker CLI 引擎
#[derive(Debug, Clone)]
pub struct DockerCli {
    bin: String,
}

impl DockerCli {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// 执行 docker 子命令，成功时返回 stdout
    async fn exec(&self, operation: &'static str, args: &[&str]) -> EngineResult<String> {
        debug!(operation = operation, args = ?args, "Running docker command");

        let output = CommandRunner::run_simple(&self.bin, args)
            .await
            .map_err(|e| {
                error!(operation = operation, error = %e, "Failed to run docker");
                EngineError::Unavailable(format!("failed to run {}: {}", self.bin, e))
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_failure(operation, stderr.trim()))
    }
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn ping(&self) -> EngineResult<()> {
        self.exec("docker version", &["version", "--format", "{{.Server.Version}}"])
            .await
            .map(|_| ())
            .map_err(|e| match e {
                EngineError::Unavailable(msg) => EngineError::Unavailable(msg),
                other => EngineError::Unavailable(other.to_string()),
            })
    }

    async fn list_images(&self) -> EngineResult<Vec<ImageSummary>> {
        let stdout = self
            .exec(
                "docker images",
                &["images", "--no-trunc", "--format", "{{json .}}"],
            )
            .await?;
        parse_json_lines("docker images", &stdout)
    }

    async fn list_containers(&self) -> EngineResult<Vec<ContainerSummary>> {
        let stdout = self
            .exec(
                "docker ps",
                &["ps", "-a", "--no-trunc", "--format", "{{json .}}"],
            )
            .await?;
        parse_json_lines("docker ps", &stdout)
    }

    async fn build_image(&self, context: Vec<u8>, reference: &str) -> EngineResult<BuildOutput> {
        let result = CommandRunner::run_with_streaming(
            &self.bin,
            &["build", "--progress=plain", "-t", reference, "-"],
            Some(context),
        )
        .await
        .map_err(|e| EngineError::Unavailable(format!("failed to run {}: {}", self.bin, e)))?;

        if !result.status.success() && is_daemon_unreachable(&result.output) {
            return Err(EngineError::Unavailable(result.output.trim().to_string()));
        }

        Ok(BuildOutput {
            succeeded: result.status.success(),
            logs: result.output,
        })
    }

    async fn save_image(&self, image: &str, dest: &Path) -> EngineResult<()> {
        let dest = dest.to_string_lossy();
        self.exec("docker save", &["save", "-o", &dest, "--", image])
            .await
            .map(|_| ())
    }

    async fn load_image(&self, archive: &Path) -> EngineResult<String> {
        let archive = archive.to_string_lossy();
        self.exec("docker load", &["load", "-i", &archive]).await
    }

    async fn tag_image(&self, source: &str, repo: &str, tag: &str) -> EngineResult<()> {
        let target = format!("{}:{}", repo, tag);
        self.exec("docker tag", &["tag", "--", source, &target])
            .await
            .map(|_| ())
    }

    async fn remove_image(&self, image: &str, force: bool) -> EngineResult<()> {
        let mut args = vec!["rmi"];
        if force {
            args.push("-f");
        }
        args.extend(["--", image]);
        self.exec("docker rmi", &args).await.map(|_| ())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> EngineResult<String> {
        let args = create_args(spec);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let stdout = self.exec("docker create", &args).await?;

        // 本地没有镜像时 create 会先拉取，ID 在最后一行
        stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| EngineError::InvalidOutput {
                operation: "docker create",
                message: "no container id returned".to_string(),
            })
    }

    async fn start_container(&self, id: &str) -> EngineResult<()> {
        self.exec("docker start", &["start", "--", id]).await.map(|_| ())
    }

    async fn stop_container(&self, id: &str) -> EngineResult<()> {
        self.exec("docker stop", &["stop", "--", id]).await.map(|_| ())
    }

    async fn remove_container(&self, id: &str, force: bool) -> EngineResult<()> {
        let mut args = vec!["rm"];
        if force {
            args.push("-f");
        }
        args.extend(["--", id]);
        self.exec("docker rm", &args).await.map(|_| ())
    }

    async fn wait_container(&self, id: &str) -> EngineResult<i64> {
        let stdout = self.exec("docker wait", &["wait", "--", id]).await?;
        stdout
            .trim()
            .parse::<i64>()
            .map_err(|e| EngineError::InvalidOutput {
                operation: "docker wait",
                message: format!("{:?}: {}", stdout.trim(), e),
            })
    }

    async fn container_logs(&self, id: &str) -> EngineResult<String> {
        let output = CommandRunner::run_simple(&self.bin, &["logs", "--", id])
            .await
            .map_err(|e| EngineError::Unavailable(format!("failed to run {}: {}", self.bin, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(classify_failure("docker logs", stderr.trim()));
        }

        // docker logs 会把容器的 stderr 原样输出到 stderr
        let mut combined = stdout.into_owned();
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }
        Ok(combined)
    }
}

/// 组装 `docker create` 参数
fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec!["create".to_string()];

    if let Some(name) = &spec.name {
        args.push("--name".to_string());
        args.push(name.clone());
    }

    for (host_port, container_port) in &spec.port_bindings {
        args.push("-p".to_string());
        args.push(format!("{}:{}/tcp", host_port, container_port));
    }

    // `--` 之后的镜像和命令不会被当成 create 的选项
    args.push("--".to_string());
    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

fn is_daemon_unreachable(text: &str) -> bool {
    UNREACHABLE_MARKERS.iter().any(|marker| text.contains(marker))
}

/// 根据 stderr 区分「引擎不可达」和「操作被拒绝」
fn classify_failure(operation: &'static str, stderr: &str) -> EngineError {
    if is_daemon_unreachable(stderr) {
        return EngineError::Unavailable(stderr.to_string());
    }

    let message = if stderr.is_empty() {
        "exited with non-zero status".to_string()
    } else {
        stderr.to_string()
    };
    EngineError::OperationFailed { operation, message }
}

/// 解析 `--format '{{json .}}'` 的逐行 JSON
fn parse_json_lines<T: DeserializeOwned>(
    operation: &'static str,
    text: &str,
) -> EngineResult<Vec<T>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|e| EngineError::InvalidOutput {
                operation,
                message: e.to_string(),
            })
        })
        .collect()
}

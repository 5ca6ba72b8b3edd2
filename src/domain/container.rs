//! 容器相关领域模型

use serde::{Deserialize, Serialize};

/// 容器信息（`docker ps --format '{{json .}}'` 的一行）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub names: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub state: String,
    /// 例如 `0.0.0.0:8080->80/tcp, :::8080->80/tcp`
    #[serde(default)]
    pub ports: String,
}

impl ContainerSummary {
    /// 解析出宿主机上已绑定的公开端口
    ///
    /// 只暴露未发布的端口（如 `80/tcp`）不计入；端口范围会被展开
    pub fn public_ports(&self) -> Vec<u16> {
        let mut ports = Vec::new();

        for binding in self.ports.split(',').map(str::trim) {
            let Some((host_side, _)) = binding.split_once("->") else {
                continue;
            };
            // host_side 形如 0.0.0.0:8080 / :::8080 / [::]:8000-8002
            let Some((_, port_part)) = host_side.rsplit_once(':') else {
                continue;
            };

            match port_part.split_once('-') {
                Some((start, end)) => {
                    if let (Ok(start), Ok(end)) = (start.parse::<u16>(), end.parse::<u16>()) {
                        ports.extend(start..=end);
                    }
                }
                None => {
                    if let Ok(port) = port_part.parse::<u16>() {
                        ports.push(port);
                    }
                }
            }
        }

        ports
    }
}

/// 从镜像启动容器请求
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStartRequest {
    #[serde(default)]
    pub image_id: String,
    /// 不指定时按时间生成 `container-<millis>`
    #[serde(default)]
    pub container_name: Option<String>,
}

/// 从镜像启动容器响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStartResponse {
    pub success: bool,
    pub message: String,
    pub container_id: String,
    pub container_name: String,
    pub port: u16,
}

/// 通用操作响应 (stop / start / remove / delete image)
#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// 健康检查响应
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "OK",
            message: message.into(),
            error: None,
        }
    }

    /// 引擎不可达
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            status: "ERROR",
            message: "Docker daemon is not accessible".to_string(),
            error: Some(error.into()),
        }
    }
}

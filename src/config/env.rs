//! 环境变量配置加载

use std::env;
use std::path::PathBuf;

/// 命令行覆盖项
#[derive(Clone, Debug, Default)]
pub struct RuntimeConfig {
    /// `--port` 覆盖监听端口
    pub port_override: Option<u16>,
}

/// 环境配置
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// 监听地址
    pub host: String,
    /// 服务监听端口（同时是端口分配时保留的端口）
    pub port: u16,
    /// docker 可执行文件
    pub docker_bin: String,
    /// 上传文件的临时目录
    pub upload_dir: PathBuf,
    /// 导出镜像的目录
    pub export_dir: PathBuf,
    /// 启动容器时分配宿主端口的起点
    pub container_start_port: u16,
    /// 容器内被映射的端口
    pub container_port: u16,
    /// 上传请求体大小上限（字节）
    pub max_upload_bytes: usize,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_var("PORT").unwrap_or(constants::DEFAULT_PORT);
        let docker_bin = env::var("DOCKER_BIN")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "docker".to_string());

        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));
        let export_dir = env::var("EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./exports"));

        let container_start_port =
            parse_var("CONTAINER_START_PORT").unwrap_or(constants::DEFAULT_CONTAINER_START_PORT);
        let container_port =
            parse_var("CONTAINER_PORT").unwrap_or(constants::DEFAULT_CONTAINER_PORT);

        let max_upload_mb: usize = parse_var("MAX_UPLOAD_MB").unwrap_or(1024);

        Self {
            host,
            port,
            docker_bin,
            upload_dir,
            export_dir,
            container_start_port,
            container_port,
            max_upload_bytes: mb_to_bytes(max_upload_mb),
        }
    }

    /// 应用命令行覆盖项
    pub fn with_runtime(mut self, runtime: &RuntimeConfig) -> Self {
        if let Some(port) = runtime.port_override {
            self.port = port;
        }
        self
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: constants::DEFAULT_PORT,
            docker_bin: "docker".to_string(),
            upload_dir: PathBuf::from("./uploads"),
            export_dir: PathBuf::from("./exports"),
            container_start_port: constants::DEFAULT_CONTAINER_START_PORT,
            container_port: constants::DEFAULT_CONTAINER_PORT,
            max_upload_bytes: mb_to_bytes(1024),
        }
    }
}

/// MB 转字节，溢出时取上限
fn mb_to_bytes(mb: usize) -> usize {
    mb.saturating_mul(1024 * 1024)
}

/// 读取并解析环境变量，解析失败视为未设置
fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// 常量
pub mod constants {
    /// 默认监听端口
    pub const DEFAULT_PORT: u16 = 3000;

    /// 默认容器宿主端口起点
    pub const DEFAULT_CONTAINER_START_PORT: u16 = 8080;

    /// 默认容器内端口
    pub const DEFAULT_CONTAINER_PORT: u16 = 80;

    /// 一次构建最多附带的文件数
    pub const MAX_ADDITIONAL_FILES: usize = 20;

    /// 导出文件名默认前缀
    pub const DEFAULT_EXPORT_NAME: &str = "docker-image";

    /// 导入镜像默认名称
    pub const DEFAULT_IMPORT_NAME: &str = "imported-image";

    /// 默认标签
    pub const DEFAULT_TAG: &str = "latest";

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var() {
        env::set_var("TEST_BUILDER_PORT", " 4100 ");
        assert_eq!(parse_var::<u16>("TEST_BUILDER_PORT"), Some(4100));

        env::set_var("TEST_BUILDER_PORT", "not-a-port");
        assert_eq!(parse_var::<u16>("TEST_BUILDER_PORT"), None);

        env::remove_var("TEST_BUILDER_PORT");
        assert_eq!(parse_var::<u16>("TEST_BUILDER_PORT"), None);
    }

    #[test]
    fn test_upload_limit_saturates() {
        assert_eq!(mb_to_bytes(1), 1024 * 1024);
        assert_eq!(mb_to_bytes(usize::MAX), usize::MAX);
    }

    #[test]
    fn test_runtime_override() {
        let config = EnvConfig::default().with_runtime(&RuntimeConfig {
            port_override: Some(19999),
        });
        assert_eq!(config.port, 19999);

        let config = EnvConfig::default().with_runtime(&RuntimeConfig::default());
        assert_eq!(config.port, constants::DEFAULT_PORT);
    }
}

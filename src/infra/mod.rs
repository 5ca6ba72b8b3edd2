//! 基础设施模块
//!
//! 封装外部依赖（命令执行、容器引擎）

pub mod command;
pub mod docker_cli;
pub mod engine;

#[cfg(test)]
pub mod fake;

pub use command::CommandRunner;
pub use docker_cli::DockerCli;
pub use engine::{BuildOutput, ContainerEngine, ContainerSpec, EngineError, EngineResult};

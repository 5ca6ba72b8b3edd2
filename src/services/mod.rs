//! 服务层模块
//!
//! 包含核心业务逻辑：构建上下文、导入识别、端口分配、临时资源清理和生命周期协调

pub mod build_context;
pub mod file_inspector;
pub mod import_resolver;
pub mod janitor;
pub mod lifecycle;
pub mod port_allocator;

pub use janitor::TransientFile;
pub use lifecycle::{BuildRequest, ImportRequest, Lifecycle};

//! 领域模型模块
//!
//! 纯数据结构，不依赖 axum/tokio

pub mod container;
pub mod image;

// Re-exports for convenience
pub use container::{
    ActionResponse, ContainerStartRequest, ContainerStartResponse, ContainerSummary,
    HealthResponse,
};
pub use image::{
    BuildResponse, ExportArtifact, ExportRequest, ExportResponse, ImageFilesResponse,
    ImageSummary, ImportResponse, ResolutionMethod,
};

//! 测试用内存引擎
//!
//! 记录每一次调用，按配置返回列表/输出，或让指定操作失败

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::domain::{ContainerSummary, ImageSummary};

use super::engine::{BuildOutput, ContainerEngine, ContainerSpec, EngineError, EngineResult};

#[derive(Default)]
pub struct FakeEngine {
    pub images: Mutex<Vec<ImageSummary>>,
    pub containers: Mutex<Vec<ContainerSummary>>,
    pub load_output: Mutex<String>,
    pub logs_output: Mutex<String>,
    pub build_logs: Mutex<String>,
    pub build_fails: AtomicBool,
    pub export_bytes: Mutex<Vec<u8>>,
    pub unavailable: AtomicBool,
    pub last_build_context: Mutex<Option<Vec<u8>>>,
    pub created: Mutex<Vec<ContainerSpec>>,
    failing: Mutex<HashSet<&'static str>>,
    calls: Mutex<Vec<String>>,
    next_id: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让某个操作（"start", "save", ...）返回 OperationFailed
    pub fn fail_on(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn set_unavailable(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    /// 已记录的调用，形如 `start abc123`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// 只保留操作名
    pub fn operations(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| c.split_whitespace().next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn with_container_ports(self, ports: &[&str]) -> Self {
        {
            let mut containers = self.containers.lock().unwrap();
            for (i, p) in ports.iter().enumerate() {
                containers.push(ContainerSummary {
                    id: format!("existing-{}", i),
                    ports: p.to_string(),
                    ..Default::default()
                });
            }
        }
        self
    }

    fn record(&self, operation: &'static str, arg: &str) -> EngineResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", operation, arg).trim().to_string());

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EngineError::Unavailable(
                "Cannot connect to the Docker daemon".to_string(),
            ));
        }
        if self.failing.lock().unwrap().contains(operation) {
            return Err(EngineError::OperationFailed {
                operation,
                message: format!("simulated {} failure", operation),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn ping(&self) -> EngineResult<()> {
        self.record("ping", "")
    }

    async fn list_images(&self) -> EngineResult<Vec<ImageSummary>> {
        self.record("list_images", "")?;
        Ok(self.images.lock().unwrap().clone())
    }

    async fn list_containers(&self) -> EngineResult<Vec<ContainerSummary>> {
        self.record("list_containers", "")?;
        Ok(self.containers.lock().unwrap().clone())
    }

    async fn build_image(&self, context: Vec<u8>, reference: &str) -> EngineResult<BuildOutput> {
        self.record("build", reference)?;
        *self.last_build_context.lock().unwrap() = Some(context);
        Ok(BuildOutput {
            succeeded: !self.build_fails.load(Ordering::SeqCst),
            logs: self.build_logs.lock().unwrap().clone(),
        })
    }

    async fn save_image(&self, image: &str, dest: &Path) -> EngineResult<()> {
        if let Err(e) = self.record("save", image) {
            // 模拟写了一半就失败
            let _ = std::fs::write(dest, b"partial");
            return Err(e);
        }
        std::fs::write(dest, &*self.export_bytes.lock().unwrap()).map_err(|e| {
            EngineError::OperationFailed {
                operation: "save",
                message: e.to_string(),
            }
        })
    }

    async fn load_image(&self, archive: &Path) -> EngineResult<String> {
        self.record("load", &archive.to_string_lossy())?;
        Ok(self.load_output.lock().unwrap().clone())
    }

    async fn tag_image(&self, source: &str, repo: &str, tag: &str) -> EngineResult<()> {
        self.record("tag", &format!("{} {}:{}", source, repo, tag))
    }

    async fn remove_image(&self, image: &str, _force: bool) -> EngineResult<()> {
        self.record("rmi", image)
    }

    async fn create_container(&self, spec: &ContainerSpec) -> EngineResult<String> {
        self.record("create", spec.name.as_deref().unwrap_or(&spec.image))?;
        self.created.lock().unwrap().push(spec.clone());
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("ctr{}", n))
    }

    async fn start_container(&self, id: &str) -> EngineResult<()> {
        self.record("start", id)
    }

    async fn stop_container(&self, id: &str) -> EngineResult<()> {
        self.record("stop", id)
    }

    async fn remove_container(&self, id: &str, _force: bool) -> EngineResult<()> {
        self.record("rm", id)
    }

    async fn wait_container(&self, id: &str) -> EngineResult<i64> {
        self.record("wait", id)?;
        Ok(0)
    }

    async fn container_logs(&self, id: &str) -> EngineResult<String> {
        self.record("logs", id)?;
        Ok(self.logs_output.lock().unwrap().clone())
    }
}

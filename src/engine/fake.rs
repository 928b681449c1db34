//! In-memory container engine for tests

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{tcp_key, ContainerEngine, ContainerRecord, PortMap, PortMapping, RunSpec, SandboxStatus};
use crate::errors::{Result, SandboxError};

#[derive(Default)]
struct State {
    images: HashSet<String>,
    containers: Vec<ContainerRecord>,
    builds: Vec<String>,
    removed_images: Vec<String>,
    next_id: u64,
    fail_build: bool,
    fail_run: bool,
    run_gate: Option<Arc<Notify>>,
}

#[derive(Default)]
pub(crate) struct FakeEngine {
    state: Mutex<State>,
}

impl FakeEngine {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn fail_builds(&self) {
        self.lock().fail_build = true;
    }

    pub fn fail_runs(&self) {
        self.lock().fail_run = true;
    }

    /// Park the next `run_container` call until the returned gate is notified
    pub fn hold_next_run(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().run_gate = Some(gate.clone());
        gate
    }

    pub fn add_image(&self, tag: &str) {
        self.lock().images.insert(tag.to_string());
    }

    /// Insert a container as if created out of band
    pub fn add_container(&self, name: &str, status: SandboxStatus) {
        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("{:012x}", state.next_id);
        state.containers.push(ContainerRecord {
            id,
            name: name.to_string(),
            status,
            ports: PortMap::new(),
        });
    }

    pub fn builds(&self) -> Vec<String> {
        self.lock().builds.clone()
    }

    pub fn removed_images(&self) -> Vec<String> {
        self.lock().removed_images.clone()
    }

    pub fn has_image(&self, tag: &str) -> bool {
        self.lock().images.contains(tag)
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn image_exists(&self, tag: &str) -> Result<bool> {
        Ok(self.lock().images.contains(tag))
    }

    async fn build_image(&self, _context: &Path, _dockerfile: &str, tag: &str) -> Result<()> {
        let mut state = self.lock();
        if state.fail_build {
            return Err(SandboxError::Build {
                tag: tag.to_string(),
                message: "unknown instruction: RUNN".to_string(),
            });
        }
        state.builds.push(tag.to_string());
        state.images.insert(tag.to_string());
        Ok(())
    }

    async fn remove_image(&self, tag: &str) -> Result<()> {
        let mut state = self.lock();
        state.images.remove(tag);
        state.removed_images.push(tag.to_string());
        Ok(())
    }

    async fn run_container(&self, spec: &RunSpec) -> Result<String> {
        let gate = self.lock().run_gate.take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.lock();
        if state.containers.iter().any(|c| c.name == spec.name) {
            return Err(SandboxError::NameInUse(spec.name.clone()));
        }
        if state.fail_run {
            return Err(SandboxError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "port is already allocated",
            )));
        }

        state.next_id += 1;
        let id = format!("{:012x}", state.next_id);
        let mut ports = PortMap::new();
        ports.insert(
            tcp_key(spec.container_port),
            vec![PortMapping {
                host_ip: "0.0.0.0".to_string(),
                host_port: spec.host_port.to_string(),
            }],
        );
        state.containers.push(ContainerRecord {
            id: id.clone(),
            name: spec.name.clone(),
            status: SandboxStatus::Running,
            ports,
        });
        Ok(id)
    }

    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerRecord>> {
        Ok(self
            .lock()
            .containers
            .iter()
            .find(|c| c.name == name || c.id == name)
            .cloned())
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        let before = state.containers.len();
        state.containers.retain(|c| c.name != name && c.id != name);
        if state.containers.len() == before {
            return Err(SandboxError::ContainerNotFound(name.to_string()));
        }
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerRecord>> {
        Ok(self.lock().containers.clone())
    }
}

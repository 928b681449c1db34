//! Container engine seam
//!
//! The control plane never talks to Docker directly; it goes through
//! [`ContainerEngine`], which speaks in the crate's own types. The
//! production implementation is [`DockerEngine`]. Engine calls are slow
//! and carry no timeout; a dropped request does not cancel them.

pub mod docker;
#[cfg(test)]
pub(crate) mod fake;

pub use docker::DockerEngine;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::Result;
use crate::storage::VolumeBinding;

/// Container state as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl From<&str> for SandboxStatus {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "created" => SandboxStatus::Created,
            "running" => SandboxStatus::Running,
            "paused" => SandboxStatus::Paused,
            "restarting" => SandboxStatus::Restarting,
            "removing" => SandboxStatus::Removing,
            "exited" => SandboxStatus::Exited,
            "dead" => SandboxStatus::Dead,
            _ => SandboxStatus::Unknown,
        }
    }
}

impl fmt::Display for SandboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SandboxStatus::Created => "created",
            SandboxStatus::Running => "running",
            SandboxStatus::Paused => "paused",
            SandboxStatus::Restarting => "restarting",
            SandboxStatus::Removing => "removing",
            SandboxStatus::Exited => "exited",
            SandboxStatus::Dead => "dead",
            SandboxStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// One published host binding of a container port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortMapping {
    #[serde(rename = "HostIp")]
    pub host_ip: String,
    #[serde(rename = "HostPort")]
    pub host_port: String,
}

/// Container port (`"5000/tcp"`) to its host bindings
pub type PortMap = BTreeMap<String, Vec<PortMapping>>;

/// Engine view of one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub status: SandboxStatus,
    pub ports: PortMap,
}

impl ContainerRecord {
    /// First host port bound to `container_port/tcp`
    pub fn host_port(&self, container_port: u16) -> Option<u16> {
        self.ports
            .get(&tcp_key(container_port))?
            .iter()
            .find_map(|m| m.host_port.parse().ok())
    }
}

/// Everything needed to start a sandbox container
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub name: String,
    pub image: String,
    pub host_port: u16,
    pub container_port: u16,
    pub volume: VolumeBinding,
}

/// `"<port>/tcp"`
pub fn tcp_key(port: u16) -> String {
    format!("{}/tcp", port)
}

/// Operations the control plane needs from a container engine
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Whether an image with exactly this tag is in the local store
    async fn image_exists(&self, tag: &str) -> Result<bool>;

    /// Build `context` into an image tagged `tag`, using the build file at
    /// `dockerfile` relative to the context
    async fn build_image(&self, context: &Path, dockerfile: &str, tag: &str) -> Result<()>;

    async fn remove_image(&self, tag: &str) -> Result<()>;

    /// Create and start a detached container, returning its id.
    /// A taken name fails with `NameInUse`.
    async fn run_container(&self, spec: &RunSpec) -> Result<String>;

    /// Look up a container by name or id; `None` if absent
    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerRecord>>;

    /// Stop if running, then remove. Absent fails with `ContainerNotFound`.
    async fn remove_container(&self, name: &str) -> Result<()>;

    /// All containers, stopped ones included, in engine order
    async fn list_containers(&self) -> Result<Vec<ContainerRecord>>;
}

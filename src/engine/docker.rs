//! Docker implementation of the container engine, over the local socket

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions,
};
use bollard::image::{BuildImageOptions, RemoveImageOptions};
use bollard::models::{ContainerInspectResponse, ContainerSummary, HostConfig, PortBinding};
use bollard::Docker;
use futures::StreamExt;
use log::{debug, info, warn};
use walkdir::WalkDir;

use super::{tcp_key, ContainerEngine, ContainerRecord, PortMap, PortMapping, RunSpec, SandboxStatus};
use crate::errors::{Result, SandboxError};

const ANY_HOST: &str = "0.0.0.0";

/// Container engine backed by the Docker daemon
#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect using `DOCKER_HOST` or the platform default socket
    pub fn connect() -> Result<Self> {
        Ok(Self {
            docker: Docker::connect_with_local_defaults()?,
        })
    }

    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Check the daemon answers
    pub async fn ping(&self) -> Result<()> {
        self.docker.ping().await?;
        Ok(())
    }
}

/// Paths listed in the context's `.dockerignore`.
///
/// Entries are literal paths relative to the context; wildcard and `!`
/// lines are left to the daemon.
fn ignore_list(context: &Path) -> io::Result<Vec<PathBuf>> {
    let text = match std::fs::read_to_string(context.join(".dockerignore")) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter(|line| !line.contains(['*', '?', '[']))
        .map(|line| {
            line.trim_start_matches("./")
                .trim_start_matches('/')
                .trim_end_matches('/')
        })
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Tar up a build context directory, leaving out ignored paths
fn pack_context(context: &Path) -> io::Result<Vec<u8>> {
    if !context.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("build context {} is not a directory", context.display()),
        ));
    }

    let ignored = ignore_list(context)?;
    let is_ignored = |path: &Path| {
        path.strip_prefix(context)
            .map(|rel| ignored.iter().any(|skip| rel.starts_with(skip)))
            .unwrap_or(false)
    };

    let mut archive = tar::Builder::new(Vec::new());
    let walker = WalkDir::new(context)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_ignored(entry.path()));

    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry.path().strip_prefix(context).map_err(io::Error::other)?;
        if entry.file_type().is_dir() {
            archive.append_dir(rel, entry.path())?;
        } else if entry.file_type().is_file() {
            archive.append_path_with_name(entry.path(), rel)?;
        }
    }
    archive.into_inner()
}

fn strip_slash(name: &str) -> String {
    name.trim_start_matches('/').to_string()
}

fn record_from_summary(summary: ContainerSummary) -> ContainerRecord {
    let mut ports = PortMap::new();
    for port in summary.ports.unwrap_or_default() {
        let proto = port
            .typ
            .map(|t| t.to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "tcp".to_string());
        let bindings = ports
            .entry(format!("{}/{}", port.private_port, proto))
            .or_default();
        if let Some(public) = port.public_port {
            bindings.push(PortMapping {
                host_ip: port.ip.unwrap_or_else(|| ANY_HOST.to_string()),
                host_port: public.to_string(),
            });
        }
    }

    ContainerRecord {
        id: summary.id.unwrap_or_default(),
        name: summary
            .names
            .and_then(|names| names.into_iter().next())
            .map(|n| strip_slash(&n))
            .unwrap_or_default(),
        status: summary
            .state
            .as_deref()
            .map(SandboxStatus::from)
            .unwrap_or(SandboxStatus::Unknown),
        ports,
    }
}

fn record_from_inspect(info: ContainerInspectResponse) -> ContainerRecord {
    let mut ports = PortMap::new();
    let bindings = info.host_config.and_then(|hc| hc.port_bindings).unwrap_or_default();
    for (key, binds) in bindings {
        let mapped = binds
            .unwrap_or_default()
            .into_iter()
            .filter_map(|b| {
                Some(PortMapping {
                    host_ip: b
                        .host_ip
                        .filter(|ip| !ip.is_empty())
                        .unwrap_or_else(|| ANY_HOST.to_string()),
                    host_port: b.host_port?,
                })
            })
            .collect();
        ports.insert(key, mapped);
    }

    ContainerRecord {
        id: info.id.unwrap_or_default(),
        name: info.name.map(|n| strip_slash(&n)).unwrap_or_default(),
        status: info
            .state
            .and_then(|s| s.status)
            .map(|s| SandboxStatus::from(s.to_string().as_str()))
            .unwrap_or(SandboxStatus::Unknown),
        ports,
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn image_exists(&self, tag: &str) -> Result<bool> {
        match self.docker.inspect_image(tag).await {
            Ok(_) => Ok(true),
            Err(e) if SandboxError::engine_status(&e) == Some(404) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn build_image(&self, context: &Path, dockerfile: &str, tag: &str) -> Result<()> {
        let build_err = |message: String| SandboxError::Build {
            tag: tag.to_string(),
            message,
        };

        if !context.join(dockerfile).is_file() {
            return Err(build_err(format!(
                "no {} in build context {}",
                dockerfile,
                context.display()
            )));
        }

        let dir = context.to_path_buf();
        let archive = tokio::task::spawn_blocking(move || pack_context(&dir))
            .await
            .map_err(|e| build_err(e.to_string()))?
            .map_err(|e| build_err(e.to_string()))?;

        info!(
            "Building image {} from {} ({} bytes of context)",
            tag,
            context.display(),
            archive.len()
        );

        let options = BuildImageOptions {
            dockerfile: dockerfile.to_string(),
            t: tag.to_string(),
            rm: true,
            ..Default::default()
        };

        let mut stream = self.docker.build_image(options, None, Some(archive.into()));
        while let Some(item) = stream.next().await {
            let info = item.map_err(|e| build_err(e.to_string()))?;
            if let Some(error) = info.error {
                return Err(build_err(error));
            }
            if let Some(line) = info.stream {
                let line = line.trim();
                if !line.is_empty() {
                    debug!("[{}] {}", tag, line);
                }
            }
        }

        Ok(())
    }

    async fn remove_image(&self, tag: &str) -> Result<()> {
        let options = RemoveImageOptions {
            force: true,
            ..Default::default()
        };
        self.docker.remove_image(tag, Some(options), None).await?;
        Ok(())
    }

    async fn run_container(&self, spec: &RunSpec) -> Result<String> {
        let port_key = tcp_key(spec.container_port);

        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            port_key.clone(),
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(spec.host_port.to_string()),
            }]),
        );

        let mut exposed_ports = HashMap::new();
        exposed_ports.insert(port_key, HashMap::new());

        let config = Config {
            image: Some(spec.image.clone()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                binds: Some(vec![spec.volume.bind_spec()]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| match SandboxError::engine_status(&e) {
                Some(409) => SandboxError::NameInUse(spec.name.clone()),
                _ => e.into(),
            })?;

        for warning in &created.warnings {
            warn!("Engine warning for {}: {}", spec.name, warning);
        }

        if let Err(e) = self
            .docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
        {
            // Do not leave a created-but-stopped container behind
            let remove = RemoveContainerOptions {
                force: true,
                ..Default::default()
            };
            if let Err(cleanup) = self.docker.remove_container(&created.id, Some(remove)).await {
                warn!("Could not remove unstarted container {}: {}", spec.name, cleanup);
            }
            return Err(e.into());
        }

        Ok(created.id)
    }

    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerRecord>> {
        match self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(info) => Ok(Some(record_from_inspect(info))),
            Err(e) if SandboxError::engine_status(&e) == Some(404) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        match self.docker.remove_container(name, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if SandboxError::engine_status(&e) == Some(404) => {
                Err(SandboxError::ContainerNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_containers(&self) -> Result<Vec<ContainerRecord>> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };

        let summaries = self.docker.list_containers(Some(options)).await?;
        Ok(summaries.into_iter().map(record_from_summary).collect())
    }
}

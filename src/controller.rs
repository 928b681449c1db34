//! Sandbox lifecycle controller
//!
//! Creation runs name/port allocation, build-if-absent, volume provisioning
//! and container start, in that order. The name is claimed for the whole
//! attempt, so concurrent attempts drawing the same name fail fast instead of
//! sharing its volume and image. Each completed sub-step is recorded; if a
//! later one fails the recorded steps are undone in reverse (volume removed
//! if this attempt created it, image removed if this attempt built it, port
//! released) and the original error is returned. When the engine reports the
//! name as taken only the port is released: the volume and image belong to
//! whoever holds the name.
//!
//! Removal is container first, then volume. A volume that cannot be
//! reclaimed does not bring the container back.
//!
//! Every instance gets its own image tag, so build-if-absent only skips a
//! build when an image from an earlier instance of the same name is still
//! around.

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::allocation::names::image_tag;
use crate::allocation::{NameClaims, NameGenerator, PortAllocator};
use crate::config::{absolutize, ProvisionerConfig};
use crate::engine::{ContainerEngine, ContainerRecord, RunSpec, SandboxStatus};
use crate::errors::{Result, SandboxError};
use crate::registry::GroupRegistry;
use crate::storage::{VolumeBinding, VolumeProvisioner};

/// A freshly provisioned sandbox
#[derive(Debug, Clone, Serialize)]
pub struct SandboxInstance {
    pub id: String,
    pub name: String,
    pub host_port: u16,
    pub container_port: u16,
    pub image: String,
    pub volume: VolumeBinding,
    pub status: SandboxStatus,
}

impl SandboxInstance {
    pub fn summary(&self) -> String {
        format!(
            "Container '{}' created and running on port {} with volume '{}'.",
            self.name,
            self.host_port,
            self.volume.source.display()
        )
    }
}

/// Outcome of a successful removal
#[derive(Debug, Clone, Serialize)]
pub struct Removal {
    pub name: String,
    pub volume: PathBuf,
    /// False when there was no volume directory to remove
    pub volume_removed: bool,
    pub released_port: Option<u16>,
}

/// Sub-steps of a creation attempt that need undoing on failure
#[derive(Debug)]
enum Completed {
    Port(u16),
    Image(String),
    Volume(PathBuf),
}

/// Creates, lists and removes sandboxes
pub struct SandboxController {
    engine: Arc<dyn ContainerEngine>,
    ports: PortAllocator,
    names: NameGenerator,
    claims: NameClaims,
    volumes: VolumeProvisioner,
    registry: GroupRegistry,
    build_context: PathBuf,
    dockerfile: String,
    container_port: u16,
}

impl SandboxController {
    /// Validate `config`, create the storage root and wire up the components
    pub fn new(config: &ProvisionerConfig, engine: Arc<dyn ContainerEngine>) -> Result<Self> {
        config.validate()?;

        let volumes = VolumeProvisioner::new(&config.storage_root, config.volume_mount.clone())?;
        volumes.ensure_root()?;

        Ok(Self {
            registry: GroupRegistry::new(engine.clone(), config.group_name.clone()),
            engine,
            ports: PortAllocator::new(config.port_base, config.port_span)?,
            names: NameGenerator::new(config.group_name.clone(), config.name_span),
            claims: NameClaims::default(),
            volumes,
            build_context: absolutize(&config.build_context)?,
            dockerfile: config.dockerfile.clone(),
            container_port: config.container_port,
        })
    }

    pub fn ports(&self) -> &PortAllocator {
        &self.ports
    }

    pub fn volumes(&self) -> &VolumeProvisioner {
        &self.volumes
    }

    pub fn registry(&self) -> &GroupRegistry {
        &self.registry
    }

    /// Provision a new sandbox
    pub async fn create(&self) -> Result<SandboxInstance> {
        let name = self.names.generate();
        let claim = self.claims.claim(&name)?;
        let mut done = Vec::new();

        match self.try_create(claim.name(), &mut done).await {
            Ok(instance) => Ok(instance),
            Err(e) => {
                if matches!(e, SandboxError::NameInUse(_)) {
                    done.retain(|step| matches!(step, Completed::Port(_)));
                }
                warn!(
                    "Sandbox creation failed: {}; undoing {} step(s)",
                    e,
                    done.len()
                );
                self.compensate(done).await;
                Err(e)
            }
        }
    }

    async fn try_create(&self, name: &str, done: &mut Vec<Completed>) -> Result<SandboxInstance> {
        let host_port = self.ports.allocate()?;
        done.push(Completed::Port(host_port));
        info!("Creating sandbox {} on host port {}", name, host_port);

        let image = image_tag(name);
        if self.engine.image_exists(&image).await? {
            debug!("Image {} already present, skipping build", image);
        } else {
            self.engine
                .build_image(&self.build_context, &self.dockerfile, &image)
                .await?;
            done.push(Completed::Image(image.clone()));
        }

        let volume = self.volumes.provision(name).await?;
        if volume.created {
            done.push(Completed::Volume(volume.binding.source.clone()));
        }

        let spec = RunSpec {
            name: name.to_string(),
            image: image.clone(),
            host_port,
            container_port: self.container_port,
            volume: volume.binding.clone(),
        };
        let id = self.engine.run_container(&spec).await?;
        info!("Sandbox {} running as {}", name, id);

        Ok(SandboxInstance {
            id,
            name: name.to_string(),
            host_port,
            container_port: self.container_port,
            image,
            volume: volume.binding,
            status: SandboxStatus::Running,
        })
    }

    async fn compensate(&self, done: Vec<Completed>) {
        for step in done.into_iter().rev() {
            match step {
                Completed::Volume(path) => {
                    if let Err(e) = self.volumes.reclaim(&path).await {
                        warn!("Rollback left volume {}: {}", path.display(), e);
                    }
                }
                Completed::Image(tag) => {
                    if let Err(e) = self.engine.remove_image(&tag).await {
                        warn!("Rollback left image {}: {}", tag, e);
                    }
                }
                Completed::Port(port) => {
                    self.ports.release(port);
                }
            }
        }
    }

    /// Remove a sandbox and its (empty) volume
    pub async fn delete(&self, name: &str) -> Result<Removal> {
        let record = self
            .engine
            .inspect_container(name)
            .await?
            .ok_or_else(|| SandboxError::ContainerNotFound(name.to_string()))?;

        self.engine.remove_container(name).await.map_err(|e| {
            if !e.is_not_found() {
                error!("Container step failed for {}: {}", name, e);
            }
            e
        })?;
        info!("Removed container {} ({})", record.name, record.id);

        let released_port = record
            .host_port(self.container_port)
            .filter(|port| self.ports.release(*port));

        let reclaim = |e: SandboxError| {
            error!(
                "Volume step failed for {} after container removal: {}",
                record.name, e
            );
            SandboxError::VolumeReclaim {
                name: record.name.clone(),
                source: Box::new(e),
            }
        };
        let volume = self.volumes.path_for(&record.name).map_err(reclaim)?;
        let volume_removed = self.volumes.reclaim(&volume).await.map_err(reclaim)?;

        Ok(Removal {
            name: record.name.clone(),
            volume,
            volume_removed,
            released_port,
        })
    }

    /// Containers of this controller's group
    pub async fn list(&self) -> Result<Vec<ContainerRecord>> {
        self.registry.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::FakeEngine;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        engine: Arc<FakeEngine>,
        controller: SandboxController,
    }

    fn fixture_with(name_span: u32) -> Fixture {
        let dir = TempDir::new().unwrap();
        let config = ProvisionerConfig {
            storage_root: dir.path().join("storage"),
            build_context: dir.path().join("vm"),
            name_span,
            ..Default::default()
        };
        let engine = Arc::new(FakeEngine::default());
        let controller = SandboxController::new(&config, engine.clone()).unwrap();
        Fixture {
            _dir: dir,
            engine,
            controller,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(1_000_000)
    }

    #[tokio::test]
    async fn test_create_provisions_everything() {
        let fx = fixture();
        let instance = fx.controller.create().await.unwrap();

        let suffix = instance.name.strip_prefix("grupo_vms_vm").unwrap();
        assert!(suffix.parse::<u32>().is_ok());
        assert!((5001..=6000).contains(&instance.host_port));
        assert_eq!(instance.container_port, 5000);
        assert_eq!(instance.image, format!("{}_image", instance.name));
        assert_eq!(
            instance.volume.source,
            fx.controller.volumes().root().join(&instance.name)
        );
        assert!(instance.volume.source.is_dir());
        assert_eq!(instance.volume.destination, "/storage");
        assert_eq!(fx.engine.builds(), vec![instance.image.clone()]);
        assert!(instance.summary().contains(&instance.host_port.to_string()));

        let listed = fx.controller.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, instance.name);
        assert_eq!(listed[0].status, SandboxStatus::Running);
        assert_eq!(listed[0].host_port(5000), Some(instance.host_port));
    }

    #[tokio::test]
    async fn test_ports_unique_across_live_instances() {
        let fx = fixture();
        let mut ports = HashSet::new();
        for _ in 0..40 {
            let instance = fx.controller.create().await.unwrap();
            assert!(ports.insert(instance.host_port));
        }
        assert_eq!(fx.controller.ports().reserved_count(), 40);
    }

    #[tokio::test]
    async fn test_existing_image_is_not_rebuilt() {
        let fx = fixture_with(1);
        fx.engine.add_image("grupo_vms_vm1_image");

        let instance = fx.controller.create().await.unwrap();
        assert_eq!(instance.name, "grupo_vms_vm1");
        assert!(fx.engine.builds().is_empty());
    }

    #[tokio::test]
    async fn test_name_collision_surfaces_and_rolls_back() {
        let fx = fixture_with(1);
        let first = fx.controller.create().await.unwrap();

        let err = fx.controller.create().await.unwrap_err();
        assert!(matches!(err, SandboxError::NameInUse(ref n) if n == "grupo_vms_vm1"));

        // The first instance keeps its port, volume and image
        assert_eq!(fx.controller.ports().reserved_count(), 1);
        assert!(fx.controller.ports().is_reserved(first.host_port));
        assert!(first.volume.source.is_dir());
        assert!(fx.engine.has_image(&first.image));
        assert!(fx.engine.removed_images().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_creates_on_one_name() {
        let fx = fixture_with(1);
        let gate = fx.engine.hold_next_run();

        let (first, second) = tokio::join!(fx.controller.create(), async {
            // Start once the first attempt is parked in container start
            while fx.engine.builds().is_empty() {
                tokio::task::yield_now().await;
            }
            let second = fx.controller.create().await;
            gate.notify_one();
            second
        });

        let first = first.unwrap();
        assert!(matches!(second, Err(SandboxError::NameInUse(ref n)) if n == "grupo_vms_vm1"));

        // The loser touched nothing the winner depends on
        assert!(first.volume.source.is_dir());
        assert!(fx.engine.has_image(&first.image));
        assert!(fx.engine.removed_images().is_empty());
        assert_eq!(fx.engine.builds().len(), 1);
        assert_eq!(fx.controller.ports().reserved_count(), 1);
        assert!(fx.controller.ports().is_reserved(first.host_port));
        assert_eq!(fx.controller.list().await.unwrap().len(), 1);

        // Claim is gone once both attempts finish
        let err = fx.controller.create().await.unwrap_err();
        assert!(matches!(err, SandboxError::NameInUse(_)));
        assert!(first.volume.source.is_dir());
    }

    #[tokio::test]
    async fn test_engine_name_conflict_only_releases_port() {
        let fx = fixture_with(1);
        fx.engine.add_container("grupo_vms_vm1", SandboxStatus::Running);

        let err = fx.controller.create().await.unwrap_err();
        assert!(matches!(err, SandboxError::NameInUse(_)));

        assert_eq!(fx.controller.ports().reserved_count(), 0);
        assert!(fx.engine.removed_images().is_empty());
        assert!(fx.engine.has_image("grupo_vms_vm1_image"));
        assert!(fx.controller.volumes().root().join("grupo_vms_vm1").is_dir());
    }

    #[tokio::test]
    async fn test_build_failure_leaves_nothing_behind() {
        let fx = fixture();
        fx.engine.fail_builds();

        let err = fx.controller.create().await.unwrap_err();
        assert!(matches!(err, SandboxError::Build { .. }));
        assert_eq!(fx.controller.ports().reserved_count(), 0);
        assert!(fx.controller.list().await.unwrap().is_empty());
        assert_eq!(
            fs::read_dir(fx.controller.volumes().root()).unwrap().count(),
            0
        );
    }

    #[tokio::test]
    async fn test_run_failure_undoes_volume_image_and_port() {
        let fx = fixture();
        fx.engine.fail_runs();

        assert!(fx.controller.create().await.is_err());
        assert_eq!(fx.controller.ports().reserved_count(), 0);
        assert_eq!(fx.engine.removed_images().len(), 1);
        assert_eq!(
            fs::read_dir(fx.controller.volumes().root()).unwrap().count(),
            0
        );
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let fx = fixture();
        let err = fx.controller.delete("grupo_vms_vm999").await.unwrap_err();
        assert!(matches!(err, SandboxError::ContainerNotFound(_)));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_removes_container_volume_and_port() {
        let fx = fixture();
        let instance = fx.controller.create().await.unwrap();

        let removal = fx.controller.delete(&instance.name).await.unwrap();
        assert_eq!(removal.name, instance.name);
        assert!(removal.volume_removed);
        assert_eq!(removal.released_port, Some(instance.host_port));
        assert!(!instance.volume.source.exists());
        assert!(!fx.controller.ports().is_reserved(instance.host_port));
        assert!(fx.controller.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_with_leftover_files_reports_volume_step() {
        let fx = fixture();
        let instance = fx.controller.create().await.unwrap();
        fs::write(instance.volume.source.join("notes.txt"), b"keep me").unwrap();

        let err = fx.controller.delete(&instance.name).await.unwrap_err();
        match err {
            SandboxError::VolumeReclaim { name, source } => {
                assert_eq!(name, instance.name);
                assert!(matches!(*source, SandboxError::VolumeNotEmpty(_)));
            }
            other => panic!("expected volume failure, got {:?}", other),
        }

        // Container removal stays committed
        assert!(fx.controller.list().await.unwrap().is_empty());
        assert!(instance.volume.source.join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_foreign_container_without_volume() {
        let fx = fixture();
        fx.engine.add_container("grupo_vms_vm77", SandboxStatus::Exited);

        let removal = fx.controller.delete("grupo_vms_vm77").await.unwrap();
        assert!(!removal.volume_removed);
        assert_eq!(removal.released_port, None);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let config = ProvisionerConfig {
            storage_root: dir.path().to_path_buf(),
            group_name: String::new(),
            ..Default::default()
        };
        let result = SandboxController::new(&config, Arc::new(FakeEngine::default()));
        assert!(matches!(result, Err(SandboxError::InvalidConfig(_))));
    }
}

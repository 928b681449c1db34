//! Volume provisioning for sandbox storage

use log::{debug, info};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::absolutize;
use crate::errors::{Result, SandboxError};
use crate::storage::file_component;

/// Host directory bound into a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeBinding {
    /// Host directory
    pub source: PathBuf,
    /// Container path
    pub destination: String,
    /// Read-only flag
    pub read_only: bool,
}

impl VolumeBinding {
    /// Create read-write bind
    pub fn bind(source: impl AsRef<Path>, destination: impl Into<String>) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            destination: destination.into(),
            read_only: false,
        }
    }

    /// Engine bind string, `host:container:mode`
    pub fn bind_spec(&self) -> String {
        let mode = if self.read_only { "ro" } else { "rw" };
        format!(
            "{}:{}:{}",
            self.source.display().to_string().replace('\\', "/"),
            self.destination,
            mode
        )
    }
}

/// Result of [`VolumeProvisioner::provision`]
#[derive(Debug, Clone)]
pub struct ProvisionedVolume {
    pub binding: VolumeBinding,
    /// False when the directory was already present
    pub created: bool,
}

/// Creates and reclaims per-sandbox host directories
#[derive(Debug, Clone)]
pub struct VolumeProvisioner {
    /// Absolute storage root
    root: PathBuf,
    /// Mount point inside containers
    mount: String,
}

impl VolumeProvisioner {
    /// Create provisioner. A relative `root` is resolved against the current directory.
    pub fn new(root: impl AsRef<Path>, mount: impl Into<String>) -> Result<Self> {
        Ok(Self {
            root: absolutize(root.as_ref())?,
            mount: mount.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage root if missing. Runs once at startup.
    pub fn ensure_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Deterministic host path for an instance
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        if file_component(name)? != name {
            return Err(SandboxError::InvalidFileName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    /// Create the host directory for `name`. Succeeds if it already exists.
    pub async fn provision(&self, name: &str) -> Result<ProvisionedVolume> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.root).await?;

        let created = match fs::create_dir(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if !fs::metadata(&path).await?.is_dir() {
                    return Err(e.into());
                }
                false
            }
            Err(e) => return Err(e.into()),
        };

        if created {
            info!("Created volume {}", path.display());
        } else {
            debug!("Reusing existing volume {}", path.display());
        }

        Ok(ProvisionedVolume {
            binding: VolumeBinding::bind(&path, self.mount.clone()),
            created,
        })
    }

    /// Remove a volume directory, only if it is empty.
    ///
    /// Returns `Ok(false)` if there was nothing to remove. Leftover files are
    /// reported as [`SandboxError::VolumeNotEmpty`] and left in place.
    pub async fn reclaim(&self, path: &Path) -> Result<bool> {
        let mut entries = match fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Volume {} already gone", path.display());
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        if entries.next_entry().await?.is_some() {
            return Err(SandboxError::VolumeNotEmpty(path.to_path_buf()));
        }

        fs::remove_dir(path).await?;
        info!("Removed volume {}", path.display());
        Ok(true)
    }
}

//! Service configuration

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::errors::{Result, SandboxError};

/// Subdirectory of the storage root that receives host-side uploads
pub const UPLOAD_DIR: &str = "uploaded_files";

/// Control-plane configuration
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// Name prefix shared by every sandbox this service creates
    pub group_name: String,
    /// Host directory holding one subdirectory per sandbox
    pub storage_root: PathBuf,
    /// Build context for sandbox images
    pub build_context: PathBuf,
    /// Build file, relative to the build context
    pub dockerfile: String,
    /// Mount point of the volume inside each container
    pub volume_mount: String,
    /// Port the relay listens on inside the container
    pub container_port: u16,
    /// Host ports are drawn from `port_base + 1 ..= port_base + port_span`
    pub port_base: u16,
    pub port_span: u16,
    /// Instance suffixes are drawn from `1 ..= name_span`
    pub name_span: u32,
    /// Address the control plane listens on
    pub bind: SocketAddr,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            group_name: "grupo_vms".to_string(),
            storage_root: PathBuf::from("web/storage"),
            build_context: PathBuf::from("."),
            dockerfile: "vm/Dockerfile".to_string(),
            volume_mount: "/storage".to_string(),
            container_port: 5000,
            port_base: 5000,
            port_span: 1000,
            name_span: 1000,
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
        }
    }
}

impl ProvisionerConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.group_name.trim().is_empty() {
            return Err(SandboxError::InvalidConfig(
                "Group name cannot be empty".to_string(),
            ));
        }

        if !is_engine_name(&self.group_name) {
            return Err(SandboxError::InvalidConfig(format!(
                "Group name must match [a-zA-Z0-9][a-zA-Z0-9_.-]*: {:?}",
                self.group_name
            )));
        }

        if self.dockerfile.is_empty() || Path::new(&self.dockerfile).is_absolute() {
            return Err(SandboxError::InvalidConfig(format!(
                "Dockerfile must be a path inside the build context: {:?}",
                self.dockerfile
            )));
        }

        if self.port_span == 0 {
            return Err(SandboxError::InvalidConfig(
                "Port span must be at least 1".to_string(),
            ));
        }

        if self.port_base.checked_add(self.port_span).is_none() {
            return Err(SandboxError::InvalidConfig(format!(
                "Port range {}+{} exceeds 65535",
                self.port_base, self.port_span
            )));
        }

        if self.name_span == 0 {
            return Err(SandboxError::InvalidConfig(
                "Name span must be at least 1".to_string(),
            ));
        }

        if !self.volume_mount.starts_with('/') {
            return Err(SandboxError::InvalidConfig(format!(
                "Volume mount must be an absolute container path: {}",
                self.volume_mount
            )));
        }

        Ok(())
    }

    /// Directory receiving files posted to the control plane
    pub fn upload_dir(&self) -> PathBuf {
        self.storage_root.join(UPLOAD_DIR)
    }
}

/// Characters container engines accept in a container name
fn is_engine_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        }
        _ => false,
    }
}

/// In-container relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub storage_dir: PathBuf,
    pub bind: SocketAddr,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("/storage"),
            bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
        }
    }
}

/// Resolve `path` against the current directory unless already absolute
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProvisionerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.group_name, "grupo_vms");
        assert_eq!(config.container_port, 5000);
        assert_eq!(config.upload_dir(), PathBuf::from("web/storage/uploaded_files"));
    }

    #[test]
    fn test_empty_group_rejected() {
        let config = ProvisionerConfig {
            group_name: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SandboxError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_group_name_charset() {
        for bad in ["my group", "a/b", "_lead", "-x", "grupo:vms"] {
            let config = ProvisionerConfig {
                group_name: bad.to_string(),
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(SandboxError::InvalidConfig(_))),
                "{:?} accepted",
                bad
            );
        }

        let config = ProvisionerConfig {
            group_name: "lab-1.x_y".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_range_overflow_rejected() {
        let config = ProvisionerConfig {
            port_base: 65000,
            port_span: 1000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_spans_rejected() {
        let ports = ProvisionerConfig {
            port_span: 0,
            ..Default::default()
        };
        let names = ProvisionerConfig {
            name_span: 0,
            ..Default::default()
        };
        assert!(ports.validate().is_err());
        assert!(names.validate().is_err());
    }

    #[test]
    fn test_dockerfile_must_be_relative() {
        let config = ProvisionerConfig {
            dockerfile: "/etc/Dockerfile".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relative_mount_rejected() {
        let config = ProvisionerConfig {
            volume_mount: "storage".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_absolutize() {
        let abs = absolutize(Path::new("/already/there")).unwrap();
        assert_eq!(abs, PathBuf::from("/already/there"));

        let rel = absolutize(Path::new("web/storage")).unwrap();
        assert!(rel.is_absolute());
        assert!(rel.ends_with("web/storage"));
    }
}

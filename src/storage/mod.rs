//! Storage layer: per-sandbox volumes and flat file directories
//!
//! Every sandbox gets a host directory `<storage_root>/<name>` bind-mounted
//! read-write into the container. Directory existence and naming are the
//! only record of a sandbox's storage; there is no metadata file.
//!
//! Flat upload directories (the relay's storage dir, the host-side
//! `uploaded_files` area) go through [`FileStore`].

pub mod files;
pub mod volumes;

pub use files::FileStore;
pub use volumes::{ProvisionedVolume, VolumeBinding, VolumeProvisioner};

use crate::errors::{Result, SandboxError};

/// Reduce a client-supplied name to its last path component.
///
/// Both `/` and `\` count as separators. Empty, `.` and `..` are rejected.
pub fn file_component(raw: &str) -> Result<&str> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match last {
        "" | "." | ".." => Err(SandboxError::InvalidFileName(raw.to_string())),
        name => Ok(name),
    }
}

//! Error types for provisioning operations

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for provisioning operations
pub type Result<T> = std::result::Result<T, SandboxError>;

/// Errors that can occur while provisioning, listing or removing sandboxes
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Container engine error: {0}")]
    Engine(#[from] bollard::errors::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No free host port left in {low}-{high}")]
    PortsExhausted { low: u16, high: u16 },

    #[error("Container name already in use: {0}")]
    NameInUse(String),

    #[error("Image build failed for {tag}: {message}")]
    Build { tag: String, message: String },

    #[error("Container '{0}' not found")]
    ContainerNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Volume is not empty: {}", .0.display())]
    VolumeNotEmpty(PathBuf),

    #[error("Container '{name}' removed but its volume could not be deleted: {source}")]
    VolumeReclaim {
        name: String,
        #[source]
        source: Box<SandboxError>,
    },

    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("No file provided in field '{0}'")]
    MissingFile(String),

    #[error("Malformed upload: {0}")]
    MalformedUpload(String),
}

impl SandboxError {
    /// Not-found outcomes are expected, low-severity results
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SandboxError::ContainerNotFound(_) | SandboxError::FileNotFound(_)
        )
    }

    /// Whether the engine answered with the given HTTP status
    pub(crate) fn engine_status(err: &bollard::errors::Error) -> Option<u16> {
        match err {
            bollard::errors::Error::DockerResponseServerError { status_code, .. } => {
                Some(*status_code)
            }
            _ => None,
        }
    }
}

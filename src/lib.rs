//! sandbox-provisioner: on-demand sandbox containers
//!
//! Provisions, lists and tears down single-tenant sandbox containers, each
//! backed by a private host directory and a dedicated host port, plus the
//! file relay that runs inside every sandbox.
//!
//! # Modules
//!
//! - **allocation**: Host port and instance name allocation
//! - **storage**: Per-sandbox volumes and flat file directories
//! - **engine**: Container engine seam and its Docker implementation
//! - **registry**: Group-scoped listing
//! - **controller**: Create/delete orchestration
//! - **api**: Control-plane HTTP routes
//! - **relay**: In-container file relay routes
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sandbox_provisioner::{DockerEngine, ProvisionerConfig, SandboxController};
//!
//! let engine = Arc::new(DockerEngine::connect()?);
//! let controller = SandboxController::new(&ProvisionerConfig::default(), engine)?;
//!
//! let instance = controller.create().await?;
//! println!("{}", instance.summary());
//! controller.delete(&instance.name).await?;
//! ```

// Core modules
pub mod config;
pub mod errors;
pub mod logging;

// Layered modules
pub mod allocation;
pub mod engine;
pub mod registry;
pub mod storage;

// Main controller
pub mod controller;

// HTTP surfaces
pub mod api;
pub mod cli;
pub mod relay;

// Public API
pub use config::{ProvisionerConfig, RelayConfig};
pub use controller::{Removal, SandboxController, SandboxInstance};
pub use engine::{ContainerEngine, ContainerRecord, DockerEngine, SandboxStatus};
pub use errors::{Result, SandboxError};
pub use registry::GroupRegistry;
pub use storage::{FileStore, VolumeProvisioner};

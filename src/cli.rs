//! Command-line definitions for the two services

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::{ProvisionerConfig, RelayConfig};

#[derive(Parser, Debug)]
#[command(name = "sandbox-server")]
#[command(version, about = "Provision, list and remove sandbox containers", long_about = None)]
#[command(after_help = "EXAMPLES:
    sandbox-server
    sandbox-server --bind 0.0.0.0:8000 --storage-root /srv/sandboxes
    SANDBOX_GROUP=lab sandbox-server --verbose
")]
pub struct ServerCli {
    /// Address to listen on
    #[arg(long, env = "SANDBOX_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Name prefix for every sandbox this service creates
    #[arg(short, long, env = "SANDBOX_GROUP", default_value = "grupo_vms")]
    pub group: String,

    /// Host directory holding one volume per sandbox
    #[arg(short = 's', long, env = "SANDBOX_STORAGE_ROOT", default_value = "web/storage")]
    pub storage_root: PathBuf,

    /// Docker build context for sandbox images
    #[arg(short = 'c', long, env = "SANDBOX_BUILD_CONTEXT", default_value = ".")]
    pub build_context: PathBuf,

    /// Build file for sandbox images, relative to the build context
    #[arg(long, env = "SANDBOX_DOCKERFILE", default_value = "vm/Dockerfile")]
    pub dockerfile: String,

    /// Volume mount point inside containers
    #[arg(long, env = "SANDBOX_VOLUME_MOUNT", default_value = "/storage")]
    pub volume_mount: String,

    /// Port the relay listens on inside containers
    #[arg(long, default_value_t = 5000)]
    pub container_port: u16,

    /// Host ports are drawn from BASE+1..=BASE+SPAN
    #[arg(long, value_name = "BASE", default_value_t = 5000)]
    pub port_base: u16,

    #[arg(long, value_name = "SPAN", default_value_t = 1000)]
    pub port_span: u16,

    /// Instance numbers are drawn from 1..=SPAN
    #[arg(long, value_name = "SPAN", default_value_t = 1000)]
    pub name_span: u32,

    /// Show verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServerCli {
    pub fn config(&self) -> ProvisionerConfig {
        ProvisionerConfig {
            group_name: self.group.clone(),
            storage_root: self.storage_root.clone(),
            build_context: self.build_context.clone(),
            dockerfile: self.dockerfile.clone(),
            volume_mount: self.volume_mount.clone(),
            container_port: self.container_port,
            port_base: self.port_base,
            port_span: self.port_span,
            name_span: self.name_span,
            bind: self.bind,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "sandbox-relay")]
#[command(version, about = "Serve the sandbox storage directory over HTTP", long_about = None)]
pub struct RelayCli {
    /// Address to listen on
    #[arg(long, env = "RELAY_BIND", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// Directory files are stored in
    #[arg(short = 'd', long, env = "RELAY_STORAGE_DIR", default_value = "/storage")]
    pub storage_dir: PathBuf,

    /// Show verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl RelayCli {
    pub fn config(&self) -> RelayConfig {
        RelayConfig {
            storage_dir: self.storage_dir.clone(),
            bind: self.bind,
        }
    }
}

//! Control-plane server for sandbox containers
//!
//! See [`sandbox_provisioner::api`] for the endpoints.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;
use log::{error, info, warn};

use sandbox_provisioner::api::{self, AppState};
use sandbox_provisioner::cli::ServerCli;
use sandbox_provisioner::config::UPLOAD_DIR;
use sandbox_provisioner::logging;
use sandbox_provisioner::{DockerEngine, FileStore, SandboxController};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = ServerCli::parse();
    logging::init_logger(cli.verbose);

    let config = cli.config();
    let engine = DockerEngine::connect().map_err(|e| {
        error!("Cannot connect to the container engine: {}", e);
        std::io::Error::other(e)
    })?;
    if let Err(e) = engine.ping().await {
        warn!("Container engine did not answer ping: {}", e);
    }

    let controller = SandboxController::new(&config, Arc::new(engine)).map_err(|e| {
        error!("Invalid configuration: {}", e);
        std::io::Error::other(e)
    })?;
    let uploads = FileStore::new(controller.volumes().root().join(UPLOAD_DIR));

    info!(
        "Sandbox control plane starting on http://{} (group {}, storage {})",
        config.bind,
        config.group_name,
        controller.volumes().root().display()
    );

    let state = web::Data::new(AppState::new(controller, uploads));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .configure(api::routes)
    })
    .bind(config.bind)?
    .run()
    .await
}

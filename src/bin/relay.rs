//! File relay running inside each sandbox container

use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;
use log::info;

use sandbox_provisioner::cli::RelayCli;
use sandbox_provisioner::logging;
use sandbox_provisioner::relay::{self, RelayState};
use sandbox_provisioner::FileStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = RelayCli::parse();
    logging::init_logger(cli.verbose);

    let config = cli.config();
    std::fs::create_dir_all(&config.storage_dir)?;

    info!(
        "File relay serving {} on http://{}",
        config.storage_dir.display(),
        config.bind
    );

    let state = web::Data::new(RelayState::new(FileStore::new(&config.storage_dir)));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .configure(relay::routes)
    })
    .bind(config.bind)?
    .run()
    .await
}

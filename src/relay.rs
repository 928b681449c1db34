//! In-container file relay
//!
//! Runs inside each sandbox and serves the mounted storage directory:
//!
//! POST /upload - Store the file sent in field `file`, replacing any same-named file
//! GET /download/{filename} - Stream a stored file back
//! DELETE /delete/{filename} - Remove a stored file
//! GET /health - Health check

use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder, ResponseError};
use log::{info, warn};

use crate::api::responses::MessageBody;
use crate::api::upload::save_field;
use crate::errors::SandboxError;
use crate::storage::FileStore;

/// Field carrying the file on `/upload`
pub const UPLOAD_FIELD: &str = "file";

pub struct RelayState {
    pub store: FileStore,
}

impl RelayState {
    pub fn new(store: FileStore) -> Self {
        Self { store }
    }
}

/// Register relay routes
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/upload", web::post().to(upload_file))
        .route("/download/{filename}", web::get().to(download_file))
        .route("/delete/{filename}", web::delete().to(delete_file));
}

async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "sandbox-relay",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn upload_file(payload: Multipart, state: web::Data<RelayState>) -> HttpResponse {
    match save_field(payload, UPLOAD_FIELD, &state.store).await {
        Ok(name) => {
            info!("Stored {}", name);
            HttpResponse::Created().json(MessageBody::new("File uploaded successfully"))
        }
        Err(e) => {
            warn!("Upload failed: {}", e);
            e.error_response()
        }
    }
}

async fn download_file(
    filename: web::Path<String>,
    state: web::Data<RelayState>,
) -> Result<NamedFile, SandboxError> {
    let path = state.store.locate(&filename).await?;
    Ok(NamedFile::open_async(path).await?)
}

async fn delete_file(
    filename: web::Path<String>,
    state: web::Data<RelayState>,
) -> Result<HttpResponse, SandboxError> {
    state.store.delete(&filename).await?;
    info!("Deleted {}", filename);
    Ok(HttpResponse::Ok().json(MessageBody::new("File deleted successfully")))
}

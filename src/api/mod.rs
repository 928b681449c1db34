//! Control-plane REST API
//!
//! ## Endpoints
//!
//! POST /crear - Create sandbox
//! POST /subir-archivo - Upload a file into the host upload area (field `archivo`)
//! GET /contenedores - List group sandboxes
//! DELETE /contenedores/{name} - Remove sandbox and its volume
//! GET /health - Health check

pub mod responses;
pub mod upload;

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder, ResponseError};
use log::{error, info, warn};

use crate::controller::SandboxController;
use crate::errors::SandboxError;
use crate::storage::FileStore;
use responses::{error_with_context, CreatedBody, MessageBody};

/// Field carrying the file on `/subir-archivo`
pub const UPLOAD_FIELD: &str = "archivo";

/// Shared state for control-plane handlers
pub struct AppState {
    pub controller: SandboxController,
    pub uploads: FileStore,
}

impl AppState {
    pub fn new(controller: SandboxController, uploads: FileStore) -> Self {
        Self {
            controller,
            uploads,
        }
    }
}

/// Register control-plane routes
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/crear", web::post().to(create_sandbox))
        .route("/subir-archivo", web::post().to(upload_file))
        .route("/contenedores", web::get().to(list_sandboxes))
        .route("/contenedores/{name}", web::delete().to(delete_sandbox));
}

/// Health check endpoint
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "sandbox-provisioner",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Create sandbox
async fn create_sandbox(state: web::Data<AppState>) -> HttpResponse {
    match state.controller.create().await {
        Ok(instance) => HttpResponse::Ok().json(CreatedBody {
            message: instance.summary(),
            name: instance.name,
            port: instance.host_port,
            volume: instance.volume.source.display().to_string(),
        }),
        Err(e) => {
            error!("Create failed: {}", e);
            error_with_context("Error creating or running the container", &e)
        }
    }
}

/// Upload file to the host upload area
async fn upload_file(payload: Multipart, state: web::Data<AppState>) -> HttpResponse {
    match upload::save_field(payload, UPLOAD_FIELD, &state.uploads).await {
        Ok(name) => {
            info!("File received: {}", name);
            HttpResponse::Ok().json(MessageBody::new(format!(
                "File '{}' uploaded successfully.",
                name
            )))
        }
        Err(e) if e.status_code().is_client_error() => {
            warn!("Rejected upload: {}", e);
            e.error_response()
        }
        Err(e) => {
            error!("Upload failed: {}", e);
            error_with_context("Error saving the file", &e)
        }
    }
}

/// List sandboxes
async fn list_sandboxes(
    state: web::Data<AppState>,
) -> Result<HttpResponse, SandboxError> {
    let containers = state.controller.list().await?;
    Ok(HttpResponse::Ok().json(containers))
}

/// Delete sandbox
async fn delete_sandbox(name: web::Path<String>, state: web::Data<AppState>) -> HttpResponse {
    match state.controller.delete(&name).await {
        Ok(removal) => HttpResponse::Ok().json(MessageBody::new(format!(
            "Container '{}' removed successfully",
            removal.name
        ))),
        Err(e) if e.is_not_found() => {
            info!("Delete of unknown sandbox {}", name);
            e.error_response()
        }
        Err(e) => error_with_context("Error removing the container", &e),
    }
}

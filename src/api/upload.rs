//! Multipart file extraction shared by both services

use actix_multipart::Multipart;
use futures::StreamExt;
use log::{debug, info};

use crate::errors::{Result, SandboxError};
use crate::storage::{file_component, FileStore};

/// Store the first file sent under `field_name`, returning its stored name.
///
/// Other fields are skipped. A missing field, or one without a file name,
/// is [`SandboxError::MissingFile`].
pub async fn save_field(mut payload: Multipart, field_name: &str, store: &FileStore) -> Result<String> {
    while let Some(item) = payload.next().await {
        let field = item.map_err(|e| SandboxError::MalformedUpload(e.to_string()))?;

        if field.name() != Some(field_name) {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| SandboxError::MissingFile(field_name.to_string()))?;

        let stored = file_component(&filename)?.to_string();
        info!("Receiving file {} into {}", stored, store.root().display());
        store.write_stream(&stored, field).await?;
        return Ok(stored);
    }

    Err(SandboxError::MissingFile(field_name.to_string()))
}

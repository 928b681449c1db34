//! Flat file directory used for uploads and downloads

use std::fmt::Display;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use log::debug;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::errors::{Result, SandboxError};
use crate::storage::file_component;

/// A directory of files addressed by bare file name
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `filename` inside the store, after reducing it to its last component
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        Ok(self.root.join(file_component(filename)?))
    }

    /// Write a chunk stream to `filename`, replacing any existing file.
    ///
    /// The previous content stays in place until the whole stream has been
    /// written.
    pub async fn write_stream<S, E>(&self, filename: &str, mut chunks: S) -> Result<PathBuf>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: Display,
    {
        let path = self.resolve(filename)?;
        fs::create_dir_all(&self.root).await?;

        // Staged next to the target; dropping `staged` on error removes it
        let (file, staged) = tempfile::Builder::new()
            .prefix(".upload-")
            .tempfile_in(&self.root)?
            .into_parts();
        let mut file = fs::File::from_std(file);

        let mut written = 0usize;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| SandboxError::MalformedUpload(e.to_string()))?;
            written += chunk.len();
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        staged.persist(&path).map_err(std::io::Error::from)?;
        debug!("Stored {} bytes at {}", written, path.display());
        Ok(path)
    }

    /// Write a complete buffer to `filename`
    pub async fn write(&self, filename: &str, data: impl Into<Bytes>) -> Result<PathBuf> {
        let chunk: std::result::Result<Bytes, std::io::Error> = Ok(data.into());
        self.write_stream(filename, futures::stream::iter([chunk])).await
    }

    /// Path of an existing file
    pub async fn locate(&self, filename: &str) -> Result<PathBuf> {
        let path = self.resolve(filename)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(SandboxError::FileNotFound(filename.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SandboxError::FileNotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn read(&self, filename: &str) -> Result<Vec<u8>> {
        let path = self.locate(filename).await?;
        Ok(fs::read(path).await?)
    }

    /// Remove `filename`; not-found if absent
    pub async fn delete(&self, filename: &str) -> Result<()> {
        let path = self.locate(filename).await?;
        fs::remove_file(&path).await?;
        debug!("Deleted {}", path.display());
        Ok(())
    }
}

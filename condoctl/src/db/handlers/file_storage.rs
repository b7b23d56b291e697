//! Blob storage for maintenance request attachments.
//!
//! Metadata lives in `maintenance_attachments`; the bytes live behind a [`FileStorage`]
//! and are addressed by the opaque storage key saved with the metadata row.

use crate::config::AttachmentsConfig;
use crate::db::{
    errors::{DbError, Result},
    models::file_storage::{FileStorageRequest, FileStorageResponse},
};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store content and return its storage key
    async fn store(&self, request: FileStorageRequest) -> Result<FileStorageResponse>;

    async fn retrieve(&self, storage_key: &str) -> Result<Vec<u8>>;

    /// Deleting a missing key is not an error
    async fn delete(&self, storage_key: &str) -> Result<()>;
}

/// Stores each blob as `{base}/{first two chars of uuid}/{uuid}.{ext}`
pub struct LocalFileStorage {
    base_path: PathBuf,
}

impl LocalFileStorage {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Resolve a storage key below the base directory, refusing anything that could escape it
    fn resolve(&self, storage_key: &str) -> Result<PathBuf> {
        let key = Path::new(storage_key);
        let is_plain = !storage_key.is_empty() && key.components().all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(DbError::Other(anyhow::anyhow!("Invalid storage key: {storage_key}")));
        }
        Ok(self.base_path.join(key))
    }
}

fn extension_for(content_type: &str) -> &'static str {
    mime_guess::get_mime_extensions_str(content_type)
        .and_then(|extensions| extensions.first().copied())
        .unwrap_or("dat")
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    #[instrument(skip(self, request), fields(size = request.content.len(), content_type = %request.content_type), err)]
    async fn store(&self, request: FileStorageRequest) -> Result<FileStorageResponse> {
        let file_uuid = uuid::Uuid::new_v4().to_string();
        let relative_path = format!("{}/{}.{}", &file_uuid[..2], file_uuid, extension_for(&request.content_type));
        let full_path = self.base_path.join(&relative_path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(&request.content).await?;
        file.sync_all().await?;

        Ok(FileStorageResponse {
            storage_key: relative_path,
        })
    }

    async fn retrieve(&self, storage_key: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(storage_key)?;
        match fs::read(&full_path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DbError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, storage_key: &str) -> Result<()> {
        let full_path = self.resolve(storage_key)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Create the attachment store, making sure its root directory exists
pub async fn create_file_storage(config: &AttachmentsConfig) -> Result<Arc<dyn FileStorage>> {
    tracing::info!("Using local attachment storage at {:?}", config.storage_dir);
    fs::create_dir_all(&config.storage_dir).await.map_err(|e| {
        DbError::Other(anyhow::anyhow!(
            "Failed to create attachment directory {:?}: {}",
            config.storage_dir,
            e
        ))
    })?;
    Ok(Arc::new(LocalFileStorage::new(config.storage_dir.clone())))
}

use std::sync::Arc;

use common::storage::filesystem::FilesystemBlobStore;
use common::storage::s3::S3BlobStore;
use common::storage::{BlobStore, StorageError};
use common::{StorageBackendKind, StorageConfig};
use sea_orm::DatabaseConnection;

use crate::assets::AssetManager;
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DatabaseConnection,
    pub blob_store: Arc<dyn BlobStore>,
    pub assets: AssetManager,
}

impl AppState {
    pub fn new(config: AppConfig, db: DatabaseConnection, blob_store: Arc<dyn BlobStore>) -> Self {
        let assets = AssetManager::new(db.clone(), blob_store.clone(), config.media.clone());
        Self {
            config,
            db,
            blob_store,
            assets,
        }
    }
}

/// Construct the configured object store backend.
pub async fn build_blob_store(config: &StorageConfig) -> Result<Arc<dyn BlobStore>, StorageError> {
    match config.backend {
        StorageBackendKind::Filesystem => {
            let store = FilesystemBlobStore::new(
                config.path.clone(),
                config.public_base_url.clone(),
                config.max_object_size,
            )
            .await?;
            Ok(Arc::new(store))
        }
        StorageBackendKind::S3 => {
            let store =
                S3BlobStore::new(&config.s3, &config.public_base_url, config.max_object_size)?;
            Ok(Arc::new(store))
        }
    }
}

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::BufReader;
use tracing::debug;

use super::error::StorageError;
use super::key::{NAMESPACE, ObjectRef};
use super::traits::{BlobStore, BoxReader, StoredObject, join_url};

/// Filesystem-backed object store.
///
/// Objects live at `{base_path}/{key}`, i.e.
/// `{base_path}/businesses/{business_id}/{file}`. Writes go through a temp
/// file and a rename so readers never observe a partial object.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
    public_base_url: String,
    max_size: u64,
}

impl FilesystemBlobStore {
    /// Create a new filesystem object store.
    pub async fn new(
        base_path: PathBuf,
        public_base_url: impl Into<String>,
        max_size: u64,
    ) -> Result<Self, StorageError> {
        fs::create_dir_all(base_path.join(NAMESPACE)).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            public_base_url: public_base_url.into(),
            max_size,
        })
    }

    /// Compute the filesystem path for a key.
    fn object_path(&self, key: &ObjectRef) -> PathBuf {
        self.base_path.join(key.as_str())
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put_object(
        &self,
        key: &ObjectRef,
        data: &[u8],
        _content_type: &str,
    ) -> Result<(), StorageError> {
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }

        let object_path = self.object_path(key);
        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Some(parent) = object_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, &object_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn get_stream(&self, key: &ObjectRef) -> Result<BoxReader, StorageError> {
        match fs::File::open(self.object_path(key)).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &ObjectRef) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.object_path(key)).await?)
    }

    async fn delete(&self, key: &ObjectRef) -> Result<bool, StorageError> {
        match fs::remove_file(self.object_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let namespace_dir = self.base_path.join(NAMESPACE);
        let mut objects = Vec::new();

        let mut partitions = match fs::read_dir(&namespace_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(objects),
            Err(e) => return Err(e.into()),
        };

        while let Some(partition) = partitions.next_entry().await? {
            if !partition.file_type().await?.is_dir() {
                continue;
            }
            let partition_name = partition.file_name().to_string_lossy().into_owned();
            let partition_prefix = format!("{NAMESPACE}/{partition_name}/");
            if !partition_prefix.starts_with(prefix) && !prefix.starts_with(&partition_prefix) {
                continue;
            }

            let mut files = fs::read_dir(partition.path()).await?;
            while let Some(file) = files.next_entry().await? {
                let raw_key = format!(
                    "{partition_prefix}{}",
                    file.file_name().to_string_lossy()
                );
                if !raw_key.starts_with(prefix) {
                    continue;
                }
                let Ok(key) = ObjectRef::parse(&raw_key) else {
                    debug!(path = %file.path().display(), "Skipping foreign file in media namespace");
                    continue;
                };
                let meta = file.metadata().await?;
                if !meta.is_file() {
                    continue;
                }
                objects.push(StoredObject {
                    key,
                    size: meta.len(),
                    last_modified: meta.modified().map(DateTime::<Utc>::from)?,
                });
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn public_url(&self, key: &ObjectRef) -> String {
        join_url(&self.public_base_url, key)
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::Uuid;

use super::error::StorageError;
use super::key::ObjectRef;
use crate::media::ImageKind;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// One entry of a namespace listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: ObjectRef,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Binary object namespace partitioned by business.
///
/// Implementations must make `delete` idempotent: removing an absent object
/// returns `Ok(false)`, never an error.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a freshly generated key in the business partition.
    async fn put(
        &self,
        business_id: Uuid,
        label: &str,
        data: &[u8],
        kind: ImageKind,
    ) -> Result<ObjectRef, StorageError> {
        let key = ObjectRef::generate(business_id, label, kind);
        self.put_object(&key, data, kind.mime()).await?;
        Ok(key)
    }

    /// Store bytes under an explicit key, replacing any previous object.
    async fn put_object(
        &self,
        key: &ObjectRef,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Retrieve all bytes of an object.
    async fn get(&self, key: &ObjectRef) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get_stream(key).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Retrieve an object as a streaming async reader.
    async fn get_stream(&self, key: &ObjectRef) -> Result<BoxReader, StorageError>;

    /// Check whether an object exists.
    async fn exists(&self, key: &ObjectRef) -> Result<bool, StorageError>;

    /// Delete an object.
    ///
    /// Returns `true` if the object was deleted, `false` if it did not exist.
    async fn delete(&self, key: &ObjectRef) -> Result<bool, StorageError>;

    /// List every object whose key starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError>;

    /// Public URL at which the object can be fetched.
    fn public_url(&self, key: &ObjectRef) -> String;
}

/// Join a base URL and an object key with exactly one slash.
pub(crate) fn join_url(base: &str, key: &ObjectRef) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.as_str())
}

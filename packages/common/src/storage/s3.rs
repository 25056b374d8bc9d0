use std::io::Cursor;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use s3::error::S3Error;
use s3::{Bucket, Region, creds::Credentials};
use tracing::debug;

use super::error::StorageError;
use super::key::ObjectRef;
use super::traits::{BlobStore, BoxReader, StoredObject, join_url};
use crate::config::S3Config;

/// Object store backed by an S3-compatible bucket.
pub struct S3BlobStore {
    bucket: Box<Bucket>,
    public_base_url: String,
    max_size: u64,
}

impl S3BlobStore {
    /// Build a client for the configured bucket. No request is made here.
    ///
    /// `public_base_url` may be empty, in which case the bucket URL is used.
    pub fn new(config: &S3Config, public_base_url: &str, max_size: u64) -> Result<Self, StorageError> {
        if config.bucket.trim().is_empty() {
            return Err(StorageError::Backend("storage.s3.bucket is not set".into()));
        }

        let credentials = Credentials::new(
            config.access_key.as_deref(),
            config.secret_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Backend(format!("invalid S3 credentials: {e}")))?;

        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse()
                .map_err(|e| StorageError::Backend(format!("invalid S3 region: {e}")))?,
        };

        let mut bucket = Bucket::new(&config.bucket, region, credentials).map_err(backend)?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        let public_base_url = if public_base_url.trim().is_empty() {
            bucket.url()
        } else {
            public_base_url.to_string()
        };

        Ok(Self {
            bucket,
            public_base_url,
            max_size,
        })
    }
}

fn backend(err: S3Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn is_not_found(err: &S3Error) -> bool {
    matches!(err, S3Error::HttpFailWithBody(404, _))
}

fn check_status(key: &ObjectRef, action: &str, status: u16) -> Result<(), StorageError> {
    match status {
        200..=299 => Ok(()),
        404 => Err(StorageError::NotFound(key.to_string())),
        other => Err(StorageError::Backend(format!(
            "{action} {key} returned HTTP {other}"
        ))),
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_object(
        &self,
        key: &ObjectRef,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }

        let response = self
            .bucket
            .put_object_with_content_type(key.as_str(), data, content_type)
            .await
            .map_err(backend)?;
        check_status(key, "PUT", response.status_code())
    }

    async fn get_stream(&self, key: &ObjectRef) -> Result<BoxReader, StorageError> {
        let response = match self.bucket.get_object(key.as_str()).await {
            Ok(response) => response,
            Err(e) if is_not_found(&e) => return Err(StorageError::NotFound(key.to_string())),
            Err(e) => return Err(backend(e)),
        };
        check_status(key, "GET", response.status_code())?;
        Ok(Box::new(Cursor::new(response.bytes().to_vec())))
    }

    async fn exists(&self, key: &ObjectRef) -> Result<bool, StorageError> {
        match self.bucket.head_object(key.as_str()).await {
            Ok((_, 404)) => Ok(false),
            Ok((_, status)) => check_status(key, "HEAD", status).map(|_| true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(backend(e)),
        }
    }

    async fn delete(&self, key: &ObjectRef) -> Result<bool, StorageError> {
        // S3 answers 204 whether or not the key existed.
        let existed = self.exists(key).await?;
        if !existed {
            return Ok(false);
        }
        match self.bucket.delete_object(key.as_str()).await {
            Ok(response) => match response.status_code() {
                404 => Ok(false),
                status => check_status(key, "DELETE", status).map(|_| true),
            },
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(backend(e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let pages = self
            .bucket
            .list(prefix.to_string(), None)
            .await
            .map_err(backend)?;

        let mut objects = Vec::new();
        for object in pages.into_iter().flat_map(|page| page.contents) {
            let Ok(key) = ObjectRef::parse(&object.key) else {
                debug!(key = %object.key, "Skipping foreign object in media namespace");
                continue;
            };
            // Unparseable timestamps count as fresh so the orphan sweep leaves them alone.
            let last_modified = DateTime::parse_from_rfc3339(&object.last_modified)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            objects.push(StoredObject {
                key,
                size: object.size,
                last_modified,
            });
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn public_url(&self, key: &ObjectRef) -> String {
        join_url(&self.public_base_url, key)
    }
}

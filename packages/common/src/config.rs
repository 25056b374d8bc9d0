use std::path::PathBuf;

use serde::Deserialize;

use crate::media::{AssetClass, AssetClassPolicy};

/// Which object store implementation backs the media namespace.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    Filesystem,
    S3,
}

/// S3-compatible bucket settings. Only read when `backend = "s3"`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct S3Config {
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    /// Custom endpoint for MinIO/R2 style deployments.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Use path-style addressing (`{endpoint}/{bucket}/{key}`).
    #[serde(default)]
    pub path_style: bool,
}

fn default_s3_region() -> String {
    "us-east-1".into()
}

/// Object store configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Default: filesystem.
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackendKind,
    /// Root directory for the filesystem backend. Default: "./data/media".
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Prefix used to build public URLs. Default: "http://127.0.0.1:3000/media".
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Hard ceiling for a single stored object. Default: 16 MiB.
    #[serde(default = "default_max_object_size")]
    pub max_object_size: u64,
    #[serde(default)]
    pub s3: S3Config,
}

fn default_storage_backend() -> StorageBackendKind {
    StorageBackendKind::Filesystem
}
fn default_storage_path() -> PathBuf {
    PathBuf::from("./data/media")
}
fn default_public_base_url() -> String {
    "http://127.0.0.1:3000/media".into()
}
fn default_max_object_size() -> u64 {
    16 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: default_storage_path(),
            public_base_url: default_public_base_url(),
            max_object_size: default_max_object_size(),
            s3: S3Config {
                region: default_s3_region(),
                ..S3Config::default()
            },
        }
    }
}

/// Upload and compression limits for business media.
#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    #[serde(default = "default_logo_policy")]
    pub logo: AssetClassPolicy,
    #[serde(default = "default_gallery_policy")]
    pub gallery: AssetClassPolicy,
    /// Maximum files accepted by one gallery upload. Default: 20.
    #[serde(default = "default_max_batch_files")]
    pub max_batch_files: usize,
    /// Maximum alt text length in characters. Default: 500.
    #[serde(default = "default_max_alt_text_chars")]
    pub max_alt_text_chars: usize,
}

fn default_logo_policy() -> AssetClassPolicy {
    AssetClassPolicy::for_class(AssetClass::Logo)
}
fn default_gallery_policy() -> AssetClassPolicy {
    AssetClassPolicy::for_class(AssetClass::Gallery)
}
fn default_max_batch_files() -> usize {
    20
}
fn default_max_alt_text_chars() -> usize {
    500
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            logo: default_logo_policy(),
            gallery: default_gallery_policy(),
            max_batch_files: default_max_batch_files(),
            max_alt_text_chars: default_max_alt_text_chars(),
        }
    }
}

impl MediaConfig {
    /// Policy for the given asset class.
    pub fn policy(&self, class: AssetClass) -> &AssetClassPolicy {
        match class {
            AssetClass::Logo => &self.logo,
            AssetClass::Gallery => &self.gallery,
        }
    }

    /// Reject configurations the coordinator cannot honour.
    pub fn validate(&self) -> Result<(), String> {
        self.logo.validate("media.logo")?;
        self.gallery.validate("media.gallery")?;
        if self.gallery.max_upload_bytes < self.logo.max_upload_bytes {
            return Err(format!(
                "media.gallery.max_upload_bytes ({}) must not be smaller than media.logo.max_upload_bytes ({})",
                self.gallery.max_upload_bytes, self.logo.max_upload_bytes
            ));
        }
        if self.max_batch_files == 0 {
            return Err("media.max_batch_files must be at least 1".into());
        }
        Ok(())
    }
}

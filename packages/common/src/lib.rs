pub mod config;
pub mod media;
pub mod storage;

pub use config::{MediaConfig, S3Config, StorageBackendKind, StorageConfig};
pub use media::{AssetClass, AssetClassPolicy, ImageKind};

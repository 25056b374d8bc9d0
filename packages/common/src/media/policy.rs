use serde::Deserialize;

use super::AssetClass;
use super::compress::CompressionTarget;

const MIB: u64 = 1024 * 1024;

/// Per-class intake ceiling and compression settings.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AssetClassPolicy {
    /// Files above this size are rejected before any storage call.
    pub max_upload_bytes: u64,
    /// Files above this size are re-encoded before upload.
    pub compress_threshold_bytes: u64,
    /// Longest edge, in pixels, after compression.
    pub max_dimension: u32,
    /// Encoder quality in `(0, 1]`.
    pub quality: f32,
}

impl AssetClassPolicy {
    /// Built-in defaults: logos are small and sharp, gallery images larger.
    pub fn for_class(class: AssetClass) -> Self {
        match class {
            AssetClass::Logo => Self {
                max_upload_bytes: 5 * MIB,
                compress_threshold_bytes: MIB,
                max_dimension: 800,
                quality: 0.9,
            },
            AssetClass::Gallery => Self {
                max_upload_bytes: 10 * MIB,
                compress_threshold_bytes: 2 * MIB,
                max_dimension: 1200,
                quality: 0.85,
            },
        }
    }

    pub fn target(&self) -> CompressionTarget {
        CompressionTarget {
            max_dimension: self.max_dimension,
            quality: self.quality,
        }
    }

    pub(crate) fn validate(&self, section: &str) -> Result<(), String> {
        if self.max_upload_bytes == 0 {
            return Err(format!("{section}.max_upload_bytes must be positive"));
        }
        if self.max_dimension == 0 {
            return Err(format!("{section}.max_dimension must be positive"));
        }
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(format!("{section}.quality must be in (0, 1]"));
        }
        Ok(())
    }
}

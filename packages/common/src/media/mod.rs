//! Intake checks and size optimisation for business images.
//!
//! Both steps are pure: [`validate::validate_upload`] looks only at declared
//! metadata, [`compress::maybe_compress`] only at bytes. Neither touches the
//! object store or the catalog.

mod kind;
mod policy;

pub mod compress;
pub mod validate;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use compress::{
    CompressError, CompressionOutcome, CompressionTarget, Compressed, maybe_compress,
    read_dimensions,
};
pub use kind::ImageKind;
pub use policy::AssetClassPolicy;
pub use validate::{Rejection, RejectionKind, UploadCandidate, validate_upload};

/// The role an uploaded image plays for its business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    /// The single primary image.
    Logo,
    /// One of the ordered non-primary images.
    Gallery,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logo => "logo",
            Self::Gallery => "gallery",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format a byte count as megabytes with one decimal, for user-facing messages.
pub(crate) fn format_megabytes(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}

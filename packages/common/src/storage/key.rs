use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StorageError;
use crate::media::ImageKind;

/// Top-level directory of every business object.
pub const NAMESPACE: &str = "businesses";

const MAX_LABEL_LEN: usize = 48;
const MAX_FILE_NAME_LEN: usize = 200;

/// A validated object key: `businesses/{business_id}/{label}-{token}.{ext}`.
///
/// The token is a UUIDv7, so two uploads for the same business never collide
/// and keys sort by creation time within a partition.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(String);

impl ObjectRef {
    /// Mint a fresh key in the business partition.
    pub fn generate(business_id: Uuid, label: &str, kind: ImageKind) -> Self {
        Self(format!(
            "{}{}-{}.{}",
            Self::partition_prefix(business_id),
            slugify(label),
            Uuid::now_v7().simple(),
            kind.extension()
        ))
    }

    /// Parse and validate a key read back from the catalog or a listing.
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        let mut segments = s.split('/');
        let (Some(ns), Some(partition), Some(file_name), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(StorageError::InvalidKey(format!(
                "expected '{NAMESPACE}/<business>/<file>', got '{s}'"
            )));
        };

        if ns != NAMESPACE {
            return Err(StorageError::InvalidKey(format!(
                "key '{s}' is outside the '{NAMESPACE}' namespace"
            )));
        }

        Uuid::parse_str(partition).map_err(|_| {
            StorageError::InvalidKey(format!("partition '{partition}' is not a business id"))
        })?;

        validate_file_name(file_name)?;

        Ok(Self(s.to_string()))
    }

    /// Prefix shared by every key of one business, including the trailing slash.
    pub fn partition_prefix(business_id: Uuid) -> String {
        format!("{NAMESPACE}/{}/", business_id.hyphenated())
    }

    /// Prefix shared by every key in the namespace.
    pub fn namespace_prefix() -> String {
        format!("{NAMESPACE}/")
    }

    /// The owning business, recovered from the partition segment.
    pub fn business_id(&self) -> Option<Uuid> {
        self.0
            .split('/')
            .nth(1)
            .and_then(|p| Uuid::parse_str(p).ok())
    }

    /// Final path segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Image kind implied by the extension.
    pub fn kind(&self) -> Option<ImageKind> {
        self.file_name()
            .rsplit_once('.')
            .and_then(|(_, ext)| ImageKind::from_extension(ext))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate_file_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name.len() > MAX_FILE_NAME_LEN {
        return Err(StorageError::InvalidKey(format!(
            "file name must be 1-{MAX_FILE_NAME_LEN} characters"
        )));
    }
    if name.starts_with('.') || name.contains("..") {
        return Err(StorageError::InvalidKey(format!(
            "file name '{name}' must not start with '.' or contain '..'"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(StorageError::InvalidKey(format!(
            "file name '{name}' contains invalid characters"
        )));
    }
    if !name.contains('.') {
        return Err(StorageError::InvalidKey(format!(
            "file name '{name}' has no extension"
        )));
    }
    Ok(())
}

/// Lowercase ASCII slug of a display label, e.g. "Joe's Pizza logo" -> "joe-s-pizza-logo".
pub fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len().min(MAX_LABEL_LEN));
    let mut pending_dash = false;

    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
            if slug.len() >= MAX_LABEL_LEN {
                break;
            }
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "asset".to_string()
    } else {
        slug
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({})", self.0)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ObjectRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ObjectRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

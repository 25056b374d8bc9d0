use std::fmt;

use super::{ImageKind, format_megabytes};

/// Declared metadata of a file offered for upload. Pixel data is never inspected.
#[derive(Debug, Clone)]
pub struct UploadCandidate<'a> {
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub size: u64,
}

/// Why a candidate was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionKind {
    Empty,
    UnsupportedType { content_type: String },
    TooLarge { size: u64, ceiling: u64 },
}

/// A user-displayable rejection. Not an error in the I/O sense: the caller
/// shows it and moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub file_name: String,
    pub kind: RejectionKind,
}

impl Rejection {
    fn new(file_name: &str, kind: RejectionKind) -> Self {
        Self {
            file_name: file_name.to_string(),
            kind,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RejectionKind::Empty => write!(f, "{}: file is empty", self.file_name),
            RejectionKind::UnsupportedType { content_type } => {
                let shown = if content_type.is_empty() {
                    "unknown"
                } else {
                    content_type.as_str()
                };
                write!(
                    f,
                    "{}: unsupported file type '{shown}' (allowed: {})",
                    self.file_name,
                    ImageKind::allowed_labels()
                )
            }
            RejectionKind::TooLarge { size, ceiling } => write!(
                f,
                "{}: file is {}, the limit is {}",
                self.file_name,
                format_megabytes(*size),
                format_megabytes(*ceiling)
            ),
        }
    }
}

impl std::error::Error for Rejection {}

/// Decide whether a file may proceed to compression and storage.
///
/// `ceiling` is the caller's size limit for the asset class (logo or gallery).
/// Runs synchronously and must precede any network or storage work.
pub fn validate_upload(candidate: &UploadCandidate<'_>, ceiling: u64) -> Result<ImageKind, Rejection> {
    let kind = ImageKind::from_content_type(candidate.content_type).ok_or_else(|| {
        Rejection::new(
            candidate.file_name,
            RejectionKind::UnsupportedType {
                content_type: candidate.content_type.trim().to_string(),
            },
        )
    })?;

    if candidate.size == 0 {
        return Err(Rejection::new(candidate.file_name, RejectionKind::Empty));
    }

    if candidate.size > ceiling {
        return Err(Rejection::new(
            candidate.file_name,
            RejectionKind::TooLarge {
                size: candidate.size,
                ceiling,
            },
        ));
    }

    Ok(kind)
}

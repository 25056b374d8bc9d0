use thiserror::Error;

/// Failures of an object store call.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed key, or a key outside the media namespace.
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("object is {actual} bytes, the store accepts at most {limit}")]
    SizeLimitExceeded { actual: u64, limit: u64 },

    /// The remote service rejected or failed the request.
    #[error("object store error: {0}")]
    Backend(String),
}

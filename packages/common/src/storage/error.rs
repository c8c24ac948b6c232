use thiserror::Error;

/// Errors that can occur during content store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The provided content hash or blob key is invalid.
    #[error("invalid content hash: {0}")]
    InvalidHash(String),

    /// The backing store was unreachable or answered with an unexpected status.
    #[error("content store backend error: {0}")]
    Backend(String),

    /// A presigned URL could not be produced.
    #[error("failed to presign {key}: {reason}")]
    Presign { key: String, reason: String },
}

impl StorageError {
    /// Whether this error means the object simply is not there.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

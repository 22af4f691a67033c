//! Error types for blobvault.

use thiserror::Error;

/// Common error type for blobvault operations.
#[derive(Error, Debug)]
pub enum VaultError {
    /// The requested file has no catalog record.
    ///
    /// This is an expected, user-facing error.
    #[error("file not found: {0}")]
    NotFound(String),

    /// A catalog record exists but its chunk set is empty or
    /// non-contiguous, signalling storage inconsistency.
    #[error("corrupt file {id}: {reason}")]
    CorruptFile { id: String, reason: String },

    /// Underlying chunk or catalog I/O failed.
    #[error("storage failure: {0}")]
    Storage(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An upload failed mid-stream; best-effort rollback was attempted.
    #[error("upload failed: {source}")]
    UploadFailed {
        #[source]
        source: Box<VaultError>,
    },

    /// A delete removed the catalog record but failed to remove the
    /// file's chunks, leaving them orphaned.
    #[error("partial delete of file {id}: metadata removed, chunk removal failed: {reason}")]
    PartialDelete { id: String, reason: String },

    /// Validation error for caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

// Conversion from rusqlite errors
impl From<rusqlite::Error> for VaultError {
    fn from(e: rusqlite::Error) -> Self {
        VaultError::Storage(e.to_string())
    }
}

/// Result type alias for blobvault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

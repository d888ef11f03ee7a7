//! Error types for SiltDB.

use thiserror::Error;

/// Result type alias using SiltError.
pub type Result<T> = std::result::Result<T, SiltError>;

/// Errors that can occur in SiltDB operations.
///
/// Absent pages and caller protocol violations are reported through
/// `bool`/`Option` returns on the buffer pool, not through this type; only
/// disk and log failures surface as errors.
#[derive(Debug, Error)]
pub enum SiltError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    // WAL errors
    #[error("WAL write failed: {0}")]
    WalWriteFailed(String),

    #[error("WAL corrupted at LSN {lsn}: {reason}")]
    WalCorrupted { lsn: u64, reason: String },

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

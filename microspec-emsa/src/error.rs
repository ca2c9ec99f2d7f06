//! EMSA-specific error types.

use thiserror::Error;

/// Result type for EMSA operations.
pub type Result<T> = std::result::Result<T, Error>;

/// EMSA-specific error types.
#[derive(Error, Debug)]
pub enum Error {
    /// The `#CHECKSUM` line disagrees with the file contents.
    #[error("checksum mismatch: declared {declared}, computed {computed}")]
    ChecksumMismatch { declared: u64, computed: u64 },

    /// A required header keyword is absent.
    #[error("missing required keyword: {0}")]
    MissingKeyword(String),

    /// A header value or data line could not be interpreted.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

//! VeriCold-specific error types.

use thiserror::Error;

/// Result type for VeriCold operations.
pub type Result<T> = std::result::Result<T, Error>;

/// VeriCold-specific error types.
#[derive(Error, Debug)]
pub enum Error {
    /// A file header or record layout could not be decoded.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// A trace record is missing or unusable.
    #[error("malformed trace: {0}")]
    MalformedTrace(String),

    /// A caller-supplied argument is invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] microspec_core::Error),
}

impl Error {
    /// True when a data region extends past the end of the file.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Core(inner) if inner.is_truncated())
    }
}

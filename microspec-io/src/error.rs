//! I/O error types.

use thiserror::Error;

/// Result type for map reader operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Map reader error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Memory mapping error.
    #[error("memory mapping error: {0}")]
    MmapError(String),

    /// Invalid reader configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Descriptor, layout or bounds error.
    #[error("core error: {0}")]
    Core(#[from] microspec_core::Error),
}

impl Error {
    /// True when a read reached past the end of the payload.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Core(inner) if inner.is_truncated())
    }

    /// True when the declared layout cannot be decoded.
    #[must_use]
    pub fn is_unsupported_layout(&self) -> bool {
        matches!(self, Self::Core(inner) if inner.is_unsupported_layout())
    }

    /// True for out-of-range pixel, region or channel queries.
    #[must_use]
    pub fn is_index_out_of_range(&self) -> bool {
        matches!(self, Self::Core(microspec_core::Error::IndexOutOfRange(_)))
    }
}

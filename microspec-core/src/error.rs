//! Error types for microspec-core.

use thiserror::Error;

/// Result type alias for microspec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types shared by every reader.
#[derive(Error, Debug)]
pub enum Error {
    /// A required descriptor key was never set by the sidecar file.
    #[error("missing descriptor key: {0}")]
    MissingDescriptorKey(&'static str),

    /// A recognized descriptor key carried a value that could not be coerced.
    #[error("invalid value for descriptor key {key}: {value:?}")]
    InvalidDescriptorValue { key: &'static str, value: String },

    /// Element width, signedness, byte order or storage order is not supported.
    #[error("unsupported layout: {0}")]
    UnsupportedLayout(String),

    /// A read reached past the end of the available bytes.
    #[error("truncated file: need bytes up to {needed} from offset {offset}, only {available} available")]
    TruncatedFile {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Pixel, region or channel query outside the declared dimensions.
    #[error("index out of range: {0}")]
    IndexOutOfRange(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Builds a [`Error::TruncatedFile`] for the byte range `offset..needed`.
    #[must_use]
    pub fn truncated(offset: usize, needed: usize, available: usize) -> Self {
        Self::TruncatedFile {
            offset,
            needed,
            available,
        }
    }

    /// True when the bytes looked like this format but ended early.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::TruncatedFile { .. })
    }

    /// True when the declared layout is not one this crate can decode.
    #[must_use]
    pub fn is_unsupported_layout(&self) -> bool {
        matches!(self, Self::UnsupportedLayout(_))
    }
}

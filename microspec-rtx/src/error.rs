//! RTX container error types.

use thiserror::Error;

/// Result type for RTX operations.
pub type Result<T> = std::result::Result<T, Error>;

/// RTX container error types.
#[derive(Error, Debug)]
pub enum Error {
    /// No element with the requested tag.
    #[error("element not found: {0}")]
    NotFound(String),

    /// Embedded blob is not valid base64.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Embedded blob is not a valid zlib stream.
    #[error("zlib decompression error: {0}")]
    Decompress(std::io::Error),

    /// XML syntax error.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Well-formed XML that is not a single-rooted document.
    #[error("invalid document: {0}")]
    Document(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

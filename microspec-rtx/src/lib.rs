//! microspec-rtx: Bruker RTX container reader.
//!
//! RTX files are XML documents carrying zlib-compressed, base64-encoded
//! payloads. This crate parses the outer document into an owned element
//! tree and expands embedded payloads on demand.
//!

pub mod container;
mod error;
pub mod tree;

pub use container::{compress, decompress, extract_data, RtxFile};
pub use error::{Error, Result};
pub use tree::{parse_tree, Element};

//! microspec-emsa: EMSA/MAS spectral text files.
//!
//! The format is line oriented: `#KEYWORD -unit: value` header lines, a data
//! section between `#SPECTRUM` and `#ENDOFDATA`, and an optional trailing
//! `#CHECKSUM` holding the byte sum of every other line.
//!
//! # Key Components
//!
//! - [`Emsa`] - Header plus x/y data, buildable from a cube [`Spectrum`](microspec_core::Spectrum)
//! - [`read`] / [`read_file`] - Parse and verify a file
//! - [`write`] / [`write_file`] - Render a file with its checksum

mod document;
mod error;
pub mod header;
mod reader;
mod writer;

pub use document::{Emsa, FORMAT_NAME, FORMAT_VERSION};
pub use error::{Error, Result};
pub use header::{DataType, Header, HeaderEntry, REQUIRED_KEYWORDS};
pub use reader::{read, read_file};
pub use writer::{write, write_file};

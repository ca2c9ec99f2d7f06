//! microspec-core: Core types for microanalysis file readers.
//!
//! This crate provides the sidecar descriptor parser, the element layout
//! resolver and the value types (spectra, pixel coordinates, cube
//! dimensions) shared by the format-specific readers.
//!

pub mod descriptor;
pub mod error;
pub mod layout;
pub mod spectrum;

pub use descriptor::{ByteOrder, DataType, Dialect, LayoutDescriptor, StorageOrder};
pub use error::{Error, Result};
pub use layout::{
    resolve, resolve_with, DontCareByteOrder, ElementFormat, Endianness, SampleKind, Signedness,
};
pub use spectrum::{CubeDims, PixelCoord, Spectrum};

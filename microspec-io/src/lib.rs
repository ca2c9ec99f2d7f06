//! microspec-io: Memory-mapped hyperspectral map readers.
//!
//! This crate opens raw `.raw` payloads described by `.rpl` sidecar files
//! and answers spectrum and image queries directly from a memmap2 mapping,
//! decoding only the samples each query touches.
//!

pub mod config;
pub mod cube;
mod error;
mod reader;
pub mod storage;

pub use config::MapConfig;
pub use cube::{DataCube, HyperspectralCube};
pub use error::{Error, Result};
pub use reader::MappedFileReader;
pub use storage::{layout_for, ImageLayout, Payload, RowTile, SampleLayout, VectorLayout};

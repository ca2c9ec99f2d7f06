//! microspec-vericold: VeriCold Polaris event and trace file readers.
//!
//! Both formats are packed little-endian C structs. Each struct is described
//! once by a static [`RecordLayout`] whose declared size is checked against
//! its fields before any file is read.
//!
//! # Key Components
//!
//! - [`RecordLayout`] / [`PackedRecord`] - Generic packed struct decoding
//! - [`PolarisFile`] - Genesis Polaris event files and their energy histogram
//! - [`TraceFile`] - Microcalorimeter pulse traces, baselines and pulses

mod error;
pub mod polaris;
pub mod record;
mod region;
pub mod trace;

pub use error::{Error, Result};
pub use polaris::{CspEvent, EnergySpectrum, PolarisFile, PolarisHeader, POLARIS_HEADER};
pub use record::{FieldKind, FieldSpec, PackedRecord, RecordLayout, Value};
pub use trace::{
    compute_baseline, LocalTime, Pulse, Trace, TraceFile, TraceFileHeader, TraceHeader,
    DEFAULT_PULSE_GAIN, TRACE_FILE_HEADER, TRACE_HEADER,
};

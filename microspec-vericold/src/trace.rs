//! Microcalorimeter trace files (`.trc`).
//!
//! A 1180-byte file header is followed by fixed-size trace records: a
//! 148-byte trace header and 1024 signed 16-bit samples. Traces are numbered
//! from 1.

use crate::record::{FieldKind, FieldSpec, PackedRecord, RecordLayout};
use crate::region::read_region;
use crate::{Error, Result};
use log::{debug, info};
use std::fs::File;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Size of the trace file header in bytes.
pub const TRACE_FILE_HEADER_SIZE: usize = 1180;

/// Size of the per-trace header in bytes.
pub const TRACE_HEADER_SIZE: usize = 148;

/// Samples stored per trace.
pub const TRACE_SAMPLES: usize = 1024;

/// Size of one trace record (header plus samples) in bytes.
pub const TRACE_RECORD_SIZE: usize = TRACE_HEADER_SIZE + TRACE_SAMPLES * 2;

/// Samples before this time (ms) form the pre-pulse baseline.
pub const BASELINE_CUTOFF_MS: f64 = 0.2;

/// Default scale applied to baseline-subtracted samples.
pub const DEFAULT_PULSE_GAIN: f64 = 1.0 / 5.0e3;

const TRACE_FILE_HEADER_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("size", FieldKind::I32),
    FieldSpec::new("version", FieldKind::I32),
    FieldSpec::new("detector_number", FieldKind::Bytes(260)),
    FieldSpec::new("squid_number", FieldKind::Bytes(260)),
    FieldSpec::new("electronics_number", FieldKind::Bytes(260)),
    FieldSpec::new("polaris_number", FieldKind::Bytes(260)),
    FieldSpec::new("system_time", FieldKind::I32),
    FieldSpec::new("system_time_millis", FieldKind::U16),
    FieldSpec::new("timezone", FieldKind::I16),
    FieldSpec::new("dst_flag", FieldKind::I16),
    FieldSpec::new("pad0", FieldKind::Pad(2)),
    FieldSpec::new("tm_sec", FieldKind::I32),
    FieldSpec::new("tm_min", FieldKind::I32),
    FieldSpec::new("tm_hour", FieldKind::I32),
    FieldSpec::new("tm_mday", FieldKind::I32),
    FieldSpec::new("tm_mon", FieldKind::I32),
    FieldSpec::new("tm_year", FieldKind::I32),
    FieldSpec::new("tm_wday", FieldKind::I32),
    FieldSpec::new("tm_yday", FieldKind::I32),
    FieldSpec::new("tm_isdst", FieldKind::I32),
    FieldSpec::new("clock_time_ms", FieldKind::I32),
    FieldSpec::new("live_time_ms", FieldKind::I32),
    FieldSpec::new("dead_time_ms", FieldKind::I32),
    FieldSpec::new("trace_length", FieldKind::I32),
    FieldSpec::new("pad1", FieldKind::Pad(4)),
    FieldSpec::new("sample_rate", FieldKind::F64),
    FieldSpec::new("reg_temperature", FieldKind::F64),
    FieldSpec::new("i_bias", FieldKind::F64),
    FieldSpec::new("amp_factor", FieldKind::F64),
    FieldSpec::new("acc_voltage", FieldKind::F64),
    FieldSpec::new("aperture", FieldKind::F64),
    FieldSpec::new("working_distance", FieldKind::F64),
    FieldSpec::new("pixel_size", FieldKind::F64),
];

/// Packed layout of the trace file header.
pub const TRACE_FILE_HEADER: RecordLayout = RecordLayout {
    name: "trace file header",
    size: TRACE_FILE_HEADER_SIZE,
    fields: TRACE_FILE_HEADER_FIELDS,
};

const TRACE_HEADER_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("size_in_bytes", FieldKind::I32),
    FieldSpec::new("number", FieldKind::I32),
    FieldSpec::new("type", FieldKind::I32),
    FieldSpec::new("trig_buf_pos", FieldKind::I32),
    FieldSpec::new("time", FieldKind::I64),
    FieldSpec::new("temperature", FieldKind::F64),
    FieldSpec::new("pre_pulse_level", FieldKind::F64),
    FieldSpec::new("post_pulse_level", FieldKind::F64),
    FieldSpec::new("max_position", FieldKind::I32),
    FieldSpec::new("max", FieldKind::F64),
    FieldSpec::new("min_position", FieldKind::I32),
    FieldSpec::new("min", FieldKind::F64),
    FieldSpec::new("pulse_height", FieldKind::F64),
    FieldSpec::new("sample_rate", FieldKind::F64),
    FieldSpec::new("length", FieldKind::I32),
    FieldSpec::new("pre_trigger", FieldKind::I32),
    FieldSpec::new("trigger_level", FieldKind::F64),
    FieldSpec::new("baseline_length", FieldKind::I32),
    FieldSpec::new("baseline_start", FieldKind::I32),
    FieldSpec::new("post_baseline_level", FieldKind::F64),
    FieldSpec::new("post_baseline_start", FieldKind::I32),
    FieldSpec::new("post_baseline_length", FieldKind::I32),
    FieldSpec::new("x_pos", FieldKind::F64),
    FieldSpec::new("y_pos", FieldKind::F64),
    FieldSpec::new("pad", FieldKind::Pad(4)),
];

/// Packed layout of the per-trace header.
pub const TRACE_HEADER: RecordLayout = RecordLayout {
    name: "trace header",
    size: TRACE_HEADER_SIZE,
    fields: TRACE_HEADER_FIELDS,
};

/// Broken-down local time (C `struct tm`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocalTime {
    pub sec: i32,
    pub min: i32,
    pub hour: i32,
    pub mday: i32,
    /// Months since January.
    pub mon: i32,
    /// Years since 1900.
    pub year: i32,
    pub wday: i32,
    pub yday: i32,
    pub isdst: i32,
}

/// Decoded trace file header.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceFileHeader {
    pub size: i32,
    pub version: i32,
    pub detector_number: String,
    pub squid_number: String,
    pub electronics_number: String,
    pub polaris_number: String,
    /// Seconds since the epoch.
    pub system_time: i32,
    pub system_time_millis: u16,
    /// Minutes west of UTC.
    pub timezone: i16,
    pub dst_flag: i16,
    pub local_time: LocalTime,
    pub clock_time_ms: i32,
    pub live_time_ms: i32,
    pub dead_time_ms: i32,
    pub trace_length: i32,
    pub sample_rate: f64,
    pub reg_temperature: f64,
    pub i_bias: f64,
    pub amp_factor: f64,
    pub acc_voltage: f64,
    pub aperture: f64,
    pub working_distance: f64,
    pub pixel_size: f64,
}

impl TraceFileHeader {
    /// Builds the typed header from a decoded record.
    ///
    /// # Errors
    /// Returns [`Error::MalformedHeader`] if a field is missing.
    pub fn from_record(record: &PackedRecord) -> Result<Self> {
        Ok(Self {
            size: record.int("size")?,
            version: record.int("version")?,
            detector_number: record.text("detector_number")?,
            squid_number: record.text("squid_number")?,
            electronics_number: record.text("electronics_number")?,
            polaris_number: record.text("polaris_number")?,
            system_time: record.int("system_time")?,
            system_time_millis: record.int("system_time_millis")?,
            timezone: record.int("timezone")?,
            dst_flag: record.int("dst_flag")?,
            local_time: LocalTime {
                sec: record.int("tm_sec")?,
                min: record.int("tm_min")?,
                hour: record.int("tm_hour")?,
                mday: record.int("tm_mday")?,
                mon: record.int("tm_mon")?,
                year: record.int("tm_year")?,
                wday: record.int("tm_wday")?,
                yday: record.int("tm_yday")?,
                isdst: record.int("tm_isdst")?,
            },
            clock_time_ms: record.int("clock_time_ms")?,
            live_time_ms: record.int("live_time_ms")?,
            dead_time_ms: record.int("dead_time_ms")?,
            trace_length: record.int("trace_length")?,
            sample_rate: record.float("sample_rate")?,
            reg_temperature: record.float("reg_temperature")?,
            i_bias: record.float("i_bias")?,
            amp_factor: record.float("amp_factor")?,
            acc_voltage: record.float("acc_voltage")?,
            aperture: record.float("aperture")?,
            working_distance: record.float("working_distance")?,
            pixel_size: record.float("pixel_size")?,
        })
    }
}

/// Decoded per-trace header.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceHeader {
    pub size_in_bytes: i32,
    /// Trace counter.
    pub number: i32,
    /// Nonzero for artificial pulses.
    pub kind: i32,
    pub trig_buf_pos: i32,
    /// Milliseconds since the start of acquisition.
    pub time: i64,
    pub temperature: f64,
    pub pre_pulse_level: f64,
    pub post_pulse_level: f64,
    pub max_position: i32,
    pub max: f64,
    pub min_position: i32,
    pub min: f64,
    pub pulse_height: f64,
    /// Samples per second.
    pub sample_rate: f64,
    pub length: i32,
    pub pre_trigger: i32,
    pub trigger_level: f64,
    pub baseline_length: i32,
    pub baseline_start: i32,
    pub post_baseline_level: f64,
    pub post_baseline_start: i32,
    pub post_baseline_length: i32,
    pub x_pos: f64,
    pub y_pos: f64,
}

impl TraceHeader {
    /// Builds the typed header from a decoded record.
    ///
    /// # Errors
    /// Returns [`Error::MalformedHeader`] if a field is missing.
    pub fn from_record(record: &PackedRecord) -> Result<Self> {
        Ok(Self {
            size_in_bytes: record.int("size_in_bytes")?,
            number: record.int("number")?,
            kind: record.int("type")?,
            trig_buf_pos: record.int("trig_buf_pos")?,
            time: record.int("time")?,
            temperature: record.float("temperature")?,
            pre_pulse_level: record.float("pre_pulse_level")?,
            post_pulse_level: record.float("post_pulse_level")?,
            max_position: record.int("max_position")?,
            max: record.float("max")?,
            min_position: record.int("min_position")?,
            min: record.float("min")?,
            pulse_height: record.float("pulse_height")?,
            sample_rate: record.float("sample_rate")?,
            length: record.int("length")?,
            pre_trigger: record.int("pre_trigger")?,
            trigger_level: record.float("trigger_level")?,
            baseline_length: record.int("baseline_length")?,
            baseline_start: record.int("baseline_start")?,
            post_baseline_level: record.float("post_baseline_level")?,
            post_baseline_start: record.int("post_baseline_start")?,
            post_baseline_length: record.int("post_baseline_length")?,
            x_pos: record.float("x_pos")?,
            y_pos: record.float("y_pos")?,
        })
    }
}

/// One trace: header, sample times and samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub header: TraceHeader,
    /// `times_ms[i] = i * 1000 / sample_rate`.
    pub times_ms: Vec<f64>,
    pub samples: Vec<f64>,
}

/// A baseline-subtracted, scaled trace.
#[derive(Debug, Clone, PartialEq)]
pub struct Pulse {
    pub times_ms: Vec<f64>,
    pub values: Vec<f64>,
    /// Baseline that was subtracted, in raw sample units.
    pub baseline: f64,
}

/// A trace file opened for random access by trace id.
#[derive(Debug, Clone)]
pub struct TraceFile {
    path: PathBuf,
    file_size: u64,
}

impl TraceFile {
    /// Opens a trace file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or a record layout is
    /// inconsistent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        TRACE_FILE_HEADER.check()?;
        TRACE_HEADER.check()?;
        let path = path.as_ref();
        let file_size = File::open(path)?.metadata()?.len();
        let reader = Self {
            path: path.to_path_buf(),
            file_size,
        };
        info!(
            "Opened trace file {}: {} bytes, {} traces",
            path.display(),
            file_size,
            reader.trace_count()
        );
        Ok(reader)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of complete trace records in the file.
    #[must_use]
    pub fn trace_count(&self) -> usize {
        let body = self.file_size.saturating_sub(TRACE_FILE_HEADER_SIZE as u64);
        usize::try_from(body / TRACE_RECORD_SIZE as u64).unwrap_or(usize::MAX)
    }

    /// Decodes the file header into its packed record.
    ///
    /// # Errors
    /// Returns [`Error::MalformedHeader`] if the file is shorter than the
    /// header.
    pub fn read_header_record(&self) -> Result<PackedRecord> {
        if self.file_size < TRACE_FILE_HEADER_SIZE as u64 {
            return Err(Error::MalformedHeader(format!(
                "file has {} bytes, header needs {TRACE_FILE_HEADER_SIZE}",
                self.file_size
            )));
        }
        let mut file = File::open(&self.path)?;
        let bytes = read_region(&mut file, self.file_size, 0, TRACE_FILE_HEADER_SIZE)?;
        TRACE_FILE_HEADER.decode(&bytes)
    }

    /// Reads the file header.
    ///
    /// # Errors
    /// See [`TraceFile::read_header_record`].
    pub fn read_header(&self) -> Result<TraceFileHeader> {
        TraceFileHeader::from_record(&self.read_header_record()?)
    }

    /// Reads trace `trace_id` (1-based).
    ///
    /// # Errors
    /// Returns [`Error::MalformedTrace`] for id 0, an id past the last
    /// record, or a non-positive sample rate.
    pub fn read_trace(&self, trace_id: usize) -> Result<Trace> {
        if trace_id == 0 {
            return Err(Error::MalformedTrace("trace ids start at 1".into()));
        }
        let count = self.trace_count();
        if trace_id > count {
            return Err(Error::MalformedTrace(format!(
                "trace {trace_id} past end of file ({count} traces)"
            )));
        }

        let offset = TRACE_FILE_HEADER_SIZE + (trace_id - 1) * TRACE_RECORD_SIZE;
        debug!("Reading trace {trace_id} at offset {offset}");
        let mut file = File::open(&self.path)?;
        let bytes = read_region(&mut file, self.file_size, offset as u64, TRACE_RECORD_SIZE)?;

        let record = TRACE_HEADER.decode(&bytes[..TRACE_HEADER_SIZE])?;
        let header = TraceHeader::from_record(&record)?;
        let rate = header.sample_rate;
        if !(rate > 0.0 && rate.is_finite()) {
            return Err(Error::MalformedTrace(format!(
                "trace {trace_id} has sample rate {rate}"
            )));
        }

        let samples: Vec<f64> = bytes[TRACE_HEADER_SIZE..]
            .chunks_exact(2)
            .map(|c| f64::from(i16::from_le_bytes([c[0], c[1]])))
            .collect();
        let times_ms = sample_times_ms(samples.len(), rate);

        Ok(Trace {
            header,
            times_ms,
            samples,
        })
    }

    /// Reads a trace, subtracts its baseline and scales it by `gain`.
    ///
    /// # Errors
    /// See [`TraceFile::read_trace`] and [`compute_baseline`].
    pub fn pulse(&self, trace_id: usize, gain: f64) -> Result<Pulse> {
        let trace = self.read_trace(trace_id)?;
        let baseline = compute_baseline(&trace.times_ms, &trace.samples)?;
        let values = trace
            .samples
            .iter()
            .map(|sample| (sample - baseline) * gain)
            .collect();
        Ok(Pulse {
            times_ms: trace.times_ms,
            values,
            baseline,
        })
    }
}

#[allow(clippy::cast_precision_loss)]
fn sample_times_ms(count: usize, sample_rate: f64) -> Vec<f64> {
    (0..count).map(|i| i as f64 * 1.0e3 / sample_rate).collect()
}

/// Mean of the samples recorded before [`BASELINE_CUTOFF_MS`].
///
/// # Errors
/// Returns [`Error::MalformedTrace`] if no sample precedes the cutoff.
#[allow(clippy::cast_precision_loss)]
pub fn compute_baseline(times_ms: &[f64], samples: &[f64]) -> Result<f64> {
    let before: Vec<f64> = times_ms
        .iter()
        .zip(samples)
        .take_while(|(time, _)| **time < BASELINE_CUTOFF_MS)
        .map(|(_, sample)| *sample)
        .collect();
    if before.is_empty() {
        return Err(Error::MalformedTrace(format!(
            "no samples before {BASELINE_CUTOFF_MS} ms"
        )));
    }
    Ok(before.iter().sum::<f64>() / before.len() as f64)
}

//! Genesis Polaris event files (`.csp`, `.pls`, `.psd`).
//!
//! A 3072-byte header is followed by a per-pixel dwell-time table and a list
//! of detected events, each an `(f32 energy in eV, u32 time)` pair. The
//! spectrum is rebuilt by histogramming the event energies.

use crate::record::{FieldKind, FieldSpec, PackedRecord, RecordLayout};
use crate::region::read_region;
use crate::{Error, Result};
use log::{debug, info};
use std::fs::File;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Size of the Polaris file header in bytes.
pub const POLARIS_HEADER_SIZE: usize = 3072;

/// Size of one event record in bytes.
pub const EVENT_SIZE: usize = 8;

const POLARIS_HEADER_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("tag", FieldKind::Bytes(16)),
    FieldSpec::new("version", FieldKind::I32),
    FieldSpec::new("number_points", FieldKind::I32),
    FieldSpec::new("number_lines", FieldKind::I32),
    FieldSpec::new("pix_offset", FieldKind::U32),
    FieldSpec::new("pix_size", FieldKind::U32),
    FieldSpec::new("data_offset", FieldKind::U32),
    FieldSpec::new("data_size", FieldKind::U32),
    FieldSpec::new("dwell", FieldKind::F32),
    FieldSpec::new("date", FieldKind::Bytes(8)),
    FieldSpec::new("analyzer_type", FieldKind::I32),
    FieldSpec::new("analysis_mode", FieldKind::I32),
    FieldSpec::new("preset", FieldKind::F32),
    FieldSpec::new("live_time", FieldKind::F32),
    FieldSpec::new("tilt", FieldKind::F32),
    FieldSpec::new("takeoff", FieldKind::F32),
    FieldSpec::new("xray_incidence", FieldKind::F32),
    FieldSpec::new("azimuth", FieldKind::F32),
    FieldSpec::new("elevation", FieldKind::F32),
    FieldSpec::new("beam_current", FieldKind::F32),
    FieldSpec::new("kv", FieldKind::F32),
    FieldSpec::new("start_ev", FieldKind::F32),
    FieldSpec::new("end_ev", FieldKind::F32),
    FieldSpec::new("fullscale", FieldKind::F32),
    FieldSpec::new("n_peaks", FieldKind::I32),
    FieldSpec::new("peaks", FieldKind::Bytes(384)),
    FieldSpec::new("n_remarks", FieldKind::I32),
    FieldSpec::new("remarks", FieldKind::Bytes(400)),
    FieldSpec::new("x", FieldKind::F32Array(4)),
    FieldSpec::new("n_det_res", FieldKind::I32),
    FieldSpec::new("det_res", FieldKind::F32Array(12)),
    FieldSpec::new("n_start_x", FieldKind::I32Array(4)),
    FieldSpec::new("filler", FieldKind::Pad(1708)),
    FieldSpec::new("mat_label", FieldKind::Bytes(40)),
    FieldSpec::new("label", FieldKind::Bytes(216)),
    FieldSpec::new("img_filename", FieldKind::Bytes(120)),
];

/// Packed layout of the Polaris header.
pub const POLARIS_HEADER: RecordLayout = RecordLayout {
    name: "polaris header",
    size: POLARIS_HEADER_SIZE,
    fields: POLARIS_HEADER_FIELDS,
};

/// Decoded Polaris header.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolarisHeader {
    pub tag: String,
    pub version: i32,
    pub number_points: i32,
    pub number_lines: i32,
    /// Byte offset of the pixel time table.
    pub pix_offset: u32,
    pub pix_size: u32,
    /// Byte offset of the event list.
    pub data_offset: u32,
    /// Number of events.
    pub data_size: u32,
    pub dwell: f64,
    pub date: String,
    pub analyzer_type: i32,
    pub analysis_mode: i32,
    pub preset: f64,
    pub live_time: f64,
    pub tilt: f64,
    pub takeoff: f64,
    pub xray_incidence: f64,
    pub azimuth: f64,
    pub elevation: f64,
    pub beam_current: f64,
    pub kv: f64,
    pub start_ev: f64,
    pub end_ev: f64,
    pub fullscale: f64,
    pub n_peaks: i32,
    pub n_remarks: i32,
    pub detector_resolution: Vec<f64>,
    pub material_label: String,
    pub label: String,
    pub image_filename: String,
}

impl PolarisHeader {
    /// Builds the typed header from a decoded record.
    ///
    /// # Errors
    /// Returns [`Error::MalformedHeader`] if a field is missing.
    pub fn from_record(record: &PackedRecord) -> Result<Self> {
        Ok(Self {
            tag: record.text("tag")?,
            version: record.int("version")?,
            number_points: record.int("number_points")?,
            number_lines: record.int("number_lines")?,
            pix_offset: record.int("pix_offset")?,
            pix_size: record.int("pix_size")?,
            data_offset: record.int("data_offset")?,
            data_size: record.int("data_size")?,
            dwell: record.float("dwell")?,
            date: record.text("date")?,
            analyzer_type: record.int("analyzer_type")?,
            analysis_mode: record.int("analysis_mode")?,
            preset: record.float("preset")?,
            live_time: record.float("live_time")?,
            tilt: record.float("tilt")?,
            takeoff: record.float("takeoff")?,
            xray_incidence: record.float("xray_incidence")?,
            azimuth: record.float("azimuth")?,
            elevation: record.float("elevation")?,
            beam_current: record.float("beam_current")?,
            kv: record.float("kv")?,
            start_ev: record.float("start_ev")?,
            end_ev: record.float("end_ev")?,
            fullscale: record.float("fullscale")?,
            n_peaks: record.int("n_peaks")?,
            n_remarks: record.int("n_remarks")?,
            detector_resolution: record.float_array("det_res")?.to_vec(),
            material_label: record.text("mat_label")?,
            label: record.text("label")?,
            image_filename: record.text("img_filename")?,
        })
    }

    /// Number of pixels in the pixel time table.
    ///
    /// # Errors
    /// Returns [`Error::MalformedHeader`] for negative dimensions.
    pub fn pixel_count(&self) -> Result<usize> {
        let points = usize::try_from(self.number_points);
        let lines = usize::try_from(self.number_lines);
        match (points, lines) {
            (Ok(points), Ok(lines)) => points.checked_mul(lines).ok_or_else(|| {
                Error::MalformedHeader(format!("{points}x{lines} pixels overflow"))
            }),
            _ => Err(Error::MalformedHeader(format!(
                "negative scan size {}x{}",
                self.number_points, self.number_lines
            ))),
        }
    }
}

/// One detected event.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CspEvent {
    pub energy_ev: f32,
    pub time: u32,
}

/// Energy histogram of the events.
///
/// `energies_ev[i]` is the lower edge of bin `i`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnergySpectrum {
    pub energies_ev: Vec<f64>,
    pub counts: Vec<u64>,
}

impl EnergySpectrum {
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of events that fell inside the histogram range.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// A fully read Polaris file.
#[derive(Debug, Clone)]
pub struct PolarisFile {
    path: PathBuf,
    file_size: u64,
    record: PackedRecord,
    header: PolarisHeader,
    pixel_times: Vec<u32>,
    events: Vec<CspEvent>,
}

impl PolarisFile {
    /// Reads the header, pixel time table and event list.
    ///
    /// # Errors
    /// Returns [`Error::MalformedHeader`] for a short or inconsistent header
    /// and a truncation error if a data region extends past the file end.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        POLARIS_HEADER.check()?;
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        let record = read_header_record(&mut file, file_size)?;
        let header = PolarisHeader::from_record(&record)?;
        debug!(
            "Polaris header: version {}, pixel table at {}, {} events at {}",
            header.version, header.pix_offset, header.data_size, header.data_offset
        );

        let pixel_count = header.pixel_count()?;
        let bytes = read_region(
            &mut file,
            file_size,
            u64::from(header.pix_offset),
            table_len(pixel_count, 4)?,
        )?;
        let pixel_times = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        let event_count = usize::try_from(header.data_size)
            .map_err(|_| Error::MalformedHeader(format!("{} events", header.data_size)))?;
        let bytes = read_region(
            &mut file,
            file_size,
            u64::from(header.data_offset),
            table_len(event_count, EVENT_SIZE)?,
        )?;
        let events = bytes
            .chunks_exact(EVENT_SIZE)
            .map(|c| CspEvent {
                energy_ev: f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                time: u32::from_le_bytes([c[4], c[5], c[6], c[7]]),
            })
            .collect();

        info!(
            "Opened Polaris file {}: {pixel_count} pixels, {event_count} events",
            path.display()
        );

        Ok(Self {
            path: path.to_path_buf(),
            file_size,
            record,
            header,
            pixel_times,
            events,
        })
    }

    /// Reads only the header of a Polaris file.
    ///
    /// # Errors
    /// Returns [`Error::MalformedHeader`] if the file is shorter than the
    /// header.
    pub fn read_header<P: AsRef<Path>>(path: P) -> Result<PolarisHeader> {
        POLARIS_HEADER.check()?;
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let record = read_header_record(&mut file, file_size)?;
        PolarisHeader::from_record(&record)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    #[must_use]
    pub fn header(&self) -> &PolarisHeader {
        &self.header
    }

    /// Every header field, for generic dumps.
    #[must_use]
    pub fn header_record(&self) -> &PackedRecord {
        &self.record
    }

    #[must_use]
    pub fn pixel_times(&self) -> &[u32] {
        &self.pixel_times
    }

    #[must_use]
    pub fn events(&self) -> &[CspEvent] {
        &self.events
    }

    /// Histogram of event energies with bins `channel_width_ev` wide.
    ///
    /// The range defaults to the header's start and end energies. Bin edges
    /// are `start, start + w, ...` up to the first edge at or past `end + w`
    /// (exclusive); each bin is half-open except the last, which also
    /// counts events exactly on its upper edge.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] for a non-positive or non-finite
    /// width, non-finite limits, or a range that yields fewer than two edges.
    pub fn spectrum(
        &self,
        channel_width_ev: f64,
        limits: Option<(f64, f64)>,
    ) -> Result<EnergySpectrum> {
        let (start, end) = limits.unwrap_or((self.header.start_ev, self.header.end_ev));
        let mut edges = energy_edges(start, end, channel_width_ev)?;
        let counts = histogram(self.events.iter().map(|e| f64::from(e.energy_ev)), &edges);
        edges.pop();
        Ok(EnergySpectrum {
            energies_ev: edges,
            counts,
        })
    }
}

fn read_header_record(file: &mut File, file_size: u64) -> Result<PackedRecord> {
    if file_size < POLARIS_HEADER_SIZE as u64 {
        return Err(Error::MalformedHeader(format!(
            "file has {file_size} bytes, header needs {POLARIS_HEADER_SIZE}"
        )));
    }
    let bytes = read_region(file, file_size, 0, POLARIS_HEADER_SIZE)?;
    POLARIS_HEADER.decode(&bytes)
}

fn table_len(count: usize, item_size: usize) -> Result<usize> {
    count
        .checked_mul(item_size)
        .ok_or_else(|| Error::MalformedHeader(format!("table of {count} entries overflows")))
}

/// Bin edges `start + i * width` for `i` in `0..ceil((end + width - start) / width)`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn energy_edges(start: f64, end: f64, width: f64) -> Result<Vec<f64>> {
    if !(width > 0.0 && width.is_finite()) {
        return Err(Error::InvalidArgument(format!(
            "channel width must be positive, got {width}"
        )));
    }
    if !(start.is_finite() && end.is_finite()) {
        return Err(Error::InvalidArgument(format!(
            "energy limits must be finite, got ({start}, {end})"
        )));
    }

    let count = ((end + width - start) / width).ceil();
    if !(count >= 2.0) {
        return Err(Error::InvalidArgument(format!(
            "range ({start}, {end}) with width {width} has fewer than two bin edges"
        )));
    }
    Ok((0..count as usize).map(|i| start + i as f64 * width).collect())
}

/// Counts values per bin. Bins are half-open except the last one; NaN and
/// out-of-range values are dropped.
fn histogram(values: impl Iterator<Item = f64>, edges: &[f64]) -> Vec<u64> {
    let bins = edges.len() - 1;
    let mut counts = vec![0u64; bins];
    let (first, last) = (edges[0], edges[bins]);

    for value in values {
        if value.is_nan() || value < first || value > last {
            continue;
        }
        let bin = if value >= last {
            bins - 1
        } else {
            edges.partition_point(|edge| *edge <= value) - 1
        };
        counts[bin] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout_size() {
        assert!(POLARIS_HEADER.check().is_ok());
        assert_eq!(POLARIS_HEADER.offset_of("version"), Some(16));
        assert_eq!(POLARIS_HEADER.offset_of("pix_offset"), Some(28));
        assert_eq!(POLARIS_HEADER.offset_of("data_size"), Some(40));
        assert_eq!(POLARIS_HEADER.offset_of("start_ev"), Some(100));
        assert_eq!(POLARIS_HEADER.offset_of("n_peaks"), Some(112));
        assert_eq!(POLARIS_HEADER.offset_of("mat_label"), Some(2696));
        assert_eq!(POLARIS_HEADER.offset_of("img_filename"), Some(2952));
    }

    #[test]
    fn test_energy_edges_match_arange() {
        let edges = energy_edges(10.0, 1000.0, 5.0).unwrap();
        assert_eq!(edges.len(), 199);
        assert!((edges[198] - 1000.0).abs() < 1e-9);

        let edges = energy_edges(0.0, 20000.0, 1.0).unwrap();
        assert_eq!(edges.len(), 20001);

        // Non-integral steps round the count up.
        let edges = energy_edges(0.0, 1.0, 0.3).unwrap();
        assert_eq!(edges.len(), 5);
    }

    #[test]
    fn test_energy_edges_rejects_bad_arguments() {
        for (start, end, width) in [
            (0.0, 10.0, 0.0),
            (0.0, 10.0, -1.0),
            (0.0, 10.0, f64::NAN),
            (f64::INFINITY, 10.0, 1.0),
            (100.0, 10.0, 1.0),
        ] {
            assert!(
                matches!(energy_edges(start, end, width), Err(Error::InvalidArgument(_))),
                "({start}, {end}, {width})"
            );
        }
    }

    #[test]
    fn test_histogram_semantics() {
        let edges = [0.0, 1.0, 2.0, 3.0];
        let values = [0.0, 0.5, 1.0, 2.999, 3.0, 3.5, -0.1, f64::NAN];
        let counts = histogram(values.into_iter(), &edges);
        // Last bin is closed on the right.
        assert_eq!(counts, vec![2, 1, 2]);
    }
}

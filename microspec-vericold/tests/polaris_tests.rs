#![allow(clippy::cast_possible_truncation, clippy::unreadable_literal)]
use microspec_vericold::polaris::{EVENT_SIZE, POLARIS_HEADER_SIZE};
use microspec_vericold::{Error, PolarisFile, POLARIS_HEADER};
use std::io::Write;
use tempfile::NamedTempFile;

fn put(bytes: &mut [u8], field: &str, value: &[u8]) {
    let offset = POLARIS_HEADER.offset_of(field).unwrap();
    bytes[offset..offset + value.len()].copy_from_slice(value);
}

struct Fixture {
    points: i32,
    lines: i32,
    start_ev: f32,
    end_ev: f32,
    pixel_times: Vec<u32>,
    energies: Vec<f32>,
    data_size_override: Option<u32>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            points: 1,
            lines: 1,
            start_ev: 0.0,
            end_ev: 20000.0,
            pixel_times: vec![1000],
            energies: vec![10.0, 10.0, 14.9, 15.0, 1000.0, 1004.9, 9.9, 525.0],
            data_size_override: None,
        }
    }
}

impl Fixture {
    fn write(&self) -> NamedTempFile {
        let pix_offset = POLARIS_HEADER_SIZE as u32;
        let data_offset = pix_offset + 4 * self.pixel_times.len() as u32;
        let data_size = self
            .data_size_override
            .unwrap_or(self.energies.len() as u32);

        let mut header = vec![0u8; POLARIS_HEADER_SIZE];
        put(&mut header, "tag", b"POLARIS");
        put(&mut header, "version", &1001i32.to_le_bytes());
        put(&mut header, "number_points", &self.points.to_le_bytes());
        put(&mut header, "number_lines", &self.lines.to_le_bytes());
        put(&mut header, "pix_offset", &pix_offset.to_le_bytes());
        put(&mut header, "data_offset", &data_offset.to_le_bytes());
        put(&mut header, "data_size", &data_size.to_le_bytes());
        put(&mut header, "dwell", &0.5f32.to_le_bytes());
        put(&mut header, "kv", &30.0f32.to_le_bytes());
        put(&mut header, "start_ev", &self.start_ev.to_le_bytes());
        put(&mut header, "end_ev", &self.end_ev.to_le_bytes());
        put(&mut header, "mat_label", b"OFe");

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&header).unwrap();
        for t in &self.pixel_times {
            file.write_all(&t.to_le_bytes()).unwrap();
        }
        for (i, e) in self.energies.iter().enumerate() {
            file.write_all(&e.to_le_bytes()).unwrap();
            file.write_all(&(i as u32).to_le_bytes()).unwrap();
        }
        file.flush().unwrap();
        file
    }
}

#[test]
fn test_read_header_fields() {
    let file = Fixture::default().write();
    let header = PolarisFile::read_header(file.path()).unwrap();
    assert_eq!(header.tag, "POLARIS");
    assert_eq!(header.version, 1001);
    assert_eq!(header.pix_offset, 3072);
    assert_eq!(header.pix_size, 0);
    assert_eq!(header.data_offset, 3076);
    assert_eq!(header.data_size, 8);
    assert!((header.kv - 30.0).abs() < f64::EPSILON);
    assert_eq!(header.material_label, "OFe");
    assert_eq!(header.detector_resolution.len(), 12);
}

#[test]
fn test_open_reads_tables() {
    let file = Fixture::default().write();
    let polaris = PolarisFile::open(file.path()).unwrap();
    assert_eq!(polaris.pixel_times(), &[1000]);
    assert_eq!(polaris.events().len(), 8);
    assert_eq!(polaris.events()[7].time, 7);
    assert!((polaris.events()[7].energy_ev - 525.0).abs() < f32::EPSILON);
    assert_eq!(polaris.file_size(), (POLARIS_HEADER_SIZE + 4 + 8 * EVENT_SIZE) as u64);
    assert!(polaris.header_record().get("version").is_some());
}

#[test]
fn test_default_spectrum_spans_header_range() {
    let file = Fixture::default().write();
    let polaris = PolarisFile::open(file.path()).unwrap();
    let spectrum = polaris.spectrum(1.0, None).unwrap();
    assert_eq!(spectrum.energies_ev.len(), 20000);
    assert_eq!(spectrum.counts.len(), 20000);
    assert_eq!(spectrum.total(), 8);
    assert_eq!(spectrum.counts[10], 2);
}

#[test]
fn test_spectrum_with_limits() {
    let file = Fixture::default().write();
    let polaris = PolarisFile::open(file.path()).unwrap();
    let spectrum = polaris.spectrum(5.0, Some((10.0, 1000.0))).unwrap();
    assert_eq!(spectrum.len(), 198);
    assert!((spectrum.energies_ev[0] - 10.0).abs() < 1e-9);
    // 10, 10, 14.9 in the first bin; 15 in the second.
    assert_eq!(spectrum.counts[0], 3);
    assert_eq!(spectrum.counts[1], 1);
    // 1000 sits on the closed upper edge of the last bin.
    assert_eq!(spectrum.counts[197], 1);
    assert_eq!(spectrum.total(), 6);
}

#[test]
fn test_spectrum_rejects_bad_width() {
    let file = Fixture::default().write();
    let polaris = PolarisFile::open(file.path()).unwrap();
    assert!(matches!(
        polaris.spectrum(0.0, None),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        polaris.spectrum(-5.0, Some((0.0, 10.0))),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_short_header_is_malformed() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&[0u8; 100]).unwrap();
    file.flush().unwrap();
    assert!(matches!(
        PolarisFile::read_header(file.path()),
        Err(Error::MalformedHeader(_))
    ));
    assert!(matches!(
        PolarisFile::open(file.path()),
        Err(Error::MalformedHeader(_))
    ));
}

#[test]
fn test_event_list_past_end_is_truncated() {
    let file = Fixture {
        data_size_override: Some(19724),
        ..Fixture::default()
    }
    .write();
    let err = PolarisFile::open(file.path()).unwrap_err();
    assert!(err.is_truncated());
}

#[test]
fn test_negative_scan_size_is_malformed() {
    let file = Fixture {
        points: -1,
        ..Fixture::default()
    }
    .write();
    assert!(matches!(
        PolarisFile::open(file.path()),
        Err(Error::MalformedHeader(_))
    ));
}

#[test]
fn test_spot_file_with_event_array_at_pixel_offset() {
    // No scan pixels: the event array starts right where the empty pixel table would.
    let energies: Vec<f32> = (0..19724u16).map(|i| f32::from(i % 2000) * 10.0 + 5.0).collect();
    let file = Fixture {
        points: 0,
        lines: 0,
        pixel_times: Vec::new(),
        energies,
        ..Fixture::default()
    }
    .write();

    let polaris = PolarisFile::open(file.path()).unwrap();
    let header = polaris.header();
    assert_eq!(header.pix_offset, 3072);
    assert_eq!(header.pix_size, 0);
    assert_eq!(header.data_offset, 3072);
    assert_eq!(header.data_size, 19724);
    assert!(polaris.pixel_times().is_empty());
    assert_eq!(polaris.events().len(), 19724);
    assert_eq!(polaris.events()[19723].time, 19723);
    assert_eq!(
        polaris.file_size(),
        (POLARIS_HEADER_SIZE + 19724 * EVENT_SIZE) as u64
    );

    let spectrum = polaris.spectrum(1.0, None).unwrap();
    assert_eq!(spectrum.total(), 19724);
    // Energy 5 eV comes from i = 0, 2000, ..., 18000.
    assert_eq!(spectrum.counts[5], 10);
}

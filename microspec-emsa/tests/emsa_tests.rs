use approx::assert_relative_eq;
use microspec_core::Spectrum;
use microspec_emsa::{read, read_file, write, write_file, DataType, Emsa, Error};
use tempfile::tempdir;

const Y_FILE: &str = "\
#FORMAT      : EMSA/MAS Spectral Data File
#VERSION     : 1.0
#TITLE       : Fe K line
#DATE        : 01-JAN-2012
#TIME        : 12:00
#OWNER       : lab
#NPOINTS     : 6.
#NCOLUMNS    : 4.
#XUNITS      : eV
#YUNITS      : counts
#DATATYPE    : Y
#XPERCHAN    : 10.0
#OFFSET      : -20.0
#BEAMKV   -kV: 15.0
#SIGNALTYPE  : EDS
#SPECTRUM    : Spectral Data Starts Here
  1.0, 2.0, 3.0, 4.0,
  5.0  6.0
#ENDOFDATA   :
";

fn xy_file() -> String {
    Y_FILE
        .replace("#DATATYPE    : Y", "#DATATYPE    : XY")
        .replace("#NPOINTS     : 6.", "#NPOINTS     : 3")
        .replace(
            "  1.0, 2.0, 3.0, 4.0,\n  5.0  6.0\n",
            "100.0, 1.0\n110.0, 2.0\n125.5, 3.0\n",
        )
}

fn byte_sum(text: &str) -> u64 {
    text.lines().flat_map(str::bytes).map(u64::from).sum()
}

#[test]
fn test_read_y_data() {
    let emsa = read(Y_FILE.as_bytes()).unwrap();

    assert_eq!(emsa.len(), 6);
    assert_eq!(emsa.y_data, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    assert_relative_eq!(emsa.x_data[0], -20.0);
    assert_relative_eq!(emsa.x_data[5], 30.0);
    assert_eq!(emsa.header.get("TITLE"), Some("Fe K line"));
    assert_eq!(emsa.header.get("BEAMKV"), Some("15.0"));
    assert_eq!(emsa.header.unit("BEAMKV"), Some("kV"));
    assert_eq!(emsa.header.data_type().unwrap(), DataType::Y);
    assert!(!emsa.header.contains("SPECTRUM"));
}

#[test]
fn test_read_xy_data() {
    let emsa = read(xy_file().as_bytes()).unwrap();
    assert_eq!(emsa.x_data, vec![100.0, 110.0, 125.5]);
    assert_eq!(emsa.y_data, vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_checksum_verified() {
    let good = format!("{Y_FILE}#CHECKSUM    : {}\n", byte_sum(Y_FILE));
    assert_eq!(read(good.as_bytes()).unwrap().len(), 6);

    let bad = format!("{Y_FILE}#CHECKSUM    : {}\n", byte_sum(Y_FILE) + 1);
    match read(bad.as_bytes()) {
        Err(Error::ChecksumMismatch { declared, computed }) => {
            assert_eq!(declared, computed + 1);
        }
        other => panic!("expected checksum mismatch, got {other:?}"),
    }
}

#[test]
fn test_checksum_ignores_line_endings() {
    let crlf = Y_FILE.replace('\n', "\r\n");
    let text = format!("{crlf}#CHECKSUM    : {}\r\n", byte_sum(Y_FILE));
    assert!(read(text.as_bytes()).is_ok());
}

#[test]
fn test_missing_required_keyword() {
    let text = Y_FILE.replace("#OWNER       : lab\n", "");
    assert!(matches!(
        read(text.as_bytes()),
        Err(Error::MissingKeyword(k)) if k == "OWNER"
    ));
}

#[test]
fn test_point_count_mismatch() {
    let text = Y_FILE.replace("#NPOINTS     : 6.", "#NPOINTS     : 7");
    assert!(matches!(read(text.as_bytes()), Err(Error::InvalidData(_))));
}

#[test]
fn test_bad_data_value() {
    let text = Y_FILE.replace("5.0  6.0", "5.0  six");
    assert!(matches!(read(text.as_bytes()), Err(Error::InvalidData(_))));
}

#[test]
fn test_write_then_read_spectrum() {
    let spectrum = Spectrum::new(vec![0, 12, 40, 7, 3]);
    let mut emsa = Emsa::from_spectrum("sum spectrum", &spectrum, 0.0, 20.0);
    emsa.header.set_with_unit("LIVETIME", "12.5", "s");

    let dir = tempdir().unwrap();
    let path = dir.path().join("sum.msa");
    write_file(&emsa, &path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let last = text.lines().last().unwrap();
    assert!(last.starts_with("#CHECKSUM"));
    assert!(text.lines().any(|l| l == "#LIVETIME  -s: 12.5"));

    let back = read_file(&path).unwrap();
    assert_eq!(back.y_data, emsa.y_data);
    assert_eq!(back.x_data, emsa.x_data);
    assert_eq!(back.header.unit("LIVETIME"), Some("s"));
    assert_eq!(back.header.get("TITLE"), Some("sum spectrum"));
}

#[test]
fn test_write_orders_required_keywords_first() {
    let mut emsa = read(Y_FILE.as_bytes()).unwrap();
    emsa.header.set("COMMENT", "added later");

    let mut out = Vec::new();
    write(&emsa, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let keywords: Vec<&str> = text
        .lines()
        .filter_map(|l| l.strip_prefix('#'))
        .filter_map(|l| l.split_whitespace().next())
        .map(|k| k.trim_end_matches(':'))
        .collect();

    assert_eq!(&keywords[..3], &["FORMAT", "VERSION", "TITLE"]);
    assert_eq!(keywords[12], "OFFSET");
    assert_eq!(&keywords[13..], &[
        "BEAMKV",
        "SIGNALTYPE",
        "COMMENT",
        "SPECTRUM",
        "ENDOFDATA",
        "CHECKSUM"
    ]);
    // Four columns per data line.
    assert!(text.contains("\n1, 2, 3, 4\n5, 6\n"));
    assert_eq!(read(text.as_bytes()).unwrap(), emsa);
}

#[test]
fn test_write_rejects_invalid_spectrum() {
    let mut emsa = Emsa::from_spectrum("t", &Spectrum::new(vec![1, 2]), 0.0, 1.0);
    emsa.y_data.push(3.0);
    let mut out = Vec::new();
    assert!(write(&emsa, &mut out).is_err());
    assert!(out.is_empty());
}

//! EMSA/MAS writer.

use crate::document::Emsa;
use crate::header::{
    DataType, HeaderEntry, CHECKSUM, ENDOFDATA, NCOLUMNS, REQUIRED_KEYWORDS, SECTION_KEYWORDS,
    SPECTRUM,
};
use crate::reader::checksum;
use crate::{Error, Result};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const TAG_WIDTH: usize = 12;
const MAX_COLUMNS: usize = 5;

/// `#TAG: value` with the tag padded to twelve characters. A unit comment
/// is right-aligned inside the tag.
fn keyword_line(keyword: &str, unit: Option<&str>, value: &str) -> String {
    let tag = match unit {
        Some(unit) => {
            let unit = format!("-{unit}");
            let width = TAG_WIDTH.saturating_sub(unit.len()).max(keyword.len() + 1);
            format!("{keyword:<width$}{unit}")
        }
        None => format!("{keyword:<width$}", width = TAG_WIDTH),
    };
    format!("#{tag}: {value}")
}

fn entry_line(entry: &HeaderEntry) -> String {
    keyword_line(&entry.keyword, entry.unit.as_deref(), &entry.value)
}

fn data_lines(emsa: &Emsa) -> Result<Vec<String>> {
    match emsa.header.data_type()? {
        DataType::Xy => Ok(emsa.points().map(|(x, y)| format!("{x}, {y}")).collect()),
        DataType::Y => {
            let columns = emsa.header.count(NCOLUMNS)?;
            if !(1..=MAX_COLUMNS).contains(&columns) {
                return Err(Error::InvalidData(format!(
                    "NCOLUMNS must be 1 to {MAX_COLUMNS}, got {columns}"
                )));
            }
            Ok(emsa
                .y_data
                .chunks(columns)
                .map(|row| {
                    row.iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .collect())
        }
    }
}

/// Renders the complete file, checksum line included.
fn render_lines(emsa: &Emsa) -> Result<Vec<String>> {
    emsa.validate()?;
    let header = &emsa.header;

    let mut lines = Vec::with_capacity(header.len() + emsa.len() + 3);
    for keyword in REQUIRED_KEYWORDS {
        let entry = header
            .entry(keyword)
            .ok_or_else(|| Error::MissingKeyword(keyword.to_string()))?;
        lines.push(entry_line(entry));
    }
    lines.extend(
        header
            .iter()
            .filter(|e| {
                !REQUIRED_KEYWORDS
                    .iter()
                    .chain(SECTION_KEYWORDS.iter())
                    .any(|k| *k == e.keyword)
            })
            .map(entry_line),
    );

    lines.push(keyword_line(SPECTRUM, None, "Spectral Data Starts Here"));
    lines.extend(data_lines(emsa)?);
    lines.push(keyword_line(ENDOFDATA, None, ""));

    let sum = checksum(lines.iter().map(String::as_str));
    lines.push(keyword_line(CHECKSUM, None, &sum.to_string()));
    Ok(lines)
}

/// Writes an EMSA spectrum, ending with a `#CHECKSUM` line.
///
/// # Errors
/// Returns [`Error::MissingKeyword`] or [`Error::InvalidData`] if the
/// spectrum does not validate, or [`Error::Io`] on write failure.
pub fn write<W: Write>(emsa: &Emsa, mut writer: W) -> Result<()> {
    for line in render_lines(emsa)? {
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes an EMSA spectrum to `path`.
///
/// # Errors
/// See [`write`].
pub fn write_file<P: AsRef<Path>>(emsa: &Emsa, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Writing EMSA file: {} ({} points)", path.display(), emsa.len());
    write(emsa, BufWriter::new(File::create(path)?))
}

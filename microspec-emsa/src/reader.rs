//! EMSA/MAS reader.

use crate::document::{channel_axis, Emsa};
use crate::header::{DataType, CHECKSUM, ENDOFDATA, OFFSET, SPECTRUM, XPERCHAN};
use crate::{Error, Result};
use log::{debug, info, trace};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Data,
    Trailer,
}

/// A parsed `#KEYWORD -unit: value` line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct KeywordLine<'a> {
    pub keyword: String,
    pub unit: Option<&'a str>,
    pub value: &'a str,
}

/// Sum of the byte values of every line except `#CHECKSUM` lines.
/// Lines are taken without their terminators.
pub(crate) fn checksum<'a, I>(lines: I) -> u64
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter(|line| !is_checksum_line(line))
        .flat_map(str::bytes)
        .map(u64::from)
        .sum()
}

fn is_checksum_line(line: &str) -> bool {
    line.trim_start()
        .strip_prefix('#')
        .is_some_and(|rest| rest.trim_start_matches('#').starts_with(CHECKSUM))
}

pub(crate) fn parse_keyword_line(line: &str) -> Result<KeywordLine<'_>> {
    let body = line.trim().trim_start_matches('#');
    let (tag, value) = body
        .split_once(':')
        .ok_or_else(|| Error::InvalidData(format!("keyword line without ':': '{line}'")))?;

    let mut parts = tag.split_whitespace();
    let keyword = parts
        .next()
        .ok_or_else(|| Error::InvalidData(format!("empty keyword: '{line}'")))?
        .to_ascii_uppercase();
    let unit = parts
        .next()
        .map(|u| u.trim_matches('-'))
        .filter(|u| !u.is_empty());

    Ok(KeywordLine {
        keyword,
        unit,
        value: value.trim(),
    })
}

/// Splits a data line on commas and whitespace.
pub(crate) fn parse_data_line(line: &str, line_number: usize) -> Result<Vec<f64>> {
    line.split(',')
        .flat_map(str::split_whitespace)
        .map(|token| {
            token.parse().map_err(|_| {
                Error::InvalidData(format!("line {line_number}: '{token}' is not a number"))
            })
        })
        .collect()
}

/// Reads an EMSA spectrum.
///
/// A `#CHECKSUM` line, when present, must match the file contents. `Y` data
/// receives an x axis of `OFFSET + XPERCHAN * i`.
///
/// # Errors
/// Returns [`Error::ChecksumMismatch`], [`Error::MissingKeyword`],
/// [`Error::InvalidData`] or [`Error::Io`].
pub fn read<R: BufRead>(reader: R) -> Result<Emsa> {
    let lines = reader.lines().collect::<std::io::Result<Vec<String>>>()?;

    let mut emsa = Emsa::default();
    let mut declared_checksum = None;
    let mut section = Section::Header;
    let mut data_type = None;

    for (index, line) in lines.iter().enumerate() {
        let line_number = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        if line.trim_start().starts_with('#') {
            let parsed = parse_keyword_line(line)?;
            match parsed.keyword.as_str() {
                SPECTRUM => {
                    data_type = Some(emsa.header.data_type()?);
                    section = Section::Data;
                }
                ENDOFDATA => section = Section::Trailer,
                CHECKSUM => {
                    let value = parsed.value.parse::<u64>().map_err(|_| {
                        Error::InvalidData(format!("checksum '{}' is not an integer", parsed.value))
                    })?;
                    declared_checksum = Some(value);
                }
                _ if section == Section::Header => match parsed.unit {
                    Some(unit) => emsa
                        .header
                        .set_with_unit(&parsed.keyword, parsed.value, unit),
                    None => emsa.header.set(&parsed.keyword, parsed.value),
                },
                _ => trace!("Skipping keyword {} outside the header", parsed.keyword),
            }
            continue;
        }

        match (section, data_type) {
            (Section::Data, Some(DataType::Y)) => {
                emsa.y_data.extend(parse_data_line(line, line_number)?);
            }
            (Section::Data, Some(DataType::Xy)) => {
                let row = parse_data_line(line, line_number)?;
                let [x, y, ..] = row.as_slice() else {
                    return Err(Error::InvalidData(format!(
                        "line {line_number}: XY data needs two columns"
                    )));
                };
                emsa.x_data.push(*x);
                emsa.y_data.push(*y);
            }
            _ => trace!("Skipping line {line_number} outside the data section"),
        }
    }

    if let Some(declared) = declared_checksum {
        let computed = checksum(lines.iter().map(String::as_str));
        if declared != computed {
            return Err(Error::ChecksumMismatch { declared, computed });
        }
        debug!("Checksum {declared} verified");
    }

    emsa.header.check_required()?;
    if emsa.header.data_type()? == DataType::Y {
        let offset = emsa.header.number(OFFSET)?;
        let x_per_channel = emsa.header.number(XPERCHAN)?;
        emsa.x_data = channel_axis(emsa.y_data.len(), offset, x_per_channel);
    }
    emsa.validate()?;

    info!(
        "Read EMSA spectrum with {} points and {} header keywords",
        emsa.len(),
        emsa.header.len()
    );
    Ok(emsa)
}

/// Reads an EMSA file from disk.
///
/// # Errors
/// See [`read`].
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Emsa> {
    let path = path.as_ref();
    info!("Opening EMSA file: {}", path.display());
    read(BufReader::new(File::open(path)?))
}

//! Bounded reads of fixed byte regions.

use crate::Result;
use microspec_core::Error as CoreError;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

/// Reads `len` bytes at `offset`, refusing regions that end past `file_len`.
pub(crate) fn read_region(file: &mut File, file_len: u64, offset: u64, len: usize) -> Result<Vec<u8>> {
    let end = offset.checked_add(len as u64);
    match end {
        Some(end) if end <= file_len => {
            file.seek(SeekFrom::Start(offset))?;
            let mut buf = vec![0u8; len];
            file.read_exact(&mut buf)?;
            Ok(buf)
        }
        _ => Err(CoreError::truncated(
            to_usize(offset),
            end.map_or(usize::MAX, to_usize),
            to_usize(file_len),
        )
        .into()),
    }
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

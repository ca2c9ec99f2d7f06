//! Storage order strategies.
//!
//! A raw payload stores the (row, column, channel) cube either channel
//! fastest ([`VectorLayout`]) or channel slowest ([`ImageLayout`]). Both
//! strategies fill the same canonical [`RowTile`], so every reduction is
//! written once against tiles and never branches on the storage order.

use microspec_core::{CubeDims, ElementFormat, Error, Result, StorageOrder};
use std::fmt::Debug;
use std::ops::Range;

/// Raw payload bytes with their element encoding.
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    bytes: &'a [u8],
    offset: usize,
    format: ElementFormat,
}

impl<'a> Payload<'a> {
    /// Wraps payload bytes whose first sample starts at `offset`.
    #[must_use]
    pub fn new(bytes: &'a [u8], offset: usize, format: ElementFormat) -> Self {
        Self {
            bytes,
            offset,
            format,
        }
    }

    #[must_use]
    pub fn format(&self) -> ElementFormat {
        self.format
    }

    /// Decodes `out.len()` consecutive elements starting at element index
    /// `first`.
    ///
    /// # Errors
    /// Returns [`Error::TruncatedFile`] if the run extends past the payload.
    pub fn decode_run(&self, first: usize, out: &mut [i64]) -> Result<()> {
        let width = self.format.width();
        let available = self.bytes.len();
        let start = first
            .checked_mul(width)
            .and_then(|bytes| bytes.checked_add(self.offset));
        let end = start.and_then(|start| {
            out.len()
                .checked_mul(width)
                .and_then(|len| start.checked_add(len))
        });
        match (start, end) {
            (Some(start), Some(end)) if end <= available => {
                self.format.decode_into(&self.bytes[start..end], out);
                Ok(())
            }
            _ => Err(Error::truncated(
                start.unwrap_or(usize::MAX),
                end.unwrap_or(usize::MAX),
                available,
            )),
        }
    }
}

/// Samples of one image row over a column range and a channel range.
///
/// Values are stored pixel-major with channels fastest: the sample for
/// column `cols.start + i`, channel `channels.start + k` lives at
/// `i * channel_count + k`.
#[derive(Debug, Clone, Default)]
pub struct RowTile {
    data: Vec<i64>,
    scratch: Vec<i64>,
    cols: usize,
    channels: usize,
}

impl RowTile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self, cols: usize, channels: usize) {
        self.cols = cols;
        self.channels = channels;
        self.data.clear();
        self.data.resize(cols * channels, 0);
    }

    /// Number of columns in the tile.
    #[must_use]
    pub fn col_count(&self) -> usize {
        self.cols
    }

    /// Number of channels per pixel.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels
    }

    /// All samples, channel fastest.
    #[must_use]
    pub fn data(&self) -> &[i64] {
        &self.data
    }

    /// Channel values of the `i`-th column in the tile.
    #[must_use]
    pub fn pixel(&self, i: usize) -> &[i64] {
        &self.data[i * self.channels..(i + 1) * self.channels]
    }

    /// Iterates over the pixels of the tile in column order.
    pub fn pixels(&self) -> impl Iterator<Item = &[i64]> {
        // chunks_exact(0) panics; an empty channel range has no samples.
        self.data.chunks_exact(self.channels.max(1))
    }

    /// Consumes the tile and returns its samples.
    #[must_use]
    pub fn into_data(self) -> Vec<i64> {
        self.data
    }
}

/// Addressing strategy for one storage order.
pub trait SampleLayout: Send + Sync + Debug {
    /// The storage order this strategy decodes.
    fn order(&self) -> StorageOrder;

    /// Element index (not byte offset) of a sample, relative to the payload
    /// offset.
    fn element_index(&self, dims: &CubeDims, row: usize, col: usize, channel: usize) -> usize;

    /// Fills `tile` with row `row` over `cols` and `channels`.
    ///
    /// Ranges must already be checked against `dims`.
    ///
    /// # Errors
    /// Returns [`Error::TruncatedFile`] if any needed sample is missing.
    fn read_row_tile(
        &self,
        payload: &Payload<'_>,
        dims: &CubeDims,
        row: usize,
        cols: Range<usize>,
        channels: Range<usize>,
        tile: &mut RowTile,
    ) -> Result<()>;
}

/// Channel fastest: each pixel's spectrum is one contiguous run.
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorLayout;

impl SampleLayout for VectorLayout {
    fn order(&self) -> StorageOrder {
        StorageOrder::Vector
    }

    #[inline]
    fn element_index(&self, dims: &CubeDims, row: usize, col: usize, channel: usize) -> usize {
        (row * dims.width + col) * dims.depth + channel
    }

    fn read_row_tile(
        &self,
        payload: &Payload<'_>,
        dims: &CubeDims,
        row: usize,
        cols: Range<usize>,
        channels: Range<usize>,
        tile: &mut RowTile,
    ) -> Result<()> {
        let nch = channels.len();
        tile.reset(cols.len(), nch);
        if nch == 0 || cols.is_empty() {
            return Ok(());
        }

        if nch == dims.depth {
            // Full spectra of adjacent pixels are adjacent in the payload.
            let first = self.element_index(dims, row, cols.start, 0);
            return payload.decode_run(first, &mut tile.data);
        }

        for (i, col) in cols.enumerate() {
            let first = self.element_index(dims, row, col, channels.start);
            payload.decode_run(first, &mut tile.data[i * nch..(i + 1) * nch])?;
        }
        Ok(())
    }
}

/// Channel slowest: the payload is a stack of channel images.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageLayout;

impl SampleLayout for ImageLayout {
    fn order(&self) -> StorageOrder {
        StorageOrder::Image
    }

    #[inline]
    fn element_index(&self, dims: &CubeDims, row: usize, col: usize, channel: usize) -> usize {
        channel * dims.pixel_count() + row * dims.width + col
    }

    fn read_row_tile(
        &self,
        payload: &Payload<'_>,
        dims: &CubeDims,
        row: usize,
        cols: Range<usize>,
        channels: Range<usize>,
        tile: &mut RowTile,
    ) -> Result<()> {
        let ncols = cols.len();
        let nch = channels.len();
        tile.reset(ncols, nch);
        if nch == 0 || ncols == 0 {
            return Ok(());
        }

        let mut scratch = std::mem::take(&mut tile.scratch);
        scratch.clear();
        scratch.resize(ncols, 0);

        for (k, channel) in channels.enumerate() {
            let first = self.element_index(dims, row, cols.start, channel);
            if let Err(e) = payload.decode_run(first, &mut scratch) {
                tile.scratch = scratch;
                return Err(e);
            }
            for (i, value) in scratch.iter().enumerate() {
                tile.data[i * nch + k] = *value;
            }
        }

        tile.scratch = scratch;
        Ok(())
    }
}

/// Picks the strategy for a declared storage order.
///
/// # Errors
/// Returns [`Error::UnsupportedLayout`] for anything but image or vector.
pub fn layout_for(order: &StorageOrder) -> Result<Box<dyn SampleLayout>> {
    match order {
        StorageOrder::Vector => Ok(Box::new(VectorLayout)),
        StorageOrder::Image => Ok(Box::new(ImageLayout)),
        StorageOrder::Unknown(text) => Err(Error::UnsupportedLayout(format!(
            "storage order {text:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microspec_core::{Endianness, SampleKind};

    fn u8_payload(bytes: &[u8]) -> Payload<'_> {
        Payload::new(bytes, 0, ElementFormat::new(SampleKind::U8, Endianness::Little))
    }

    #[test]
    fn test_element_index() {
        let dims = CubeDims::new(3, 2, 4).unwrap();
        assert_eq!(VectorLayout.element_index(&dims, 1, 2, 3), (3 + 2) * 4 + 3);
        assert_eq!(ImageLayout.element_index(&dims, 1, 2, 3), 3 * 6 + 3 + 2);
    }

    #[test]
    fn test_row_tiles_agree() {
        // value = row * 100 + col * 10 + channel
        let dims = CubeDims::new(3, 2, 4).unwrap();
        let mut vector = vec![0u8; dims.sample_count()];
        let mut image = vec![0u8; dims.sample_count()];
        for row in 0..2 {
            for col in 0..3 {
                for ch in 0..4 {
                    let value = u8::try_from(row * 100 + col * 10 + ch).unwrap();
                    vector[VectorLayout.element_index(&dims, row, col, ch)] = value;
                    image[ImageLayout.element_index(&dims, row, col, ch)] = value;
                }
            }
        }

        for channels in [0..4, 1..3] {
            let mut a = RowTile::new();
            let mut b = RowTile::new();
            VectorLayout
                .read_row_tile(&u8_payload(&vector), &dims, 1, 1..3, channels.clone(), &mut a)
                .unwrap();
            ImageLayout
                .read_row_tile(&u8_payload(&image), &dims, 1, 1..3, channels.clone(), &mut b)
                .unwrap();
            assert_eq!(a.data(), b.data());
            assert_eq!(a.pixel(0)[0], 110 + i64::try_from(channels.start).unwrap());
            assert_eq!(a.pixels().count(), 2);
        }
    }

    #[test]
    fn test_decode_run_truncated() {
        let bytes = [1u8, 2, 3];
        let payload = u8_payload(&bytes);
        let mut out = [0i64; 2];
        payload.decode_run(1, &mut out).unwrap();
        assert_eq!(out, [2, 3]);

        let err = payload.decode_run(2, &mut out).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedFile {
                offset: 2,
                needed: 4,
                available: 3
            }
        ));
    }

    #[test]
    fn test_layout_for_unknown() {
        assert_eq!(layout_for(&StorageOrder::Image).unwrap().order(), StorageOrder::Image);
        assert!(layout_for(&StorageOrder::Unknown("spiral".into()))
            .unwrap_err()
            .is_unsupported_layout());
    }
}

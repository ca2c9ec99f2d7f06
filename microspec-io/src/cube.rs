//! Hyperspectral map cubes backed by a memory-mapped `.raw` payload.
//!

use crate::config::MapConfig;
use crate::reader::MappedFileReader;
use crate::storage::{layout_for, Payload, RowTile, SampleLayout};
use crate::Result;
use log::{info, warn};
use microspec_core::{
    resolve_with, CubeDims, ElementFormat, Error as CoreError, LayoutDescriptor, PixelCoord,
    Spectrum, StorageOrder,
};
use ndarray::{Array2, Array3};
use rayon::prelude::*;
use std::ops::{Range, RangeInclusive};
use std::path::Path;

/// The full cube in canonical (row, column, channel) order.
#[derive(Debug, Clone, PartialEq)]
pub struct DataCube {
    /// Samples indexed `[[row, col, channel]]`.
    pub data: Array3<i64>,
    /// Channel axis, `0..depth`.
    pub channels: Vec<usize>,
}

/// A raw hyperspectral map opened for random access.
///
/// The descriptor, element format and storage strategy are resolved once at
/// construction; queries only decode the bytes they touch.
#[derive(Debug)]
pub struct HyperspectralCube {
    reader: MappedFileReader,
    descriptor: LayoutDescriptor,
    dims: CubeDims,
    offset: usize,
    format: ElementFormat,
    layout: Box<dyn SampleLayout>,
    expected_len: usize,
    parallel: bool,
}

impl HyperspectralCube {
    /// Opens a payload and the sidecar next to it.
    ///
    /// The sidecar path is `raw_path` with the configured extension.
    ///
    /// # Errors
    /// Returns an error if the sidecar cannot be read or parsed, the layout
    /// is incomplete or unsupported, or the payload cannot be mapped.
    pub fn open<P: AsRef<Path>>(raw_path: P, config: &MapConfig) -> Result<Self> {
        let raw_path = raw_path.as_ref();
        let sidecar = config.sidecar_path(raw_path);
        let descriptor = LayoutDescriptor::read_file(&sidecar, config.dialect)?;
        Self::from_descriptor(raw_path, descriptor, config)
    }

    /// Opens a payload described by an in-memory descriptor.
    ///
    /// # Errors
    /// Returns an error if the layout is incomplete or unsupported, or the
    /// payload cannot be mapped.
    pub fn from_descriptor<P: AsRef<Path>>(
        raw_path: P,
        descriptor: LayoutDescriptor,
        config: &MapConfig,
    ) -> Result<Self> {
        let raw_path = raw_path.as_ref();

        descriptor.validate()?;
        let dims = descriptor.dims()?;
        let offset = descriptor.offset()?;
        let format = resolve_with(&descriptor, config.dont_care_byte_order)?;
        let layout = layout_for(descriptor.storage_order()?)?;
        let expected_len = descriptor.expected_file_len()?;

        let reader = MappedFileReader::open(raw_path)?;
        info!(
            "Opened map {}: {}x{}x{} ({:?} {:?}, {:?} order)",
            raw_path.display(),
            dims.width,
            dims.height,
            dims.depth,
            format.kind(),
            format.endianness(),
            layout.order(),
        );
        if reader.len() != expected_len {
            warn!(
                "Payload {} is {} bytes, descriptor declares {}",
                raw_path.display(),
                reader.len(),
                expected_len
            );
        }

        Ok(Self {
            reader,
            descriptor,
            dims,
            offset,
            format,
            layout,
            expected_len,
            parallel: config.parallel,
        })
    }

    /// The descriptor the cube was opened with.
    #[must_use]
    pub fn descriptor(&self) -> &LayoutDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn dims(&self) -> CubeDims {
        self.dims
    }

    #[must_use]
    pub fn format(&self) -> ElementFormat {
        self.format
    }

    #[must_use]
    pub fn storage_order(&self) -> StorageOrder {
        self.layout.order()
    }

    /// Actual payload length in bytes.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.reader.len()
    }

    /// Payload length implied by the descriptor, including the offset.
    #[must_use]
    pub fn expected_payload_len(&self) -> usize {
        self.expected_len
    }

    /// Spectrum of one pixel.
    ///
    /// # Errors
    /// Returns `IndexOutOfRange` outside the image and `TruncatedFile` if the
    /// pixel's samples are missing from the payload.
    pub fn spectrum_at(&self, row: usize, col: usize) -> Result<Spectrum> {
        self.dims.check_pixel(row, col)?;
        let mut tile = RowTile::new();
        self.read_tile(row, col..col + 1, 0..self.dims.depth, &mut tile)?;
        Ok(Spectrum::new(tile.into_data()))
    }

    /// Sum of every pixel's spectrum.
    ///
    /// # Errors
    /// Returns `TruncatedFile` if any sample is missing.
    pub fn sum_spectrum(&self) -> Result<Spectrum> {
        self.region_sum(0..self.dims.height, 0..self.dims.width)
    }

    /// Sum of the spectra in an inclusive pixel rectangle.
    ///
    /// # Errors
    /// Returns `IndexOutOfRange` for an empty or out-of-image rectangle.
    pub fn roi_spectrum(
        &self,
        rows: RangeInclusive<usize>,
        cols: RangeInclusive<usize>,
    ) -> Result<Spectrum> {
        let (r0, r1) = (*rows.start(), *rows.end());
        let (c0, c1) = (*cols.start(), *cols.end());
        if r0 > r1 || c0 > c1 {
            return Err(CoreError::IndexOutOfRange(format!(
                "empty region rows {r0}..={r1}, cols {c0}..={c1}"
            ))
            .into());
        }
        self.dims.check_pixel(r1, c1)?;
        self.region_sum(r0..r1 + 1, c0..c1 + 1)
    }

    /// Per-channel maximum over all pixels.
    ///
    /// # Errors
    /// Returns `TruncatedFile` if any sample is missing.
    pub fn max_projection_spectrum(&self) -> Result<Spectrum> {
        let depth = self.dims.depth;
        let rows = self.map_rows(0..self.dims.height, 0..self.dims.width, 0..depth, |_, tile| {
            let mut max = vec![i64::MIN; depth];
            for pixel in tile.pixels() {
                for (m, value) in max.iter_mut().zip(pixel) {
                    *m = (*m).max(*value);
                }
            }
            max
        })?;

        let mut max = vec![i64::MIN; depth];
        for row in rows {
            for (m, value) in max.iter_mut().zip(row) {
                *m = (*m).max(value);
            }
        }
        Ok(Spectrum::new(max))
    }

    /// For each channel, the pixel holding its maximum.
    ///
    /// Ties go to the first pixel in row-major order.
    ///
    /// # Errors
    /// Returns `TruncatedFile` if any sample is missing.
    pub fn argmax_pixel_per_channel(&self) -> Result<Vec<PixelCoord>> {
        let depth = self.dims.depth;
        let rows = self.map_rows(0..self.dims.height, 0..self.dims.width, 0..depth, |_, tile| {
            let mut best: Vec<(i64, usize)> = tile.pixel(0).iter().map(|v| (*v, 0)).collect();
            for (col, pixel) in tile.pixels().enumerate().skip(1) {
                for (b, value) in best.iter_mut().zip(pixel) {
                    if *value > b.0 {
                        *b = (*value, col);
                    }
                }
            }
            best
        })?;

        let mut best: Vec<(i64, PixelCoord)> = vec![(i64::MIN, PixelCoord::new(0, 0)); depth];
        let mut first = true;
        for (row, row_best) in rows.into_iter().enumerate() {
            for (b, (value, col)) in best.iter_mut().zip(row_best) {
                if first || value > b.0 {
                    *b = (value, PixelCoord::new(row, col));
                }
            }
            first = false;
        }
        Ok(best.into_iter().map(|(_, coord)| coord).collect())
    }

    /// Per-pixel sum over all channels, shaped (height, width).
    ///
    /// # Errors
    /// Returns `TruncatedFile` if any sample is missing.
    pub fn total_intensity_image(&self) -> Result<Array2<i64>> {
        self.channel_sum_image(0..self.dims.depth)
    }

    /// Per-pixel sum over a half-open channel range, shaped (height, width).
    ///
    /// An empty range yields a zero image.
    ///
    /// # Errors
    /// Returns `IndexOutOfRange` if `start > end` or `end > depth`.
    pub fn roi_intensity_image(&self, channels: Range<usize>) -> Result<Array2<i64>> {
        if channels.start > channels.end || channels.end > self.dims.depth {
            return Err(CoreError::IndexOutOfRange(format!(
                "channel range {}..{} outside 0..{}",
                channels.start, channels.end, self.dims.depth
            ))
            .into());
        }
        if channels.is_empty() {
            return Ok(Array2::zeros((self.dims.height, self.dims.width)));
        }
        self.channel_sum_image(channels)
    }

    /// Decodes the whole cube into (row, column, channel) order.
    ///
    /// # Errors
    /// Returns `TruncatedFile` if any sample is missing.
    pub fn whole_cube(&self) -> Result<DataCube> {
        let CubeDims {
            width,
            height,
            depth,
        } = self.dims;
        let rows = self.map_rows(0..height, 0..width, 0..depth, |_, tile| tile.data().to_vec())?;

        let mut data = Array3::zeros((height, width, depth));
        for (row, samples) in rows.into_iter().enumerate() {
            for (col, pixel) in samples.chunks_exact(depth).enumerate() {
                for (ch, value) in pixel.iter().enumerate() {
                    data[[row, col, ch]] = *value;
                }
            }
        }
        Ok(DataCube {
            data,
            channels: (0..depth).collect(),
        })
    }

    fn payload(&self) -> Payload<'_> {
        Payload::new(self.reader.as_bytes(), self.offset, self.format)
    }

    fn read_tile(
        &self,
        row: usize,
        cols: Range<usize>,
        channels: Range<usize>,
        tile: &mut RowTile,
    ) -> Result<()> {
        self.layout
            .read_row_tile(&self.payload(), &self.dims, row, cols, channels, tile)?;
        Ok(())
    }

    fn region_sum(&self, rows: Range<usize>, cols: Range<usize>) -> Result<Spectrum> {
        let depth = self.dims.depth;
        let partials = self.map_rows(rows, cols, 0..depth, |_, tile| {
            let mut sum = vec![0i64; depth];
            for pixel in tile.pixels() {
                for (acc, value) in sum.iter_mut().zip(pixel) {
                    *acc += value;
                }
            }
            sum
        })?;

        let mut total = Spectrum::zeros(depth);
        for partial in &partials {
            total.accumulate(partial)?;
        }
        Ok(total)
    }

    fn channel_sum_image(&self, channels: Range<usize>) -> Result<Array2<i64>> {
        let CubeDims { width, height, .. } = self.dims;
        let rows = self.map_rows(0..height, 0..width, channels, |_, tile| {
            tile.pixels().map(|pixel| pixel.iter().sum()).collect::<Vec<i64>>()
        })?;

        let mut image = Array2::zeros((height, width));
        for (row, totals) in rows.into_iter().enumerate() {
            for (col, total) in totals.into_iter().enumerate() {
                image[[row, col]] = total;
            }
        }
        Ok(image)
    }

    /// Loads one tile per row and maps it, in row order.
    fn map_rows<T, F>(
        &self,
        rows: Range<usize>,
        cols: Range<usize>,
        channels: Range<usize>,
        f: F,
    ) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize, &RowTile) -> T + Sync + Send,
    {
        let load = |row: usize| -> Result<T> {
            let mut tile = RowTile::new();
            self.read_tile(row, cols.clone(), channels.clone(), &mut tile)?;
            Ok(f(row, &tile))
        };

        if self.parallel {
            rows.into_par_iter().map(load).collect()
        } else {
            rows.map(load).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microspec_core::{ByteOrder, DataType};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn descriptor(width: usize, height: usize, depth: usize, order: StorageOrder) -> LayoutDescriptor {
        LayoutDescriptor {
            width: Some(width),
            height: Some(height),
            depth: Some(depth),
            offset: Some(0),
            data_length: Some(2),
            data_type: Some(DataType::Unsigned),
            byte_order: Some(ByteOrder::LittleEndian),
            storage_order: Some(order),
            ..LayoutDescriptor::default()
        }
    }

    fn payload_file(values: &[u16]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for v in values {
            file.write_all(&v.to_le_bytes()).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_single_pixel_cube() {
        let file = payload_file(&[5, 7, 9]);
        let cube = HyperspectralCube::from_descriptor(
            file.path(),
            descriptor(1, 1, 3, StorageOrder::Vector),
            &MapConfig::default(),
        )
        .unwrap();

        assert_eq!(cube.spectrum_at(0, 0).unwrap().counts(), &[5, 7, 9]);
        assert_eq!(cube.sum_spectrum().unwrap().counts(), &[5, 7, 9]);
        assert_eq!(cube.max_projection_spectrum().unwrap().counts(), &[5, 7, 9]);
        assert_eq!(
            cube.argmax_pixel_per_channel().unwrap(),
            vec![PixelCoord::new(0, 0); 3]
        );
        assert_eq!(cube.total_intensity_image().unwrap()[[0, 0]], 21);
        assert_eq!(cube.payload_len(), cube.expected_payload_len());
    }

    #[test]
    fn test_rejects_unknown_storage_order() {
        let file = payload_file(&[0; 4]);
        let err = HyperspectralCube::from_descriptor(
            file.path(),
            descriptor(2, 2, 1, StorageOrder::Unknown("spiral".into())),
            &MapConfig::default(),
        )
        .unwrap_err();
        assert!(err.is_unsupported_layout());
    }

    #[test]
    fn test_missing_key_detected_at_construction() {
        let file = payload_file(&[0; 4]);
        let mut d = descriptor(2, 2, 1, StorageOrder::Image);
        d.offset = None;
        let err = HyperspectralCube::from_descriptor(file.path(), d, &MapConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Core(CoreError::MissingDescriptorKey("offset"))
        ));
    }

    #[test]
    fn test_argmax_tie_breaks_row_major() {
        // 2x2 image, one channel, all equal.
        let file = payload_file(&[3, 3, 3, 3]);
        let cube = HyperspectralCube::from_descriptor(
            file.path(),
            descriptor(2, 2, 1, StorageOrder::Image),
            &MapConfig::default().with_parallel(false),
        )
        .unwrap();
        assert_eq!(
            cube.argmax_pixel_per_channel().unwrap(),
            vec![PixelCoord::new(0, 0)]
        );
    }

    #[test]
    fn test_roi_bounds() {
        let file = payload_file(&[1; 8]);
        let cube = HyperspectralCube::from_descriptor(
            file.path(),
            descriptor(2, 2, 2, StorageOrder::Vector),
            &MapConfig::default(),
        )
        .unwrap();

        assert!(cube.roi_spectrum(0..=2, 0..=0).unwrap_err().is_index_out_of_range());
        assert!(cube.spectrum_at(0, 2).unwrap_err().is_index_out_of_range());
        assert!(cube.roi_intensity_image(0..3).unwrap_err().is_index_out_of_range());
        #[allow(clippy::reversed_empty_ranges)]
        let reversed = 2..1;
        assert!(cube.roi_intensity_image(reversed).unwrap_err().is_index_out_of_range());

        let empty = cube.roi_intensity_image(1..1).unwrap();
        assert!(empty.iter().all(|v| *v == 0));
        assert_eq!(cube.roi_spectrum(1..=1, 0..=1).unwrap().counts(), &[2, 2]);
    }
}

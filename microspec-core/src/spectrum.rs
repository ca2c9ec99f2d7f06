//! Spectrum and pixel addressing types.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pixel coordinate in a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelCoord {
    /// Row (line) index, `0..height`.
    pub row: usize,
    /// Column index, `0..width`.
    pub col: usize,
}

impl PixelCoord {
    /// Creates a new pixel coordinate.
    #[inline]
    #[must_use]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Row-major linear index of this pixel in an image `width` pixels wide.
    #[inline]
    #[must_use]
    pub fn linear_index(&self, width: usize) -> usize {
        self.row * width + self.col
    }

    /// Inverse of [`PixelCoord::linear_index`].
    #[inline]
    #[must_use]
    pub fn from_linear_index(index: usize, width: usize) -> Self {
        Self {
            row: index / width,
            col: index % width,
        }
    }
}

/// Logical dimensions of a hyperspectral cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CubeDims {
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
    /// Number of channels per pixel.
    pub depth: usize,
}

impl CubeDims {
    /// Creates cube dimensions, rejecting zero-sized axes.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedLayout`] if any axis is zero or the total
    /// sample count overflows `usize`.
    pub fn new(width: usize, height: usize, depth: usize) -> Result<Self> {
        if width == 0 || height == 0 || depth == 0 {
            return Err(Error::UnsupportedLayout(format!(
                "cube dimensions must be positive, got {width}x{height}x{depth}"
            )));
        }
        width
            .checked_mul(height)
            .and_then(|pixels| pixels.checked_mul(depth))
            .ok_or_else(|| {
                Error::UnsupportedLayout(format!(
                    "cube of {width}x{height}x{depth} samples is not addressable"
                ))
            })?;
        Ok(Self {
            width,
            height,
            depth,
        })
    }

    /// Number of pixels in one channel image.
    #[inline]
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Total number of samples in the cube.
    #[inline]
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.pixel_count() * self.depth
    }

    /// Checks that `(row, col)` lies inside the image.
    ///
    /// # Errors
    /// Returns [`Error::IndexOutOfRange`] otherwise.
    pub fn check_pixel(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.height || col >= self.width {
            return Err(Error::IndexOutOfRange(format!(
                "pixel (row {row}, col {col}) outside {}x{} image",
                self.height, self.width
            )));
        }
        Ok(())
    }
}

/// An ordered sequence of per-channel intensities.
///
/// Channel `i` of the spectrum is `counts[i]`; the channel axis is simply
/// `0..len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Spectrum {
    counts: Vec<i64>,
}

impl Spectrum {
    /// Wraps per-channel counts.
    #[must_use]
    pub fn new(counts: Vec<i64>) -> Self {
        Self { counts }
    }

    /// A spectrum of `depth` zero channels.
    #[must_use]
    pub fn zeros(depth: usize) -> Self {
        Self {
            counts: vec![0; depth],
        }
    }

    /// Number of channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns true if the spectrum has no channels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Per-channel intensities.
    #[must_use]
    pub fn counts(&self) -> &[i64] {
        &self.counts
    }

    /// Channel indices `0..len()`.
    #[must_use]
    pub fn channels(&self) -> Vec<usize> {
        (0..self.counts.len()).collect()
    }

    /// Sum over all channels.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.counts.iter().sum()
    }

    /// Consumes the spectrum and returns its counts.
    #[must_use]
    pub fn into_counts(self) -> Vec<i64> {
        self.counts
    }

    /// Adds `other` channel by channel.
    ///
    /// # Errors
    /// Returns [`Error::IndexOutOfRange`] if the two spectra have different
    /// lengths; `self` is left unchanged.
    pub fn accumulate(&mut self, other: &[i64]) -> Result<()> {
        if self.counts.len() != other.len() {
            return Err(Error::IndexOutOfRange(format!(
                "cannot add {} channels to a {}-channel spectrum",
                other.len(),
                self.counts.len()
            )));
        }
        for (acc, value) in self.counts.iter_mut().zip(other) {
            *acc += value;
        }
        Ok(())
    }
}

impl From<Vec<i64>> for Spectrum {
    fn from(counts: Vec<i64>) -> Self {
        Self::new(counts)
    }
}

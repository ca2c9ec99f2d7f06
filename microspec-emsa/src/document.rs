//! In-memory EMSA spectrum.

use crate::header::{
    DataType, Header, DATATYPE, DATE, FORMAT, NCOLUMNS, NPOINTS, OFFSET, OWNER, TIME, TITLE,
    VERSION, XPERCHAN, XUNITS, YUNITS,
};
use crate::{Error, Result};
use microspec_core::Spectrum;

pub const FORMAT_NAME: &str = "EMSA/MAS Spectral Data File";
pub const FORMAT_VERSION: &str = "1.0";

/// A spectrum with its header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Emsa {
    pub header: Header,
    pub x_data: Vec<f64>,
    pub y_data: Vec<f64>,
}

impl Emsa {
    /// Empty spectrum carrying only the format and version keywords.
    #[must_use]
    pub fn new() -> Self {
        let mut header = Header::new();
        header.set(FORMAT, FORMAT_NAME);
        header.set(VERSION, FORMAT_VERSION);
        Self {
            header,
            x_data: Vec::new(),
            y_data: Vec::new(),
        }
    }

    /// Wraps a cube spectrum as a `Y` data file with an energy axis of
    /// `offset + x_per_channel * channel`.
    ///
    /// `DATE`, `TIME` and `OWNER` are written empty; set them on
    /// [`Emsa::header`] when known.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_spectrum(title: &str, spectrum: &Spectrum, offset: f64, x_per_channel: f64) -> Self {
        let mut emsa = Self::new();
        let header = &mut emsa.header;
        header.set(TITLE, title);
        header.set(DATE, "");
        header.set(TIME, "");
        header.set(OWNER, "");
        header.set(NPOINTS, spectrum.len().to_string());
        header.set(NCOLUMNS, "1");
        header.set(XUNITS, "eV");
        header.set(YUNITS, "counts");
        header.set(DATATYPE, DataType::Y.as_str());
        header.set(XPERCHAN, x_per_channel.to_string());
        header.set(OFFSET, offset.to_string());

        emsa.x_data = channel_axis(spectrum.len(), offset, x_per_channel);
        emsa.y_data = spectrum.counts().iter().map(|&c| c as f64).collect();
        emsa
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.y_data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.y_data.is_empty()
    }

    /// `(x, y)` pairs.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x_data.iter().copied().zip(self.y_data.iter().copied())
    }

    /// Checks required keywords and that the data agrees with `NPOINTS`.
    ///
    /// # Errors
    /// Returns [`Error::MissingKeyword`] or [`Error::InvalidData`].
    pub fn validate(&self) -> Result<()> {
        self.header.check_required()?;
        self.header.data_type()?;

        if self.x_data.len() != self.y_data.len() {
            return Err(Error::InvalidData(format!(
                "{} x values but {} y values",
                self.x_data.len(),
                self.y_data.len()
            )));
        }
        let declared = self.header.count(NPOINTS)?;
        if declared != self.y_data.len() {
            return Err(Error::InvalidData(format!(
                "NPOINTS is {declared} but the data holds {} points",
                self.y_data.len()
            )));
        }
        Ok(())
    }
}

/// `offset + x_per_channel * i` for each channel.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn channel_axis(points: usize, offset: f64, x_per_channel: f64) -> Vec<f64> {
    (0..points)
        .map(|i| offset + x_per_channel * i as f64)
        .collect()
}

//! Sidecar layout descriptors (`.rpl` files).
//!
//! A raw map payload has no header of its own. Its companion text file
//! declares the cube dimensions and the element encoding, one
//! keyword/value pair per line. Two dialects exist:
//!
//! - **Bruker**: bare lowercase keywords (`width 1024`, `record-by vector`),
//!   matched case-insensitively.
//! - **Oxford**: `MLX::` namespaced keywords (`(MLX::WIDTH 512)`,
//!   `(MLX::DATA-TYPE : UNSIGNED)`), matched case-sensitively.
//!
//! Lines that match no keyword are ignored, so instruments may add fields
//! freely. Required fields are only checked when they are read (see
//! [`LayoutDescriptor::validate`] for the eager pass).

use crate::spectrum::CubeDims;
use crate::{Error, Result};
use log::{info, trace};
use std::fmt::Write as _;
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sidecar file dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Dialect {
    /// Bare lowercase keywords, case-insensitive.
    Bruker,
    /// `MLX::` keywords, case-sensitive.
    Oxford,
}

impl Dialect {
    /// Guesses the dialect from the sidecar text.
    #[must_use]
    pub fn detect(text: &str) -> Self {
        if text.contains("MLX::") {
            Dialect::Oxford
        } else {
            Dialect::Bruker
        }
    }

    fn rules(self) -> &'static [KeywordRule] {
        match self {
            Dialect::Bruker => BRUKER_KEYWORDS,
            Dialect::Oxford => OXFORD_KEYWORDS,
        }
    }

    fn is_case_sensitive(self) -> bool {
        matches!(self, Dialect::Oxford)
    }

    fn extract_value(self, line: &str, keyword: &str) -> String {
        match self {
            Dialect::Bruker => line
                .trim()
                .replace(keyword, "")
                .replace("mlx::", "")
                .replace(':', "")
                .trim()
                .to_string(),
            Dialect::Oxford => line.replace(keyword, "").trim().to_string(),
        }
    }
}

/// Declared sample encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataType {
    Signed,
    Unsigned,
    /// Any other text; rejected when the layout is resolved.
    Unknown(String),
}

impl DataType {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "signed" => DataType::Signed,
            "unsigned" => DataType::Unsigned,
            _ => DataType::Unknown(value.trim().to_string()),
        }
    }

    fn as_str(&self) -> &str {
        match self {
            DataType::Signed => "signed",
            DataType::Unsigned => "unsigned",
            DataType::Unknown(text) => text,
        }
    }
}

/// Declared byte order of the payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
    /// The instrument did not care; see [`crate::DontCareByteOrder`].
    DontCare,
    /// Any other text; rejected when the layout is resolved.
    Unknown(String),
}

impl ByteOrder {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "little-endian" => ByteOrder::LittleEndian,
            "big-endian" => ByteOrder::BigEndian,
            "dont-care" => ByteOrder::DontCare,
            _ => ByteOrder::Unknown(value.trim().to_string()),
        }
    }

    fn as_str(&self) -> &str {
        match self {
            ByteOrder::LittleEndian => "little-endian",
            ByteOrder::BigEndian => "big-endian",
            ByteOrder::DontCare => "dont-care",
            ByteOrder::Unknown(text) => text,
        }
    }
}

/// Physical ordering of the (row, column, channel) axes in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StorageOrder {
    /// Channel slowest: one full image per channel.
    Image,
    /// Channel fastest: one full spectrum per pixel.
    Vector,
    /// Any other text; rejected when a cube is opened.
    Unknown(String),
}

impl StorageOrder {
    /// Splits a `record-by` value into the order and its free-text label.
    fn parse(value: &str) -> (Self, Option<String>) {
        let lower = value.to_ascii_lowercase();
        let (order, word) = if lower.contains("image") {
            (StorageOrder::Image, "image")
        } else if lower.contains("vector") {
            (StorageOrder::Vector, "vector")
        } else {
            return (StorageOrder::Unknown(value.trim().to_string()), None);
        };

        let label = lower.find(word).map(|start| {
            let mut rest = String::with_capacity(value.len());
            rest.push_str(&value[..start]);
            rest.push_str(&value[start + word.len()..]);
            rest.trim().trim_matches('"').trim().to_string()
        });
        (order, label.filter(|label| !label.is_empty()))
    }

    fn as_str(&self) -> &str {
        match self {
            StorageOrder::Image => "image",
            StorageOrder::Vector => "vector",
            StorageOrder::Unknown(text) => text,
        }
    }
}

/// Fields a sidecar keyword can set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Width,
    Height,
    Depth,
    Offset,
    DataLength,
    DataType,
    ByteOrder,
    RecordBy,
    AcceleratingVoltage,
    PixelSize,
}

impl Field {
    fn name(self) -> &'static str {
        match self {
            Field::Width => KEY_WIDTH,
            Field::Height => KEY_HEIGHT,
            Field::Depth => KEY_DEPTH,
            Field::Offset => KEY_OFFSET,
            Field::DataLength => KEY_DATA_LENGTH,
            Field::DataType => KEY_DATA_TYPE,
            Field::ByteOrder => KEY_BYTE_ORDER,
            Field::RecordBy => KEY_RECORD_BY,
            Field::AcceleratingVoltage => KEY_ACCELERATING_VOLTAGE,
            Field::PixelSize => KEY_PIXEL_SIZE,
        }
    }

    fn apply(self, descriptor: &mut LayoutDescriptor, value: &str) -> Result<()> {
        match self {
            Field::Width => descriptor.width = Some(parse_usize(self, value)?),
            Field::Height => descriptor.height = Some(parse_usize(self, value)?),
            Field::Depth => descriptor.depth = Some(parse_usize(self, value)?),
            Field::Offset => descriptor.offset = Some(parse_usize(self, value)?),
            Field::DataLength => descriptor.data_length = Some(parse_usize(self, value)?),
            Field::DataType => descriptor.data_type = Some(DataType::parse(value)),
            Field::ByteOrder => descriptor.byte_order = Some(ByteOrder::parse(value)),
            Field::RecordBy => {
                let (order, label) = StorageOrder::parse(value);
                descriptor.storage_order = Some(order);
                descriptor.storage_label = label;
            }
            Field::AcceleratingVoltage => {
                descriptor.accelerating_voltage_kv = Some(parse_f64(self, value)?);
            }
            Field::PixelSize => descriptor.pixel_size_nm = Some(parse_f64(self, value)?),
        }
        Ok(())
    }

    fn render(self, descriptor: &LayoutDescriptor, dialect: Dialect) -> Option<String> {
        // Oxford writes enumerated words in upper case.
        let word = |text: &str| match dialect {
            Dialect::Bruker => text.to_string(),
            Dialect::Oxford => text.to_uppercase(),
        };
        match self {
            Field::Width => descriptor.width.map(|v| v.to_string()),
            Field::Height => descriptor.height.map(|v| v.to_string()),
            Field::Depth => descriptor.depth.map(|v| v.to_string()),
            Field::Offset => descriptor.offset.map(|v| v.to_string()),
            Field::DataLength => descriptor.data_length.map(|v| v.to_string()),
            Field::DataType => descriptor.data_type.as_ref().map(|v| word(v.as_str())),
            Field::ByteOrder => descriptor.byte_order.as_ref().map(|v| word(v.as_str())),
            Field::RecordBy => descriptor.storage_order.as_ref().map(|order| {
                match &descriptor.storage_label {
                    Some(label) => format!("{} \"{label}\"", word(order.as_str())),
                    None => word(order.as_str()),
                }
            }),
            Field::AcceleratingVoltage => descriptor.accelerating_voltage_kv.map(|v| v.to_string()),
            Field::PixelSize => descriptor.pixel_size_nm.map(|v| v.to_string()),
        }
    }
}

const KEY_WIDTH: &str = "width";
const KEY_HEIGHT: &str = "height";
const KEY_DEPTH: &str = "depth";
const KEY_OFFSET: &str = "offset";
const KEY_DATA_LENGTH: &str = "data-length";
const KEY_DATA_TYPE: &str = "data-type";
const KEY_BYTE_ORDER: &str = "byte-order";
const KEY_RECORD_BY: &str = "record-by";
const KEY_ACCELERATING_VOLTAGE: &str = "E0_kV";
const KEY_PIXEL_SIZE: &str = "px_size_nm";

struct KeywordRule {
    keyword: &'static str,
    field: Field,
}

const BRUKER_KEYWORDS: &[KeywordRule] = &[
    KeywordRule { keyword: KEY_WIDTH, field: Field::Width },
    KeywordRule { keyword: KEY_HEIGHT, field: Field::Height },
    KeywordRule { keyword: KEY_DEPTH, field: Field::Depth },
    KeywordRule { keyword: KEY_OFFSET, field: Field::Offset },
    KeywordRule { keyword: KEY_DATA_LENGTH, field: Field::DataLength },
    KeywordRule { keyword: KEY_DATA_TYPE, field: Field::DataType },
    KeywordRule { keyword: KEY_BYTE_ORDER, field: Field::ByteOrder },
    KeywordRule { keyword: KEY_RECORD_BY, field: Field::RecordBy },
    KeywordRule { keyword: KEY_ACCELERATING_VOLTAGE, field: Field::AcceleratingVoltage },
    KeywordRule { keyword: KEY_PIXEL_SIZE, field: Field::PixelSize },
];

const OXFORD_KEYWORDS: &[KeywordRule] = &[
    KeywordRule { keyword: "MLX::WIDTH", field: Field::Width },
    KeywordRule { keyword: "MLX::HEIGHT", field: Field::Height },
    KeywordRule { keyword: "MLX::DEPTH", field: Field::Depth },
    KeywordRule { keyword: "MLX::OFFSET", field: Field::Offset },
    KeywordRule { keyword: "MLX::DATA-LENGTH", field: Field::DataLength },
    KeywordRule { keyword: "MLX::DATA-TYPE :", field: Field::DataType },
    KeywordRule { keyword: "MLX::BYTE-ORDER :", field: Field::ByteOrder },
    KeywordRule { keyword: "MLX::RECORD-BY :", field: Field::RecordBy },
];

fn parse_usize(field: Field, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidDescriptorValue {
            key: field.name(),
            value: value.to_string(),
        })
}

fn parse_f64(field: Field, value: &str) -> Result<f64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidDescriptorValue {
            key: field.name(),
            value: value.to_string(),
        })
}

/// Layout of a raw map payload, as declared by its sidecar file.
///
/// Every field is optional until read; the accessor methods turn an unset
/// required field into [`Error::MissingDescriptorKey`].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LayoutDescriptor {
    /// Number of columns.
    pub width: Option<usize>,
    /// Number of rows.
    pub height: Option<usize>,
    /// Number of channels.
    pub depth: Option<usize>,
    /// Byte offset of the first sample in the payload file.
    pub offset: Option<usize>,
    /// Sample width in bytes.
    pub data_length: Option<usize>,
    pub data_type: Option<DataType>,
    pub byte_order: Option<ByteOrder>,
    pub storage_order: Option<StorageOrder>,
    /// Free text following the storage order (e.g. `Site of Interest 1`).
    pub storage_label: Option<String>,
    /// Beam energy in kV (Bruker only).
    pub accelerating_voltage_kv: Option<f64>,
    /// Pixel size in nm (Bruker only).
    pub pixel_size_nm: Option<f64>,
}

impl LayoutDescriptor {
    /// Parses sidecar text in the given dialect.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptorValue`] if a recognized numeric key
    /// carries a value that is not a number. Missing keys are not errors here.
    pub fn parse(text: &str, dialect: Dialect) -> Result<Self> {
        let mut descriptor = Self::default();

        for raw_line in text.lines() {
            let stripped: String = raw_line.chars().filter(|c| !matches!(c, '(' | ')')).collect();
            let line = if dialect.is_case_sensitive() {
                stripped
            } else {
                stripped.to_lowercase()
            };

            let mut matched = false;
            for rule in dialect.rules() {
                let keyword = if dialect.is_case_sensitive() {
                    rule.keyword.to_string()
                } else {
                    rule.keyword.to_lowercase()
                };
                if line.contains(&keyword) {
                    let value = dialect.extract_value(&line, &keyword);
                    rule.field.apply(&mut descriptor, &value)?;
                    matched = true;
                }
            }

            if !matched && !line.trim().is_empty() {
                trace!("Ignoring sidecar line: {raw_line:?}");
            }
        }

        Ok(descriptor)
    }

    /// Parses sidecar text, detecting the dialect from its content.
    ///
    /// # Errors
    /// See [`LayoutDescriptor::parse`].
    pub fn parse_detect(text: &str) -> Result<Self> {
        Self::parse(text, Dialect::detect(text))
    }

    /// Reads and parses a sidecar file.
    ///
    /// With `dialect` unset the dialect is detected from the file content.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or a value is malformed.
    pub fn read_file<P: AsRef<Path>>(path: P, dialect: Option<Dialect>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let dialect = dialect.unwrap_or_else(|| Dialect::detect(&text));
        info!("Reading {dialect:?} sidecar file: {}", path.display());
        Self::parse(&text, dialect)
    }

    /// Renders the set fields as sidecar text in the given dialect.
    ///
    /// Fields the dialect has no keyword for are skipped.
    #[must_use]
    pub fn to_sidecar(&self, dialect: Dialect) -> String {
        let mut text = String::new();
        for rule in dialect.rules() {
            let Some(value) = rule.field.render(self, dialect) else {
                continue;
            };
            // Writing into a String cannot fail.
            let _ = match dialect {
                Dialect::Bruker => writeln!(text, "{:>12} \t {value}", rule.keyword),
                Dialect::Oxford => writeln!(text, "({} {value})", rule.keyword),
            };
        }
        text
    }

    /// Writes the sidecar text to `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write_sidecar<P: AsRef<Path>>(&self, path: P, dialect: Dialect) -> Result<()> {
        let path = path.as_ref();
        info!("Writing {dialect:?} sidecar file: {}", path.display());
        std::fs::write(path, self.to_sidecar(dialect))?;
        Ok(())
    }

    /// Number of columns.
    ///
    /// # Errors
    /// Returns [`Error::MissingDescriptorKey`] if unset.
    pub fn width(&self) -> Result<usize> {
        self.width.ok_or(Error::MissingDescriptorKey(KEY_WIDTH))
    }

    /// Number of rows.
    ///
    /// # Errors
    /// Returns [`Error::MissingDescriptorKey`] if unset.
    pub fn height(&self) -> Result<usize> {
        self.height.ok_or(Error::MissingDescriptorKey(KEY_HEIGHT))
    }

    /// Number of channels.
    ///
    /// # Errors
    /// Returns [`Error::MissingDescriptorKey`] if unset.
    pub fn depth(&self) -> Result<usize> {
        self.depth.ok_or(Error::MissingDescriptorKey(KEY_DEPTH))
    }

    /// Payload byte offset.
    ///
    /// # Errors
    /// Returns [`Error::MissingDescriptorKey`] if unset.
    pub fn offset(&self) -> Result<usize> {
        self.offset.ok_or(Error::MissingDescriptorKey(KEY_OFFSET))
    }

    /// Sample width in bytes.
    ///
    /// # Errors
    /// Returns [`Error::MissingDescriptorKey`] if unset.
    pub fn data_length(&self) -> Result<usize> {
        self.data_length
            .ok_or(Error::MissingDescriptorKey(KEY_DATA_LENGTH))
    }

    /// Declared sample signedness.
    ///
    /// # Errors
    /// Returns [`Error::MissingDescriptorKey`] if unset.
    pub fn data_type(&self) -> Result<&DataType> {
        self.data_type
            .as_ref()
            .ok_or(Error::MissingDescriptorKey(KEY_DATA_TYPE))
    }

    /// Declared storage order.
    ///
    /// # Errors
    /// Returns [`Error::MissingDescriptorKey`] if unset.
    pub fn storage_order(&self) -> Result<&StorageOrder> {
        self.storage_order
            .as_ref()
            .ok_or(Error::MissingDescriptorKey(KEY_RECORD_BY))
    }

    /// Cube dimensions.
    ///
    /// # Errors
    /// Returns [`Error::MissingDescriptorKey`] if a dimension is unset and
    /// [`Error::UnsupportedLayout`] if one is zero.
    pub fn dims(&self) -> Result<CubeDims> {
        CubeDims::new(self.width()?, self.height()?, self.depth()?)
    }

    /// Eagerly checks that every key needed to read a cube is present.
    ///
    /// # Errors
    /// Returns the first [`Error::MissingDescriptorKey`] found, or
    /// [`Error::UnsupportedLayout`] for zero dimensions.
    pub fn validate(&self) -> Result<()> {
        self.dims()?;
        self.offset()?;
        self.data_length()?;
        self.data_type()?;
        self.storage_order()?;
        Ok(())
    }

    /// Expected payload length in bytes, counting the leading offset.
    ///
    /// # Errors
    /// Returns an error if a required key is missing, or
    /// [`Error::UnsupportedLayout`] if the byte count overflows `usize`.
    pub fn expected_file_len(&self) -> Result<usize> {
        let dims = self.dims()?;
        let offset = self.offset()?;
        let data_length = self.data_length()?;
        dims.sample_count()
            .checked_mul(data_length)
            .and_then(|bytes| bytes.checked_add(offset))
            .ok_or_else(|| {
                Error::UnsupportedLayout(format!(
                    "{} samples of {data_length} bytes after offset {offset} is not addressable",
                    dims.sample_count()
                ))
            })
    }
}

//! Element format resolution and decoding.
//!
//! A descriptor's `data-length`, `data-type` and `byte-order` together name
//! one concrete integer encoding. [`resolve`] turns them into an
//! [`ElementFormat`] once, so readers never re-interpret the descriptor on
//! the hot path.

use crate::descriptor::{ByteOrder, DataType, LayoutDescriptor};
use crate::{Error, Result};
use log::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Whether samples carry a sign bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signedness {
    Signed,
    Unsigned,
}

/// Concrete byte order of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Byte order of the host.
    #[must_use]
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }
}

/// How to decode multi-byte samples declared `dont-care`.
///
/// Instruments that write `dont-care` are little-endian in practice, so the
/// default ignores the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DontCareByteOrder {
    #[default]
    Little,
    /// Follow the byte order of the host.
    Native,
}

impl DontCareByteOrder {
    #[must_use]
    pub fn endianness(self) -> Endianness {
        match self {
            DontCareByteOrder::Little => Endianness::Little,
            DontCareByteOrder::Native => Endianness::native(),
        }
    }
}

/// Supported integer sample types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
}

impl SampleKind {
    /// Picks the sample type for a byte width and signedness.
    #[must_use]
    pub fn from_parts(width: usize, signedness: Signedness) -> Option<Self> {
        match (width, signedness) {
            (1, Signedness::Signed) => Some(SampleKind::I8),
            (1, Signedness::Unsigned) => Some(SampleKind::U8),
            (2, Signedness::Signed) => Some(SampleKind::I16),
            (2, Signedness::Unsigned) => Some(SampleKind::U16),
            (4, Signedness::Signed) => Some(SampleKind::I32),
            (4, Signedness::Unsigned) => Some(SampleKind::U32),
            _ => None,
        }
    }

    /// Width in bytes.
    #[must_use]
    pub fn width(self) -> usize {
        match self {
            SampleKind::I8 | SampleKind::U8 => 1,
            SampleKind::I16 | SampleKind::U16 => 2,
            SampleKind::I32 | SampleKind::U32 => 4,
        }
    }

    #[must_use]
    pub fn signedness(self) -> Signedness {
        match self {
            SampleKind::I8 | SampleKind::I16 | SampleKind::I32 => Signedness::Signed,
            SampleKind::U8 | SampleKind::U16 | SampleKind::U32 => Signedness::Unsigned,
        }
    }
}

/// A fully resolved sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementFormat {
    kind: SampleKind,
    endianness: Endianness,
}

impl ElementFormat {
    #[must_use]
    pub fn new(kind: SampleKind, endianness: Endianness) -> Self {
        Self { kind, endianness }
    }

    #[must_use]
    pub fn kind(&self) -> SampleKind {
        self.kind
    }

    /// Sample width in bytes.
    #[must_use]
    pub fn width(&self) -> usize {
        self.kind.width()
    }

    #[must_use]
    pub fn signedness(&self) -> Signedness {
        self.kind.signedness()
    }

    #[must_use]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Decodes `out.len()` consecutive samples from `bytes`, widening to `i64`.
    ///
    /// `bytes` must hold exactly `out.len() * self.width()` bytes; extra
    /// trailing bytes are ignored.
    pub fn decode_into(&self, bytes: &[u8], out: &mut [i64]) {
        debug_assert!(bytes.len() >= out.len() * self.width());
        let little = self.endianness == Endianness::Little;
        match self.kind {
            SampleKind::I8 => decode_with::<1>(bytes, out, |b| i64::from(i8::from_le_bytes(b))),
            SampleKind::U8 => decode_with::<1>(bytes, out, |b| i64::from(b[0])),
            SampleKind::I16 if little => {
                decode_with::<2>(bytes, out, |b| i64::from(i16::from_le_bytes(b)));
            }
            SampleKind::I16 => decode_with::<2>(bytes, out, |b| i64::from(i16::from_be_bytes(b))),
            SampleKind::U16 if little => {
                decode_with::<2>(bytes, out, |b| i64::from(u16::from_le_bytes(b)));
            }
            SampleKind::U16 => decode_with::<2>(bytes, out, |b| i64::from(u16::from_be_bytes(b))),
            SampleKind::I32 if little => {
                decode_with::<4>(bytes, out, |b| i64::from(i32::from_le_bytes(b)));
            }
            SampleKind::I32 => decode_with::<4>(bytes, out, |b| i64::from(i32::from_be_bytes(b))),
            SampleKind::U32 if little => {
                decode_with::<4>(bytes, out, |b| i64::from(u32::from_le_bytes(b)));
            }
            SampleKind::U32 => decode_with::<4>(bytes, out, |b| i64::from(u32::from_be_bytes(b))),
        }
    }
}

#[inline]
fn decode_with<const N: usize>(bytes: &[u8], out: &mut [i64], convert: impl Fn([u8; N]) -> i64) {
    for (chunk, slot) in bytes.chunks_exact(N).zip(out.iter_mut()) {
        let mut raw = [0u8; N];
        raw.copy_from_slice(chunk);
        *slot = convert(raw);
    }
}

/// Resolves the element format, decoding `dont-care` as little-endian.
///
/// # Errors
/// See [`resolve_with`].
pub fn resolve(descriptor: &LayoutDescriptor) -> Result<ElementFormat> {
    resolve_with(descriptor, DontCareByteOrder::default())
}

/// Resolves the element format with an explicit `dont-care` policy.
///
/// A missing `byte-order` key is treated as `dont-care`.
///
/// # Errors
/// Returns [`Error::MissingDescriptorKey`] if `data-length` or `data-type`
/// is unset, and [`Error::UnsupportedLayout`] for a width other than 1, 2
/// or 4 bytes or an unrecognized type or byte order.
pub fn resolve_with(
    descriptor: &LayoutDescriptor,
    policy: DontCareByteOrder,
) -> Result<ElementFormat> {
    let width = descriptor.data_length()?;
    let signedness = match descriptor.data_type()? {
        DataType::Signed => Signedness::Signed,
        DataType::Unsigned => Signedness::Unsigned,
        DataType::Unknown(text) => {
            return Err(Error::UnsupportedLayout(format!("data type {text:?}")));
        }
    };

    let kind = SampleKind::from_parts(width, signedness).ok_or_else(|| {
        Error::UnsupportedLayout(format!("{width}-byte {signedness:?} samples"))
    })?;

    let endianness = match &descriptor.byte_order {
        Some(ByteOrder::LittleEndian) => Endianness::Little,
        Some(ByteOrder::BigEndian) => Endianness::Big,
        Some(ByteOrder::DontCare) | None => policy.endianness(),
        Some(ByteOrder::Unknown(text)) => {
            return Err(Error::UnsupportedLayout(format!("byte order {text:?}")));
        }
    };

    let format = ElementFormat::new(kind, endianness);
    debug!("Resolved element format: {kind:?} {endianness:?}");
    Ok(format)
}

//! Packed little-endian record layouts.
//!
//! VeriCold files are C structs written byte for byte with no alignment
//! padding. Each struct is described by a static [`RecordLayout`]: an
//! ordered list of named fields with fixed sizes and a declared total size.
//! A layout is checked once when a reader is built; decoding then walks the
//! fields at their cumulative offsets.

use crate::{Error, Result};
use microspec_core::Error as CoreError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Primitive type of one packed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Raw bytes (fixed-length strings, opaque blocks).
    Bytes(usize),
    I16,
    U16,
    I32,
    U32,
    I64,
    F32,
    F64,
    I32Array(usize),
    F32Array(usize),
    /// Skipped padding.
    Pad(usize),
}

impl FieldKind {
    /// Size of the field in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            FieldKind::Bytes(n) | FieldKind::Pad(n) => n,
            FieldKind::I16 | FieldKind::U16 => 2,
            FieldKind::I32 | FieldKind::U32 | FieldKind::F32 => 4,
            FieldKind::I64 | FieldKind::F64 => 8,
            FieldKind::I32Array(n) | FieldKind::F32Array(n) => 4 * n,
        }
    }
}

/// A named field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// A packed struct with a declared total size.
#[derive(Debug, Clone, Copy)]
pub struct RecordLayout {
    pub name: &'static str,
    pub size: usize,
    pub fields: &'static [FieldSpec],
}

impl RecordLayout {
    /// Sum of the field sizes.
    #[must_use]
    pub const fn consumed(&self) -> usize {
        let mut total = 0;
        let mut i = 0;
        while i < self.fields.len() {
            total += self.fields[i].kind.size();
            i += 1;
        }
        total
    }

    /// Verifies that the fields add up to the declared size.
    ///
    /// # Errors
    /// Returns [`Error::MalformedHeader`] on a mismatch.
    pub fn check(&self) -> Result<()> {
        let consumed = self.consumed();
        if consumed != self.size {
            return Err(Error::MalformedHeader(format!(
                "{} layout consumes {consumed} bytes, declared {}",
                self.name, self.size
            )));
        }
        Ok(())
    }

    /// Byte offset of a field.
    #[must_use]
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let mut offset = 0;
        for field in self.fields {
            if field.name == name {
                return Some(offset);
            }
            offset += field.kind.size();
        }
        None
    }

    /// Decodes the first [`RecordLayout::size`] bytes of `bytes`.
    ///
    /// # Errors
    /// Returns a truncation error if `bytes` is shorter than the record.
    pub fn decode(&self, bytes: &[u8]) -> Result<PackedRecord> {
        if bytes.len() < self.size {
            return Err(CoreError::truncated(0, self.size, bytes.len()).into());
        }

        let mut values = Vec::with_capacity(self.fields.len());
        let mut offset = 0;
        for field in self.fields {
            let end = offset + field.kind.size();
            let raw = &bytes[offset..end];
            if let Some(value) = decode_field(field.kind, raw) {
                values.push((field.name, value));
            }
            offset = end;
        }

        Ok(PackedRecord {
            layout: self.name,
            values,
        })
    }
}

fn le<const N: usize>(raw: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&raw[..N]);
    out
}

fn decode_field(kind: FieldKind, raw: &[u8]) -> Option<Value> {
    let value = match kind {
        FieldKind::Pad(_) => return None,
        FieldKind::Bytes(_) => Value::Bytes(raw.to_vec()),
        FieldKind::I16 => Value::Int(i64::from(i16::from_le_bytes(le(raw)))),
        FieldKind::U16 => Value::Int(i64::from(u16::from_le_bytes(le(raw)))),
        FieldKind::I32 => Value::Int(i64::from(i32::from_le_bytes(le(raw)))),
        FieldKind::U32 => Value::Int(i64::from(u32::from_le_bytes(le(raw)))),
        FieldKind::I64 => Value::Int(i64::from_le_bytes(le(raw))),
        FieldKind::F32 => Value::Float(f64::from(f32::from_le_bytes(le(raw)))),
        FieldKind::F64 => Value::Float(f64::from_le_bytes(le(raw))),
        FieldKind::I32Array(_) => Value::IntArray(
            raw.chunks_exact(4)
                .map(|c| i64::from(i32::from_le_bytes(le(c))))
                .collect(),
        ),
        FieldKind::F32Array(_) => Value::FloatArray(
            raw.chunks_exact(4)
                .map(|c| f64::from(f32::from_le_bytes(le(c))))
                .collect(),
        ),
    };
    Some(value)
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    Bytes(Vec<u8>),
    Int(i64),
    Float(f64),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
}

/// A decoded record: field values in layout order, padding omitted.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedRecord {
    layout: &'static str,
    values: Vec<(&'static str, Value)>,
}

impl PackedRecord {
    /// Name of the layout the record was decoded with.
    #[must_use]
    pub fn layout_name(&self) -> &'static str {
        self.layout
    }

    /// All `(name, value)` pairs in layout order.
    #[must_use]
    pub fn values(&self) -> &[(&'static str, Value)] {
        &self.values
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    fn field_error(&self, name: &str, expected: &str) -> Error {
        Error::MalformedHeader(format!("{}: no {expected} field {name:?}", self.layout))
    }

    /// Integer field converted to `T`.
    ///
    /// # Errors
    /// Returns [`Error::MalformedHeader`] if the field is absent, not an
    /// integer, or out of range for `T`.
    pub fn int<T: TryFrom<i64>>(&self, name: &str) -> Result<T> {
        match self.get(name) {
            Some(Value::Int(v)) => T::try_from(*v).map_err(|_| {
                Error::MalformedHeader(format!("{}: field {name:?} = {v} out of range", self.layout))
            }),
            _ => Err(self.field_error(name, "integer")),
        }
    }

    /// Floating-point field.
    ///
    /// # Errors
    /// Returns [`Error::MalformedHeader`] if absent or not a float.
    pub fn float(&self, name: &str) -> Result<f64> {
        match self.get(name) {
            Some(Value::Float(v)) => Ok(*v),
            _ => Err(self.field_error(name, "float")),
        }
    }

    /// Raw bytes field.
    ///
    /// # Errors
    /// Returns [`Error::MalformedHeader`] if absent or not bytes.
    pub fn bytes(&self, name: &str) -> Result<&[u8]> {
        match self.get(name) {
            Some(Value::Bytes(v)) => Ok(v),
            _ => Err(self.field_error(name, "bytes")),
        }
    }

    /// Bytes field read as a NUL-terminated string.
    ///
    /// # Errors
    /// Returns [`Error::MalformedHeader`] if absent or not bytes.
    pub fn text(&self, name: &str) -> Result<String> {
        let raw = self.bytes(name)?;
        let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).trim_end().to_string())
    }

    /// Float array field.
    ///
    /// # Errors
    /// Returns [`Error::MalformedHeader`] if absent or not a float array.
    pub fn float_array(&self, name: &str) -> Result<&[f64]> {
        match self.get(name) {
            Some(Value::FloatArray(v)) => Ok(v),
            _ => Err(self.field_error(name, "float array")),
        }
    }

    /// Integer array field.
    ///
    /// # Errors
    /// Returns [`Error::MalformedHeader`] if absent or not an integer array.
    pub fn int_array(&self, name: &str) -> Result<&[i64]> {
        match self.get(name) {
            Some(Value::IntArray(v)) => Ok(v),
            _ => Err(self.field_error(name, "integer array")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FIELDS: &[FieldSpec] = &[
        FieldSpec::new("tag", FieldKind::Bytes(4)),
        FieldSpec::new("count", FieldKind::I32),
        FieldSpec::new("pad", FieldKind::Pad(2)),
        FieldSpec::new("flags", FieldKind::U16),
        FieldSpec::new("gain", FieldKind::F64),
        FieldSpec::new("res", FieldKind::F32Array(2)),
    ];

    const SAMPLE: RecordLayout = RecordLayout {
        name: "sample",
        size: 28,
        fields: SAMPLE_FIELDS,
    };

    fn sample_bytes() -> Vec<u8> {
        let mut bytes = b"AB\0\0".to_vec();
        bytes.extend((-7i32).to_le_bytes());
        bytes.extend([0xEE, 0xEE]);
        bytes.extend(0xBEEFu16.to_le_bytes());
        bytes.extend(2.5f64.to_le_bytes());
        bytes.extend(1.0f32.to_le_bytes());
        bytes.extend(0.5f32.to_le_bytes());
        bytes
    }

    #[test]
    fn test_check_and_offsets() {
        assert_eq!(SAMPLE.consumed(), 28);
        assert!(SAMPLE.check().is_ok());
        assert_eq!(SAMPLE.offset_of("flags"), Some(10));
        assert_eq!(SAMPLE.offset_of("res"), Some(20));
        assert_eq!(SAMPLE.offset_of("missing"), None);

        let bad = RecordLayout {
            size: 30,
            ..SAMPLE
        };
        assert!(matches!(bad.check(), Err(Error::MalformedHeader(_))));
    }

    #[test]
    fn test_decode() {
        let record = SAMPLE.decode(&sample_bytes()).unwrap();
        assert_eq!(record.layout_name(), "sample");
        assert_eq!(record.text("tag").unwrap(), "AB");
        assert_eq!(record.int::<i32>("count").unwrap(), -7);
        assert_eq!(record.int::<u16>("flags").unwrap(), 0xBEEF);
        assert!((record.float("gain").unwrap() - 2.5).abs() < f64::EPSILON);
        assert_eq!(record.float_array("res").unwrap(), &[1.0, 0.5]);
        // Padding is not exposed.
        assert_eq!(record.values().len(), 5);
        assert!(record.get("pad").is_none());
    }

    #[test]
    fn test_typed_access_errors() {
        let record = SAMPLE.decode(&sample_bytes()).unwrap();
        assert!(record.int::<usize>("count").is_err());
        assert!(record.float("count").is_err());
        assert!(record.int::<i32>("nope").is_err());
    }

    #[test]
    fn test_decode_short_input() {
        let err = SAMPLE.decode(&[0u8; 10]).unwrap_err();
        assert!(err.is_truncated());
    }
}

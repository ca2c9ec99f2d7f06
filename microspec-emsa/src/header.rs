//! EMSA header keywords and the ordered keyword/value store.

use crate::{Error, Result};

pub const FORMAT: &str = "FORMAT";
pub const VERSION: &str = "VERSION";
pub const TITLE: &str = "TITLE";
pub const DATE: &str = "DATE";
pub const TIME: &str = "TIME";
pub const OWNER: &str = "OWNER";
pub const NPOINTS: &str = "NPOINTS";
pub const NCOLUMNS: &str = "NCOLUMNS";
pub const XUNITS: &str = "XUNITS";
pub const YUNITS: &str = "YUNITS";
pub const DATATYPE: &str = "DATATYPE";
pub const XPERCHAN: &str = "XPERCHAN";
pub const OFFSET: &str = "OFFSET";

pub const SPECTRUM: &str = "SPECTRUM";
pub const ENDOFDATA: &str = "ENDOFDATA";
pub const CHECKSUM: &str = "CHECKSUM";

pub const SIGNALTYPE: &str = "SIGNALTYPE";
pub const BEAMKV: &str = "BEAMKV";
pub const LIVETIME: &str = "LIVETIME";
pub const REALTIME: &str = "REALTIME";

/// Keywords every valid file carries, in the order they are written.
pub const REQUIRED_KEYWORDS: [&str; 13] = [
    FORMAT, VERSION, TITLE, DATE, TIME, OWNER, NPOINTS, NCOLUMNS, XUNITS, YUNITS, DATATYPE,
    XPERCHAN, OFFSET,
];

/// Sentinels that delimit the data section. They never live in the header.
pub(crate) const SECTION_KEYWORDS: [&str; 3] = [SPECTRUM, ENDOFDATA, CHECKSUM];

/// How the data section stores its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Y values only; x is `OFFSET + XPERCHAN * i`.
    Y,
    /// Explicit `x, y` pairs.
    Xy,
}

impl DataType {
    /// Parses the `DATATYPE` value, case-insensitively.
    ///
    /// # Errors
    /// Returns [`Error::InvalidData`] for anything other than `Y` or `XY`.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "Y" => Ok(Self::Y),
            "XY" => Ok(Self::Xy),
            other => Err(Error::InvalidData(format!("unknown DATATYPE '{other}'"))),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Y => "Y",
            Self::Xy => "XY",
        }
    }
}

/// One `#KEYWORD -unit: value` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    /// Upper-case keyword.
    pub keyword: String,
    pub value: String,
    pub unit: Option<String>,
}

/// Header entries in file order. Keywords are unique and upper-case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    entries: Vec<HeaderEntry>,
}

impl Header {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entry(&self, keyword: &str) -> Option<&HeaderEntry> {
        self.entries
            .iter()
            .find(|e| e.keyword.eq_ignore_ascii_case(keyword))
    }

    #[must_use]
    pub fn contains(&self, keyword: &str) -> bool {
        self.entry(keyword).is_some()
    }

    /// Raw value text of `keyword`.
    #[must_use]
    pub fn get(&self, keyword: &str) -> Option<&str> {
        self.entry(keyword).map(|e| e.value.as_str())
    }

    /// Unit comment of `keyword`, if it carried one.
    #[must_use]
    pub fn unit(&self, keyword: &str) -> Option<&str> {
        self.entry(keyword).and_then(|e| e.unit.as_deref())
    }

    /// Sets `keyword`, replacing an existing entry in place.
    pub fn set(&mut self, keyword: &str, value: impl Into<String>) {
        self.insert(keyword, value.into(), None);
    }

    /// Sets `keyword` together with its unit comment.
    pub fn set_with_unit(&mut self, keyword: &str, value: impl Into<String>, unit: &str) {
        self.insert(keyword, value.into(), Some(unit.to_string()));
    }

    /// Removes `keyword` and returns its entry.
    pub fn remove(&mut self, keyword: &str) -> Option<HeaderEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.keyword.eq_ignore_ascii_case(keyword))?;
        Some(self.entries.remove(index))
    }

    fn insert(&mut self, keyword: &str, value: String, unit: Option<String>) {
        let keyword = keyword.to_ascii_uppercase();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.keyword == keyword) {
            entry.value = value;
            entry.unit = unit;
        } else {
            self.entries.push(HeaderEntry {
                keyword,
                value,
                unit,
            });
        }
    }

    /// Value of a required keyword.
    ///
    /// # Errors
    /// Returns [`Error::MissingKeyword`] if absent.
    pub fn require(&self, keyword: &str) -> Result<&str> {
        self.get(keyword)
            .ok_or_else(|| Error::MissingKeyword(keyword.to_string()))
    }

    /// Value of `keyword` as a real number.
    ///
    /// # Errors
    /// Returns [`Error::MissingKeyword`] if absent or [`Error::InvalidData`]
    /// if the value is not numeric.
    pub fn number(&self, keyword: &str) -> Result<f64> {
        let value = self.require(keyword)?;
        value
            .trim()
            .parse()
            .map_err(|_| Error::InvalidData(format!("{keyword}: '{value}' is not a number")))
    }

    /// Value of `keyword` as a count. Accepts `1024` as well as `1024.`.
    ///
    /// # Errors
    /// Returns [`Error::MissingKeyword`] if absent or [`Error::InvalidData`]
    /// if the value is not a non-negative whole number.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn count(&self, keyword: &str) -> Result<usize> {
        let number = self.number(keyword)?;
        if !number.is_finite() || number < 0.0 || number.fract() > 0.0 {
            return Err(Error::InvalidData(format!(
                "{keyword}: {number} is not a whole count"
            )));
        }
        Ok(number as usize)
    }

    /// The `DATATYPE` value.
    ///
    /// # Errors
    /// Returns [`Error::MissingKeyword`] or [`Error::InvalidData`].
    pub fn data_type(&self) -> Result<DataType> {
        DataType::parse(self.require(DATATYPE)?)
    }

    /// Checks that all [`REQUIRED_KEYWORDS`] are present.
    ///
    /// # Errors
    /// Returns [`Error::MissingKeyword`] naming the first absent keyword.
    pub fn check_required(&self) -> Result<()> {
        for keyword in REQUIRED_KEYWORDS {
            self.require(keyword)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut header = Header::new();
        header.set("title", "first");
        header.set(OWNER, "someone");
        header.set_with_unit(TITLE, "second", "x");
        assert_eq!(header.len(), 2);
        assert_eq!(header.iter().next().unwrap().keyword, "TITLE");
        assert_eq!(header.get("Title"), Some("second"));
        assert_eq!(header.unit(TITLE), Some("x"));
        assert!(header.remove(OWNER).is_some());
        assert!(!header.contains(OWNER));
    }

    #[test]
    fn test_numeric_values() {
        let mut header = Header::new();
        header.set(NPOINTS, "1024.");
        header.set(OFFSET, "-20.5");
        header.set(NCOLUMNS, "1.5");
        assert_eq!(header.count(NPOINTS).unwrap(), 1024);
        assert!((header.number(OFFSET).unwrap() + 20.5).abs() < f64::EPSILON);
        assert!(matches!(header.count(NCOLUMNS), Err(Error::InvalidData(_))));
        assert!(matches!(
            header.number(XPERCHAN),
            Err(Error::MissingKeyword(_))
        ));
    }

    #[test]
    fn test_data_type() {
        assert_eq!(DataType::parse("xy").unwrap(), DataType::Xy);
        assert_eq!(DataType::parse(" Y ").unwrap(), DataType::Y);
        assert!(DataType::parse("XYZ").is_err());
    }
}

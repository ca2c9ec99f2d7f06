//! Map reader configuration.

use crate::{Error, Result};
use microspec_core::{Dialect, DontCareByteOrder};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Configuration for opening raw hyperspectral maps.
///
/// Every field has a default, so a JSON document only needs the keys it
/// changes:
///
/// ```json
/// { "dialect": "oxford", "dont_care_byte_order": "native", "parallel": false }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Sidecar dialect. `None` detects it from the sidecar text.
    pub dialect: Option<Dialect>,
    /// Byte order used for payloads declared `dont-care`.
    pub dont_care_byte_order: DontCareByteOrder,
    /// Extension of the sidecar file next to the payload.
    pub sidecar_extension: String,
    /// Run cube reductions row-parallel.
    pub parallel: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            dialect: None,
            dont_care_byte_order: DontCareByteOrder::Little,
            sidecar_extension: "rpl".to_string(),
            parallel: true,
        }
    }
}

impl MapConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_json::from_reader(reader).map_err(|e| Error::Config(e.to_string()))?;
        Self::validated(config)
    }

    /// Load configuration from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the string is not valid JSON for this schema.
    pub fn from_json(json: &str) -> Result<Self> {
        let config = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        Self::validated(config)
    }

    fn validated(config: Self) -> Result<Self> {
        if config.sidecar_extension.is_empty() {
            return Err(Error::Config("sidecar_extension must not be empty".into()));
        }
        Ok(config)
    }

    /// Forces a sidecar dialect instead of detecting it.
    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Sets how `dont-care` payloads are decoded.
    #[must_use]
    pub fn with_dont_care_byte_order(mut self, policy: DontCareByteOrder) -> Self {
        self.dont_care_byte_order = policy;
        self
    }

    /// Sets the sidecar file extension (without the dot).
    #[must_use]
    pub fn with_sidecar_extension(mut self, extension: impl Into<String>) -> Self {
        self.sidecar_extension = extension.into();
        self
    }

    /// Enables or disables row-parallel reductions.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sidecar path for a payload path.
    #[must_use]
    pub fn sidecar_path(&self, raw_path: &Path) -> PathBuf {
        raw_path.with_extension(&self.sidecar_extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MapConfig::default();
        assert_eq!(config.dialect, None);
        assert_eq!(config.dont_care_byte_order, DontCareByteOrder::Little);
        assert_eq!(config.sidecar_extension, "rpl");
        assert!(config.parallel);
        assert_eq!(
            config.sidecar_path(Path::new("/data/map.raw")),
            PathBuf::from("/data/map.rpl")
        );
    }

    #[test]
    fn test_from_json_partial() {
        let json = r#"{ "dialect": "oxford", "parallel": false }"#;
        let config = MapConfig::from_json(json).unwrap();
        assert_eq!(config.dialect, Some(Dialect::Oxford));
        assert!(!config.parallel);
        assert_eq!(config.sidecar_extension, "rpl");
    }

    #[test]
    fn test_from_json_native_policy() {
        let config = MapConfig::from_json(r#"{ "dont_care_byte_order": "native" }"#).unwrap();
        assert_eq!(config.dont_care_byte_order, DontCareByteOrder::Native);
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        assert!(matches!(
            MapConfig::from_json(r#"{ "dialect": "jeol" }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            MapConfig::from_json(r#"{ "sidecar_extension": "" }"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, br#"{ "sidecar_extension": "txt" }"#).unwrap();
        let config = MapConfig::from_file(file.path()).unwrap();
        assert_eq!(config.sidecar_extension, "txt");
    }

    #[test]
    fn test_builders() {
        let config = MapConfig::default()
            .with_dialect(Dialect::Bruker)
            .with_dont_care_byte_order(DontCareByteOrder::Native)
            .with_sidecar_extension("RPL")
            .with_parallel(false);
        assert_eq!(config.dialect, Some(Dialect::Bruker));
        assert_eq!(config.dont_care_byte_order, DontCareByteOrder::Native);
        assert_eq!(config.sidecar_extension, "RPL");
        assert!(!config.parallel);
    }
}

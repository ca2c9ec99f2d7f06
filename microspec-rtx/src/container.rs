//! RTX container access.
//!
//! An RTX file is an XML document whose bulky payloads are zlib streams
//! stored as base64 text. Decoding runs base64 first, then inflate, and
//! the inflated bytes are usually another XML document.

use crate::tree::{parse_tree, Element};
use crate::{Error, Result};
use base64::prelude::*;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::{debug, info};
use std::io::{Read, Write};
use std::path::Path;

pub const TAG_HEADER: &str = "RTHeader";
pub const TAG_DATA: &str = "RTData";
pub const TAG_PROJECT_HEADER: &str = "ProjectHeader";
pub const TAG_COMPRESSION: &str = "RTCompression";
pub const TAG_DATE: &str = "Date";
pub const TAG_TIME: &str = "Time";
pub const TAG_CREATOR: &str = "Creator";
pub const TAG_COMMENT: &str = "Comment";

/// Decodes a base64 zlib blob. Whitespace in the text is ignored.
///
/// # Errors
/// Returns [`Error::Base64`] or [`Error::Decompress`] for corrupt input.
pub fn decompress(blob: &[u8]) -> Result<Vec<u8>> {
    let clean: Vec<u8> = blob
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let compressed = BASE64_STANDARD.decode(&clean)?;

    let mut decoder = ZlibDecoder::new(&compressed[..]);
    let mut data = Vec::new();
    decoder.read_to_end(&mut data).map_err(Error::Decompress)?;
    debug!(
        "Decompressed {} base64 bytes into {} bytes",
        blob.len(),
        data.len()
    );
    Ok(data)
}

/// Encodes bytes as a base64 zlib blob.
///
/// # Errors
/// Returns [`Error::Io`] if the encoder fails.
pub fn compress(data: &[u8]) -> Result<String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;
    Ok(BASE64_STANDARD.encode(compressed))
}

/// Parses decompressed bytes as an XML tree.
///
/// # Errors
/// Returns an error if the bytes are not a single-rooted XML document.
pub fn extract_data(data: &[u8]) -> Result<Element> {
    let root = parse_tree(data)?;
    info!("Extracted data root: <{}>", root.name);
    Ok(root)
}

/// A parsed RTX document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtxFile {
    root: Element,
}

impl RtxFile {
    /// Reads and parses an RTX file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid XML.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        info!("Reading RTX file: {}", path.display());
        Self::from_bytes(&bytes)
    }

    /// Parses an RTX document from memory.
    ///
    /// # Errors
    /// Returns an error if the bytes are not valid XML.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let root = parse_tree(bytes)?;
        info!("RTX root: <{}> with {} children", root.name, root.children.len());
        for child in &root.children {
            debug!("  <{}> {:?}", child.name, child.attributes);
        }
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// First element named `tag` anywhere in the document.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if there is none.
    pub fn element(&self, tag: &str) -> Result<&Element> {
        self.root
            .find(tag)
            .ok_or_else(|| Error::NotFound(tag.to_string()))
    }

    /// Children of the `RTHeader` element.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the document has no header.
    pub fn header_elements(&self) -> Result<&[Element]> {
        Ok(&self.element(TAG_HEADER)?.children)
    }

    /// Children of the `ProjectHeader` element.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the document has no project header.
    pub fn project_header_elements(&self) -> Result<&[Element]> {
        Ok(&self.element(TAG_PROJECT_HEADER)?.children)
    }

    /// # Errors
    /// Returns [`Error::NotFound`] if absent.
    pub fn compression(&self) -> Result<&Element> {
        self.element(TAG_COMPRESSION)
    }

    /// # Errors
    /// Returns [`Error::NotFound`] if absent.
    pub fn date(&self) -> Result<&Element> {
        self.element(TAG_DATE)
    }

    /// # Errors
    /// Returns [`Error::NotFound`] if absent.
    pub fn time(&self) -> Result<&Element> {
        self.element(TAG_TIME)
    }

    /// # Errors
    /// Returns [`Error::NotFound`] if absent.
    pub fn creator(&self) -> Result<&Element> {
        self.element(TAG_CREATOR)
    }

    /// # Errors
    /// Returns [`Error::NotFound`] if absent.
    pub fn comment(&self) -> Result<&Element> {
        self.element(TAG_COMMENT)
    }

    /// Decompresses the text of element `tag` and parses it as XML.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the element is absent, or a decoding
    /// error if its payload is corrupt.
    pub fn expand(&self, tag: &str) -> Result<Element> {
        let element = self.element(tag)?;
        let data = decompress(element.text.as_bytes())?;
        extract_data(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decompress_round_trip() {
        let payload = b"<Spectrum><Channel>42</Channel></Spectrum>";
        let blob = compress(payload).unwrap();
        assert_eq!(decompress(blob.as_bytes()).unwrap(), payload);

        // Line-wrapped base64 still decodes.
        let wrapped: String = blob
            .as_bytes()
            .chunks(16)
            .map(|c| format!("{}\n  ", String::from_utf8_lossy(c)))
            .collect();
        assert_eq!(decompress(wrapped.as_bytes()).unwrap(), payload);
    }

    #[test]
    fn test_decompress_errors() {
        assert!(matches!(decompress(b"not base64 !!"), Err(Error::Base64(_))));
        let not_zlib = BASE64_STANDARD.encode(b"plain bytes");
        assert!(matches!(
            decompress(not_zlib.as_bytes()),
            Err(Error::Decompress(_))
        ));
    }
}

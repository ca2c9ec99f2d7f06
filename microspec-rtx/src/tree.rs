//! A minimal owned XML element tree.

use crate::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Decoder, Reader};

/// An XML element with its attributes, text and children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Concatenated text content, whitespace-trimmed per text node.
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Value of an attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First element named `tag` in pre-order, starting with `self`.
    #[must_use]
    pub fn find(&self, tag: &str) -> Option<&Element> {
        if self.name == tag {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(tag))
    }

    /// Direct children named `tag`.
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == tag)
    }

    fn from_start(start: &BytesStart<'_>, decoder: Decoder) -> Result<Self> {
        let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.decode_and_unescape_value(decoder)?.into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }
}

/// Parses an XML document into its root element.
///
/// # Errors
/// Returns [`Error::Xml`] for malformed XML and [`Error::Document`] when
/// there is no root element, more than one, or an unclosed element.
pub fn parse_tree(bytes: &[u8]) -> Result<Element> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => stack.push(Element::from_start(e, reader.decoder())?),
            Event::Empty(ref e) => {
                let element = Element::from_start(e, reader.decoder())?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::Document("unbalanced end tag".into()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(ref t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&c.decode().map_err(quick_xml::Error::from)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(Error::Document(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| Error::Document("no root element".into()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    } else {
        return Err(Error::Document(format!(
            "second root element <{}>",
            element.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Root version="2">
  <A id="1"><Target>first</Target></A>
  <B><![CDATA[raw <text>]]></B>
  <Target kind="late">second</Target>
  <Empty flag="yes"/>
</Root>"#;

    #[test]
    fn test_parse_tree() {
        let root = parse_tree(DOC.as_bytes()).unwrap();
        assert_eq!(root.name, "Root");
        assert_eq!(root.attribute("version"), Some("2"));
        assert_eq!(root.children.len(), 4);
        assert_eq!(root.children[1].text, "raw <text>");
        assert_eq!(root.children[3].attribute("flag"), Some("yes"));
    }

    #[test]
    fn test_attributes_are_decoded_and_unescaped() {
        let root = parse_tree(br#"<R a="x &amp; y" b="&lt;1&gt;" c="caf&#233;"/>"#).unwrap();
        assert_eq!(root.attribute("a"), Some("x & y"));
        assert_eq!(root.attribute("b"), Some("<1>"));
        assert_eq!(root.attribute("c"), Some("caf\u{e9}"));

        let mut latin = b"<?xml version=\"1.0\" encoding=\"windows-1252\"?><R name=\"".to_vec();
        latin.extend([b'c', b'a', b'f', 0xE9]);
        latin.extend(b"\">caf\xE9</R>");
        let root = parse_tree(&latin).unwrap();
        assert_eq!(root.attribute("name"), Some("caf\u{e9}"));
        assert_eq!(root.text, "caf\u{e9}");
    }

    #[test]
    fn test_find_is_preorder() {
        let root = parse_tree(DOC.as_bytes()).unwrap();
        assert_eq!(root.find("Target").unwrap().text, "first");
        assert_eq!(root.find("Root").unwrap().name, "Root");
        assert!(root.find("Missing").is_none());
        assert_eq!(root.children_named("Target").count(), 1);
    }

    #[test]
    fn test_rejects_broken_documents() {
        assert!(matches!(parse_tree(b"<a><b></a>"), Err(Error::Xml(_))));
        assert!(matches!(parse_tree(b"<a/><b/>"), Err(Error::Document(_))));
        assert!(matches!(parse_tree(b"   "), Err(Error::Document(_))));
        assert!(matches!(
            parse_tree(b"<a><b/>"),
            Err(Error::Document(_) | Error::Xml(_))
        ));
    }
}

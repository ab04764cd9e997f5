//! Minimal element-tree reader for vendor XML manifests.
//!
//! Manifests are small and only their element/attribute structure matters,
//! so the whole file is read into an owned tree of [`XmlElement`]s. Text
//! content is ignored.

use std::path::Path;

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use docbuilder_shared::{DocBuilderError, Result};

/// One element of a parsed manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Attribute value by name, if present.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First of `keys` that is present with a non-blank value.
    pub fn first_attr(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.attr(k))
            .map(str::trim)
            .find(|v| !v.is_empty())
    }

    /// Direct children whose name is one of `names`, in document order.
    pub fn children_named<'a>(
        &'a self,
        names: &'a [&'a str],
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children
            .iter()
            .filter(move |c| names.contains(&c.name.as_str()))
    }
}

/// Read and parse an XML file.
pub fn parse_file(path: &Path) -> Result<XmlElement> {
    let bytes = std::fs::read(path).map_err(|e| DocBuilderError::io(path, e))?;
    let content = String::from_utf8_lossy(strip_bom(&bytes));
    parse_str(&content)
        .map_err(|e| DocBuilderError::parse(format!("{}: {e}", path.display())))
}

/// Parse an XML document and return its root element.
pub fn parse_str(content: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(element_from(&e)?),
            Ok(Event::Empty(e)) => {
                let el = element_from(&e)?;
                attach(&mut stack, &mut root, el);
            }
            Ok(Event::End(_)) => {
                if let Some(el) = stack.pop() {
                    attach(&mut stack, &mut root, el);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DocBuilderError::parse(format!(
                    "XML error at position {}: {e}",
                    reader.error_position()
                )));
            }
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DocBuilderError::parse("unexpected end of document"));
    }
    root.ok_or_else(|| DocBuilderError::parse("document has no root element"))
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, el: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None if root.is_none() => *root = Some(el),
        None => {}
    }
}

fn element_from(e: &BytesStart<'_>) -> Result<XmlElement> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();

    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8(attr.value.to_vec())
            .map_err(|err| DocBuilderError::parse(format!("attribute {key}: {err}")))?;
        let value = unescape(&raw)
            .map(|v| v.into_owned())
            .unwrap_or(raw);
        attrs.push((key, value));
    }

    Ok(XmlElement {
        name,
        attrs,
        children: Vec::new(),
    })
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let xml = r#"<?xml version="1.0"?>
<Root>
  <ITEM name="Analysis &amp; Design" href="a.htm">
    <DITEM name="Steps" href="steps.htm#top"/>
  </ITEM>
  <ITEM name="Second"/>
</Root>"#;

        let root = parse_str(xml).unwrap();
        assert_eq!(root.name, "Root");
        assert_eq!(root.children.len(), 2);

        let first = &root.children[0];
        assert_eq!(first.attr("name"), Some("Analysis & Design"));
        assert_eq!(first.children[0].name, "DITEM");
        assert_eq!(first.children[0].attr("href"), Some("steps.htm#top"));
        assert_eq!(root.children[1].attr("href"), None);
    }

    #[test]
    fn first_attr_skips_blank_values() {
        let root = parse_str(r#"<ITEM name="  " title="Fallback"/>"#).unwrap();
        assert_eq!(root.first_attr(&["name", "title"]), Some("Fallback"));
        assert_eq!(root.first_attr(&["label"]), None);
    }

    #[test]
    fn children_named_filters_in_order() {
        let root = parse_str("<r><set/><book/><other/><book/></r>").unwrap();
        let names: Vec<&str> = root
            .children_named(&["book", "set"])
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["set", "book", "book"]);
    }

    #[test]
    fn malformed_document_is_parse_error() {
        let err = parse_str("<Root><ITEM></Root>").unwrap_err();
        assert!(matches!(err, DocBuilderError::Parse { .. }));
    }

    #[test]
    fn empty_document_is_parse_error() {
        assert!(parse_str("").is_err());
    }

    #[test]
    fn leading_bom_is_ignored() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"<r/>");
        assert_eq!(strip_bom(&bytes), b"<r/>");
    }
}

//! Minimal XML plumbing shared by the protocol encoders and decoders.
//!
//! Decoding builds a small owned element tree from `quick-xml` reader
//! events; the protocol documents are tiny, so a tree keeps the definition
//! parsers declarative. Encoding appends to a `String` and escapes through
//! `quick_xml::escape`.

use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{ModularInputError, Result};

/// An element with its attributes, child elements and concatenated text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = utf8(start.name().as_ref())?;
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| ModularInputError::ConfigParse(e.to_string()))?;
            let key = utf8(attr.key.as_ref())?;
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
            text: String::new(),
        })
    }

    /// Tag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of the named attribute.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Value of a required attribute, or a parse error naming the element.
    pub fn require_attr(&self, name: &str) -> Result<&str> {
        self.attr(name).ok_or_else(|| {
            ModularInputError::ConfigParse(format!(
                "<{}> is missing required attribute `{}`",
                self.name, name
            ))
        })
    }

    /// Child elements in document order.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First child with the given tag.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given tag.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Unescaped text content directly inside this element.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text of the first child with the given tag.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(Element::text)
    }
}

fn utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| ModularInputError::ConfigParse(e.to_string()))
}

/// Parse a complete document into its root element.
///
/// Declarations, comments and processing instructions are skipped. Text
/// outside the root must be whitespace.
pub fn parse_document(input: &str) -> Result<Element> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Element::from_start(&start)?),
            Event::Empty(start) => {
                let element = Element::from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    ModularInputError::ConfigParse("unbalanced closing tag".to_string())
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text.unescape()?;
                match stack.last_mut() {
                    Some(current) => current.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => {
                        return Err(ModularInputError::ConfigParse(
                            "text outside of the root element".to_string(),
                        ))
                    }
                }
            }
            Event::CData(data) => {
                let text = utf8(&data)?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ModularInputError::ConfigParse(
            "unexpected end of document".to_string(),
        ));
    }
    root.ok_or_else(|| ModularInputError::ConfigParse("document has no root element".to_string()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(ModularInputError::ConfigParse(
            "document has more than one root element".to_string(),
        )),
    }
}

/// Append-only builder for the documents this crate emits.
///
/// Text escapes `&`, `<` and `>`; attribute values also escape quotes.
/// Everything else, including non-ASCII, is written through unchanged.
#[derive(Debug, Default)]
pub struct XmlBuilder {
    buf: String,
}

impl XmlBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `<name attr="..">`.
    pub fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> &mut Self {
        self.buf.push('<');
        self.buf.push_str(name);
        self.push_attrs(attrs);
        self.buf.push('>');
        self
    }

    /// Write `</name>`.
    pub fn close(&mut self, name: &str) -> &mut Self {
        self.buf.push_str("</");
        self.buf.push_str(name);
        self.buf.push('>');
        self
    }

    /// Write `<name/>`.
    pub fn empty(&mut self, name: &str) -> &mut Self {
        self.buf.push('<');
        self.buf.push_str(name);
        self.buf.push_str("/>");
        self
    }

    /// Write escaped text.
    pub fn text(&mut self, text: &str) -> &mut Self {
        self.buf.push_str(&partial_escape(text));
        self
    }

    /// Write `<name>text</name>`.
    pub fn element(&mut self, name: &str, text: &str) -> &mut Self {
        self.open(name, &[]).text(text).close(name)
    }

    /// Write `<name>text</name>` when `text` is present.
    pub fn optional_element(&mut self, name: &str, text: Option<&str>) -> &mut Self {
        if let Some(text) = text {
            self.element(name, text);
        }
        self
    }

    /// The document built so far.
    pub fn into_string(self) -> String {
        self.buf
    }

    fn push_attrs(&mut self, attrs: &[(&str, &str)]) {
        for (key, value) in attrs {
            self.buf.push(' ');
            self.buf.push_str(key);
            self.buf.push_str("=\"");
            self.buf.push_str(&escape(*value));
            self.buf.push('"');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_document() {
        let doc = parse_document(
            r#"<?xml version="1.0"?>
            <root a="1"><child name="x">hello &amp; bye</child><empty/></root>"#,
        )
        .unwrap();

        assert_eq!(doc.name(), "root");
        assert_eq!(doc.attr("a"), Some("1"));
        assert_eq!(doc.children().len(), 2);
        let child = doc.child("child").unwrap();
        assert_eq!(child.attr("name"), Some("x"));
        assert_eq!(child.text(), "hello & bye");
        assert!(doc.child("empty").unwrap().children().is_empty());
    }

    #[test]
    fn test_parse_cdata_text() {
        let doc = parse_document("<a><![CDATA[<raw> & stuff]]></a>").unwrap();
        assert_eq!(doc.text(), "<raw> & stuff");
    }

    #[test]
    fn test_parse_rejects_mismatched_tags() {
        assert!(matches!(
            parse_document("<a><b></a>"),
            Err(ModularInputError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_parse_rejects_truncated_document() {
        assert!(matches!(
            parse_document("<a><b>text</b>"),
            Err(ModularInputError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_parse_rejects_empty_document() {
        assert!(matches!(
            parse_document("   "),
            Err(ModularInputError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_require_attr_reports_element() {
        let doc = parse_document("<stanza/>").unwrap();
        let err = doc.require_attr("name").unwrap_err();
        assert!(err.to_string().contains("<stanza>"));
    }

    #[test]
    fn test_builder_escapes_text_and_attributes() {
        let mut xml = XmlBuilder::new();
        xml.open("event", &[("stanza", "a\"b&c")])
            .element("data", "1 < 2 && 3 > 2")
            .empty("done")
            .close("event");

        assert_eq!(
            xml.into_string(),
            "<event stanza=\"a&quot;b&amp;c\"><data>1 &lt; 2 &amp;&amp; 3 &gt; 2</data><done/></event>"
        );
    }

    #[test]
    fn test_builder_keeps_unicode() {
        let mut xml = XmlBuilder::new();
        xml.element("d", "\u{C3BC} für");
        assert_eq!(xml.into_string(), "<d>\u{C3BC} für</d>");
    }

    #[test]
    fn test_builder_skips_absent_optional() {
        let mut xml = XmlBuilder::new();
        xml.optional_element("host", None)
            .optional_element("index", Some("main"));
        assert_eq!(xml.into_string(), "<index>main</index>");
    }
}

//! Minimal mutable element tree over `quick-xml`.
//!
//! Manifests and driver descriptors are small documents that need in-place
//! edits (replace a node's text, drop every `<script>`, append a CDATA node)
//! and must serialize back with their original layout intact. Whitespace,
//! comments and CDATA sections are kept as nodes, and start tags and text
//! keep their markup as parsed, so an unmodified document serializes to the
//! same bytes it was parsed from, minus the XML declaration. Only nodes whose
//! decoded value changed are re-escaped.

use std::borrow::Cow;

use quick_xml::escape::{partial_escape, unescape};
use quick_xml::events::{BytesCData, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// Errors produced while reading or writing XML.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// Syntax error reported by the parser.
    #[error("{0}")]
    Syntax(#[from] quick_xml::Error),

    /// Malformed attribute.
    #[error("{0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// Tag or raw content is not UTF-8.
    #[error("{0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// The document contains no element at all.
    #[error("document has no root element")]
    NoRootElement,

    /// A second top-level element follows the root.
    #[error("unexpected second root element <{0}>")]
    MultipleRoots(String),

    /// The document ended inside an element.
    #[error("unclosed element <{0}>")]
    UnclosedElement(String),

    /// Writer failure.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, XmlError>;

/// A node in the element tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Nested element.
    Element(Element),
    /// Character data.
    Text {
        /// Unescaped content
        value: String,
        /// Escaped markup as parsed; written back while it still decodes to `value`
        raw: Option<String>,
    },
    /// Literal `<![CDATA[...]]>` content.
    CData(String),
    /// Comment body.
    Comment(String),
    /// Processing instruction body.
    ProcessingInstruction(String),
    /// Document type declaration body.
    DocType(String),
}

impl Node {
    /// Text node with no source markup.
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text {
            value: value.into(),
            raw: None,
        }
    }

    fn as_whitespace(&self) -> Option<&str> {
        match self {
            Node::Text { value, .. } if value.trim().is_empty() => Some(value),
            _ => None,
        }
    }
}

/// Start tag markup as parsed, with the name and attributes it decoded to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawStart {
    content: String,
    name: String,
    attributes: Vec<(String, String)>,
}

/// An XML element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Tag name.
    pub name: String,
    /// Attributes in document order, values unescaped.
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order.
    pub children: Vec<Node>,
    self_closing: bool,
    raw_start: Option<RawStart>,
}

impl Element {
    /// Create an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            self_closing: false,
            raw_start: None,
        }
    }

    fn from_start(start: &BytesStart<'_>, self_closing: bool) -> Result<Self> {
        let name = std::str::from_utf8(start.name().as_ref())?.to_string();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        let raw_start = RawStart {
            content: std::str::from_utf8(start)?.to_string(),
            name: name.clone(),
            attributes: attributes.clone(),
        };
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
            self_closing,
            raw_start: Some(raw_start),
        })
    }

    /// Value of an attribute, if present.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing any existing value.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// Child elements with the given tag name.
    pub fn children_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a Element> + use<'a, 'n> {
        self.elements().filter(move |el| el.name == name)
    }

    /// First child element with the given tag name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.name == name)
    }

    /// First child element with the given tag name, mutably.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    /// Concatenated text and CDATA content of the direct children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text { value, .. } | Node::CData(value) => Some(value.as_str()),
                _ => None,
            })
            .collect()
    }

    /// True when the element carries any text or CDATA content.
    pub fn has_text(&self) -> bool {
        self.children
            .iter()
            .any(|node| matches!(node, Node::Text { .. } | Node::CData(_)))
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::text(text)];
    }

    /// Replace all children with a single CDATA section.
    pub fn set_cdata(&mut self, text: impl Into<String>) {
        self.children = vec![Node::CData(text.into())];
    }

    /// Remove every child element named `name`, along with the indentation
    /// directly in front of it. Returns how many elements were removed.
    pub fn remove_children_named(&mut self, name: &str) -> usize {
        let mut kept: Vec<Node> = Vec::with_capacity(self.children.len());
        let mut removed = 0;
        for node in self.children.drain(..) {
            if matches!(&node, Node::Element(el) if el.name == name) {
                if kept.last().and_then(Node::as_whitespace).is_some() {
                    kept.pop();
                }
                removed += 1;
            } else {
                kept.push(node);
            }
        }
        self.children = kept;
        removed
    }

    /// Append a child element, reusing the surrounding indentation so the
    /// new node lines up with its siblings.
    pub fn append_element(&mut self, child: Element) {
        let closing = self
            .children
            .last()
            .and_then(Node::as_whitespace)
            .map(str::to_string);

        match closing {
            Some(closing) => {
                let indent = self
                    .children
                    .iter()
                    .rev()
                    .skip(1)
                    .find_map(Node::as_whitespace)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{closing}  "));
                self.children.pop();
                self.children.push(Node::text(indent));
                self.children.push(Node::Element(child));
                self.children.push(Node::text(closing));
            }
            None => self.children.push(Node::Element(child)),
        }
        self.self_closing = false;
    }
}

/// A parsed XML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    prolog: Vec<Node>,
    root: Element,
    epilog: Vec<Node>,
}

impl Document {
    /// Parse a document from a string.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut builder = TreeBuilder::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => builder.stack.push(Element::from_start(&e, false)?),
                Event::Empty(e) => builder.attach(Node::Element(Element::from_start(&e, true)?))?,
                Event::End(_) => match builder.stack.pop() {
                    Some(el) => builder.attach(Node::Element(el))?,
                    None => return Err(XmlError::NoRootElement),
                },
                Event::Text(e) => builder.attach(Node::Text {
                    value: e.unescape()?.into_owned(),
                    raw: Some(raw(&e)?),
                })?,
                Event::CData(e) => builder.attach(Node::CData(raw(&e)?))?,
                Event::Comment(e) => builder.attach(Node::Comment(raw(&e)?))?,
                Event::PI(e) => builder.attach(Node::ProcessingInstruction(raw(&e)?))?,
                Event::DocType(e) => builder.attach(Node::DocType(raw(&e)?))?,
                Event::Decl(_) => {}
                Event::Eof => break,
            }
        }
        builder.finish()
    }

    /// The root element.
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// The root element, mutably.
    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Serialize the document without an XML declaration.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        let prolog = self
            .prolog
            .iter()
            .skip_while(|node| node.as_whitespace().is_some());
        for node in prolog {
            write_node(&mut writer, node)?;
        }
        write_element(&mut writer, &self.root)?;
        for node in &self.epilog {
            write_node(&mut writer, node)?;
        }
        Ok(writer.into_inner())
    }

    /// Serialize the document to a string without an XML declaration.
    pub fn to_xml_string(&self) -> Result<String> {
        let bytes = self.to_bytes()?;
        Ok(std::str::from_utf8(&bytes)?.to_string())
    }
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Element>,
    prolog: Vec<Node>,
    root: Option<Element>,
    epilog: Vec<Node>,
}

impl TreeBuilder {
    fn attach(&mut self, node: Node) -> Result<()> {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
            return Ok(());
        }
        match (node, self.root.is_some()) {
            (Node::Element(el), false) => self.root = Some(el),
            (Node::Element(el), true) => return Err(XmlError::MultipleRoots(el.name)),
            (other, false) => self.prolog.push(other),
            (other, true) => self.epilog.push(other),
        }
        Ok(())
    }

    fn finish(self) -> Result<Document> {
        if let Some(open) = self.stack.last() {
            return Err(XmlError::UnclosedElement(open.name.clone()));
        }
        let root = self.root.ok_or(XmlError::NoRootElement)?;
        Ok(Document {
            prolog: self.prolog,
            root,
            epilog: self.epilog,
        })
    }
}

fn raw(bytes: &[u8]) -> Result<String> {
    Ok(std::str::from_utf8(bytes)?.to_string())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let start = match &element.raw_start {
        Some(raw)
            if raw.name == element.name && raw.attributes == element.attributes =>
        {
            BytesStart::from_content(raw.content.as_str(), element.name.len())
        }
        _ => {
            let mut start = BytesStart::new(element.name.as_str());
            for (key, value) in &element.attributes {
                start.push_attribute((key.as_str(), value.as_str()));
            }
            start
        }
    };

    if element.children.is_empty() && element.self_closing {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<()> {
    match node {
        Node::Element(el) => write_element(writer, el)?,
        Node::Text { value, raw } => {
            let escaped = match raw {
                Some(raw) if unescape(raw).is_ok_and(|decoded| decoded == value.as_str()) => {
                    Cow::Borrowed(raw.as_str())
                }
                _ => partial_escape(value),
            };
            writer.write_event(Event::Text(BytesText::from_escaped(escaped)))?
        }
        Node::CData(text) => {
            for segment in cdata_segments(text) {
                writer.write_event(Event::CData(BytesCData::new(segment)))?;
            }
        }
        Node::Comment(body) => {
            writer.write_event(Event::Comment(BytesText::from_escaped(body.as_str())))?
        }
        Node::ProcessingInstruction(body) => {
            writer.write_event(Event::PI(BytesPI::new(body.as_str())))?
        }
        Node::DocType(body) => {
            writer.write_event(Event::DocType(BytesText::from_escaped(body.as_str())))?
        }
    }
    Ok(())
}

/// Split text so that no section contains the `]]>` terminator.
fn cdata_segments(text: &str) -> Vec<Cow<'_, str>> {
    let parts: Vec<&str> = text.split("]]>").collect();
    if parts.len() == 1 {
        return vec![Cow::Borrowed(text)];
    }
    let last = parts.len() - 1;
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let mut segment = String::new();
            if i > 0 {
                segment.push('>');
            }
            segment.push_str(part);
            if i < last {
                segment.push_str("]]");
            }
            Cow::Owned(segment)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = "<devicedata>\n  <version>12</version>\n  <!-- keep me -->\n  <config>\n    <script file=\"driver.lua\"/>\n    <documentation>a &amp; b</documentation>\n  </config>\n</devicedata>\n";

    #[test]
    fn test_unmodified_document_round_trips() {
        let doc = Document::parse(DESCRIPTOR).expect("parse");
        assert_eq!(doc.to_xml_string().expect("serialize"), DESCRIPTOR);
    }

    #[test]
    fn test_declaration_is_dropped() {
        let xml = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{DESCRIPTOR}");
        let doc = Document::parse(&xml).expect("parse");
        assert_eq!(doc.to_xml_string().expect("serialize"), DESCRIPTOR);
    }

    #[test]
    fn test_text_and_attributes() {
        let doc = Document::parse(DESCRIPTOR).expect("parse");
        let root = doc.root();
        assert_eq!(root.child("version").map(Element::text), Some("12".to_string()));
        let config = root.child("config").expect("config");
        assert_eq!(config.child("script").and_then(|s| s.attr("file")), Some("driver.lua"));
        assert_eq!(
            config.child("documentation").map(Element::text),
            Some("a & b".to_string())
        );
    }

    #[test]
    fn test_remove_then_append_keeps_indentation() {
        let mut doc = Document::parse(DESCRIPTOR).expect("parse");
        let config = doc.root_mut().child_mut("config").expect("config");
        assert_eq!(config.remove_children_named("documentation"), 1);
        let mut documentation = Element::new("documentation");
        documentation.set_text("new");
        config.append_element(documentation);

        let xml = doc.to_xml_string().expect("serialize");
        assert!(xml.contains(
            "  <config>\n    <script file=\"driver.lua\"/>\n    <documentation>new</documentation>\n  </config>"
        ));
    }

    #[test]
    fn test_append_into_emptied_section() {
        let mut doc =
            Document::parse("<d>\n  <config>\n    <script/>\n  </config>\n</d>").expect("parse");
        let config = doc.root_mut().child_mut("config").expect("config");
        config.remove_children_named("script");
        let mut script = Element::new("script");
        script.set_cdata("x");
        config.append_element(script);
        assert_eq!(
            doc.to_xml_string().expect("serialize"),
            "<d>\n  <config>\n    <script><![CDATA[x]]></script>\n  </config>\n</d>"
        );
    }

    #[test]
    fn test_cdata_terminator_is_split() {
        let mut doc = Document::parse("<d/>").expect("parse");
        doc.root_mut().set_cdata("a]]>b");
        let xml = doc.to_xml_string().expect("serialize");
        assert_eq!(xml, "<d><![CDATA[a]]]]><![CDATA[>b]]></d>");

        let reparsed = Document::parse(&xml).expect("reparse");
        assert_eq!(reparsed.root().text(), "a]]>b");
    }

    #[test]
    fn test_original_quoting_and_escapes_survive() {
        let xml = "<devicedata>\n  <name attr='single' other=\"a &quot;b&quot;\">Tom &quot;T&quot; &gt; x</name>\n  <search_tags>a > b</search_tags>\n  <empty />\n</devicedata>\n";
        let doc = Document::parse(xml).expect("parse");
        assert_eq!(doc.to_xml_string().expect("serialize"), xml);

        let name = doc.root().child("name").expect("name");
        assert_eq!(name.attr("attr"), Some("single"));
        assert_eq!(name.attr("other"), Some("a \"b\""));
        assert_eq!(name.text(), "Tom \"T\" > x");
    }

    #[test]
    fn test_changed_nodes_are_rewritten() {
        let mut doc =
            Document::parse("<d>\n  <v a='1'>x &gt; y</v>\n  <w a='2'>a > b</w>\n</d>")
                .expect("parse");
        let v = doc.root_mut().child_mut("v").expect("v");
        v.set_attr("a", "3");
        v.set_text("p < q");

        assert_eq!(
            doc.to_xml_string().expect("serialize"),
            "<d>\n  <v a=\"3\">p &lt; q</v>\n  <w a='2'>a > b</w>\n</d>"
        );
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(Document::parse(""), Err(XmlError::NoRootElement)));
        assert!(matches!(
            Document::parse("<a/><b/>"),
            Err(XmlError::MultipleRoots(name)) if name == "b"
        ));
        assert!(Document::parse("<a><b></a>").is_err());
        assert!(Document::parse("<a>").is_err());
    }
}

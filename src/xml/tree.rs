use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::core::FacturXError;

/// Namespace permanently bound to the `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Element nesting deeper than this is rejected at parse time; every walk
/// over the tree is recursive.
pub const MAX_DEPTH: usize = 256;

fn xml_io(e: std::io::Error) -> FacturXError {
    FacturXError::Xml(format!("XML write error: {e}"))
}

/// An attribute with its qualified name as written and its resolved namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub namespace: Option<String>,
    pub value: String,
}

impl Attribute {
    /// Name without prefix.
    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

/// An element of the owned XML tree.
///
/// Names keep the prefix they were written with; `namespace` holds the URI
/// the prefix resolved to at parse time (or was given at construction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    namespace: Option<String>,
    declarations: Vec<(Option<String>, String)>,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
}

impl Element {
    /// Create an element from its qualified name (`prefix:local` or `local`).
    pub fn new(name: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.map(str::to_string),
            declarations: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> Option<&str> {
        split_qname(&self.name).0
    }

    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// `{uri}local` form, used in diagnostics.
    pub fn expanded_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{{{ns}}}{}", self.local_name()),
            None => self.local_name().to_string(),
        }
    }

    /// Namespace declarations written on this element, in document order.
    pub fn declarations(&self) -> &[(Option<String>, String)] {
        &self.declarations
    }

    pub fn declare_namespace(&mut self, prefix: Option<&str>, uri: &str) {
        let prefix = prefix.map(str::to_string);
        match self.declarations.iter_mut().find(|(p, _)| *p == prefix) {
            Some(existing) => existing.1 = uri.to_string(),
            None => self.declarations.push((prefix, uri.to_string())),
        }
    }

    pub fn with_namespace_declaration(mut self, prefix: &str, uri: &str) -> Self {
        self.declare_namespace(Some(prefix), uri);
        self
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Look up an attribute by its qualified name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set (or replace) an attribute by its qualified name.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = value,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                namespace: None,
                value,
            }),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn push(&mut self, child: Element) -> &mut Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.push(child);
        self
    }

    /// Concatenated direct text content, `None` when the element holds no text node.
    pub fn text(&self) -> Option<String> {
        let mut out: Option<String> = None;
        for child in &self.children {
            if let Node::Text(t) | Node::CData(t) = child {
                out.get_or_insert_with(String::new).push_str(t);
            }
        }
        out
    }

    /// Replace all direct text content. An empty value leaves no text node behind.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.children
            .retain(|n| !matches!(n, Node::Text(_) | Node::CData(_)));
        if !text.is_empty() {
            self.children.insert(0, Node::Text(text));
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    /// Depth-first search for the first element satisfying `pred`, self included.
    pub fn find(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        if pred(self) {
            return Some(self);
        }
        self.child_elements().find_map(|c| c.find(pred))
    }

    fn has_element_children(&self) -> bool {
        self.children.iter().any(|n| matches!(n, Node::Element(_)))
    }

    /// Drop indentation between child elements.
    fn strip_formatting_whitespace(&mut self) {
        if self.has_element_children() {
            self.children
                .retain(|n| !matches!(n, Node::Text(t) if t.trim().is_empty()));
        }
    }
}

/// A parsed XML document: one root element, owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: Element,
}

impl XmlDocument {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Parse XML bytes in the encoding named by their declaration (UTF-8
    /// when undeclared). Whitespace-only text between elements is discarded.
    pub fn parse(bytes: &[u8]) -> Result<Self, FacturXError> {
        Self::parse_str(&decode(bytes)?)
    }

    pub fn parse_str(text: &str) -> Result<Self, FacturXError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    check_depth(&stack)?;
                    let element = open_element(e, reader.decoder(), &stack)?;
                    stack.push(element);
                }
                Ok(Event::Empty(ref e)) => {
                    check_depth(&stack)?;
                    let element = open_element(e, reader.decoder(), &stack)?;
                    close_element(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let mut element = stack
                        .pop()
                        .ok_or_else(|| FacturXError::Xml("unexpected closing tag".into()))?;
                    element.strip_formatting_whitespace();
                    close_element(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(ref e)) => {
                    let text = e
                        .unescape()
                        .map_err(|err| FacturXError::Xml(format!("bad text content: {err}")))?
                        .into_owned();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Text(text)),
                        None if text.trim().is_empty() => {}
                        None => {
                            return Err(FacturXError::Xml(
                                "text content outside the root element".into(),
                            ));
                        }
                    }
                }
                Ok(Event::CData(ref e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let data = String::from_utf8(e.to_vec())
                            .map_err(|err| FacturXError::Xml(format!("bad CDATA: {err}")))?;
                        parent.children.push(Node::CData(data));
                    }
                }
                Ok(Event::Comment(ref e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let comment = String::from_utf8_lossy(e).into_owned();
                        parent.children.push(Node::Comment(comment));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(FacturXError::Xml(format!(
                        "XML parse error at byte {}: {e}",
                        reader.buffer_position()
                    )));
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(FacturXError::Xml(format!(
                "unclosed element '{}'",
                open.name()
            )));
        }
        root.map(Self::new)
            .ok_or_else(|| FacturXError::Xml("document has no root element".into()))
    }

    /// Canonical serialization: UTF-8 declaration, two-space indentation.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FacturXError> {
        self.serialize(true)
    }

    pub fn serialize(&self, declaration: bool) -> Result<Vec<u8>, FacturXError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        if declaration {
            writer
                .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
                .map_err(xml_io)?;
        }
        write_element(&mut writer, &self.root)?;
        let mut out = writer.into_inner();
        out.push(b'\n');
        Ok(out)
    }

    /// Prefix → URI bindings declared on the root element (the lookup scope
    /// for field paths).
    pub fn root_namespaces(&self) -> Vec<(Option<String>, String)> {
        self.root.declarations.clone()
    }
}

/// Transcode to UTF-8 following the XML declaration's `encoding`.
fn decode(bytes: &[u8]) -> Result<Cow<'_, str>, FacturXError> {
    let declared = match Reader::from_reader(bytes).read_event() {
        Ok(Event::Decl(decl)) => decl.encoder(),
        _ => None,
    };
    match declared {
        Some(encoding) if encoding.name() != "UTF-8" => encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .ok_or_else(|| {
                FacturXError::Xml(format!("XML is not valid {}", encoding.name()))
            }),
        _ => std::str::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|e| FacturXError::Xml(format!("XML is not valid UTF-8: {e}"))),
    }
}

fn check_depth(stack: &[Element]) -> Result<(), FacturXError> {
    if stack.len() >= MAX_DEPTH {
        return Err(FacturXError::Xml(format!(
            "elements nested deeper than {MAX_DEPTH} levels"
        )));
    }
    Ok(())
}

pub(crate) fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

fn open_element(
    e: &BytesStart<'_>,
    decoder: quick_xml::encoding::Decoder,
    stack: &[Element]) -> Result<Element, FacturXError> {
    let name = std::str::from_utf8(e.name().as_ref())
        .map_err(|err| FacturXError::Xml(format!("element name is not UTF-8: {err}")))?
        .to_string();

    let mut declarations = Vec::new();
    let mut raw = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| FacturXError::Xml(format!("malformed attribute: {err}")))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| FacturXError::Xml(format!("attribute name is not UTF-8: {err}")))?
            .to_string();
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(|err| FacturXError::Xml(format!("bad attribute value: {err}")))?
            .into_owned();
        if key == "xmlns" {
            declarations.push((None, value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declarations.push((Some(prefix.to_string()), value));
        } else {
            raw.push((key, value));
        }
    }

    let namespace = resolve_prefix(split_qname(&name).0, &declarations, stack)
        .map_err(|prefix| FacturXError::Xml(format!("undeclared prefix '{prefix}' on <{name}>")))?;

    let mut attributes = Vec::with_capacity(raw.len());
    for (key, value) in raw {
        let namespace = match split_qname(&key).0 {
            Some(prefix) => resolve_prefix(Some(prefix), &declarations, stack).map_err(|p| {
                FacturXError::Xml(format!("undeclared prefix '{p}' on attribute '{key}'"))
            })?,
            None => None,
        };
        attributes.push(Attribute {
            name: key,
            namespace,
            value,
        });
    }

    Ok(Element {
        name,
        namespace,
        declarations,
        attributes,
        children: Vec::new(),
    })
}

fn resolve_prefix<'p>(
    prefix: Option<&'p str>,
    local: &[(Option<String>, String)],
    stack: &[Element],
) -> Result<Option<String>, &'p str> {
    if prefix == Some("xml") {
        return Ok(Some(XML_NS.to_string()));
    }
    let scopes = std::iter::once(local).chain(stack.iter().rev().map(|e| e.declarations.as_slice()));
    for scope in scopes {
        if let Some((_, uri)) = scope.iter().find(|(p, _)| p.as_deref() == prefix) {
            return Ok((!uri.is_empty()).then(|| uri.clone()));
        }
    }
    match prefix {
        Some(p) => Err(p),
        None => Ok(None),
    }
}

fn close_element(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), FacturXError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(FacturXError::Xml("more than one root element".into())),
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), FacturXError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (prefix, uri) in &element.declarations {
        let key = match prefix {
            Some(p) => format!("xmlns:{p}"),
            None => "xmlns".to_string(),
        };
        start.push_attribute((key.as_str(), uri.as_str()));
    }
    for attr in &element.attributes {
        start.push_attribute((attr.name.as_str(), attr.value.as_str()));
    }

    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(xml_io);
    }

    writer.write_event(Event::Start(start)).map_err(xml_io)?;
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(t) => writer
                .write_event(Event::Text(BytesText::new(t)))
                .map_err(xml_io)?,
            Node::CData(t) => writer
                .write_event(Event::CData(BytesCData::new(t.as_str())))
                .map_err(xml_io)?,
            Node::Comment(t) => writer
                .write_event(Event::Comment(BytesText::from_escaped(t.as_str())))
                .map_err(xml_io)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(xml_io)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<a:root xmlns:a="urn:a" xmlns:b="urn:b">
    <b:item kind="x">one &amp; two</b:item>
    <b:empty/>
    <!-- note -->
</a:root>"#;

    #[test]
    fn parse_resolves_namespaces() {
        let doc = XmlDocument::parse_str(SAMPLE).unwrap();
        let root = doc.root();
        assert_eq!(root.local_name(), "root");
        assert_eq!(root.namespace(), Some("urn:a"));
        let item = root.child_elements().next().unwrap();
        assert_eq!(item.namespace(), Some("urn:b"));
        assert_eq!(item.attribute("kind"), Some("x"));
        assert_eq!(item.text().as_deref(), Some("one & two"));
    }

    #[test]
    fn serialization_is_stable() {
        let doc = XmlDocument::parse_str(SAMPLE).unwrap();
        let first = doc.to_bytes().unwrap();
        let second = XmlDocument::parse(&first).unwrap().to_bytes().unwrap();
        assert_eq!(first, second);
        let text = String::from_utf8(first).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(text.contains("<b:item kind=\"x\">one &amp; two</b:item>"));
        assert!(text.contains("<b:empty/>"));
    }

    #[test]
    fn undeclared_prefix_is_rejected() {
        let err = XmlDocument::parse_str("<x:root/>").unwrap_err();
        assert!(err.to_string().contains("undeclared prefix"));
    }

    #[test]
    fn set_text_replaces_content() {
        let mut el = Element::new("a:item", Some("urn:a")).with_text("old");
        el.set_text("new");
        assert_eq!(el.text().as_deref(), Some("new"));
        el.set_text("");
        assert_eq!(el.text(), None);
        assert!(el.children().is_empty());
    }

    #[test]
    fn nesting_is_capped() {
        let nested = |depth: usize| {
            let mut xml = String::from(r#"<a:root xmlns:a="urn:a">"#);
            xml.push_str(&"<a:x>".repeat(depth - 1));
            xml.push_str(&"</a:x>".repeat(depth - 1));
            xml.push_str("</a:root>");
            xml
        };
        assert!(XmlDocument::parse_str(&nested(MAX_DEPTH)).is_ok());
        let err = XmlDocument::parse_str(&nested(MAX_DEPTH + 1)).unwrap_err();
        assert!(err.to_string().contains("nested deeper"));
        let err = XmlDocument::parse_str(&nested(100_000)).unwrap_err();
        assert!(matches!(err, FacturXError::Xml(_)));
    }

    #[test]
    fn declared_latin1_is_transcoded() {
        let mut bytes = br#"<?xml version="1.0" encoding="ISO-8859-1"?><a:n xmlns:a="urn:a">M"#.to_vec();
        bytes.push(0xFC);
        bytes.extend_from_slice(b"ller</a:n>");
        let doc = XmlDocument::parse(&bytes).unwrap();
        assert_eq!(doc.root().text().as_deref(), Some("M\u{fc}ller"));
        let out = String::from_utf8(doc.to_bytes().unwrap()).unwrap();
        assert!(out.contains("encoding=\"UTF-8\""));
        assert!(out.contains("M\u{fc}ller"));

        // Without a declaration the bytes must be UTF-8.
        let mut undeclared = br#"<a:n xmlns:a="urn:a">M"#.to_vec();
        undeclared.push(0xFC);
        undeclared.extend_from_slice(b"ller</a:n>");
        assert!(XmlDocument::parse(&undeclared).is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(XmlDocument::parse(b"not xml at all <").is_err());
        assert!(XmlDocument::parse(b"").is_err());
    }
}

//! A minimal owned element tree over quick-xml events.
//!
//! The tree keeps every event it does not understand (declarations, comments,
//! processing instructions, doctype) so a part can be written back without
//! losing markup. Character data is stored decoded; entity references are
//! resolved while parsing and re-escaped when writing.

use std::borrow::Cow;

use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::XmlError;

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Element(Element),
    Text(String),
    Other(Event<'static>),
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) start: BytesStart<'static>,
    pub(crate) children: Vec<Node>,
    self_closing: bool,
}

impl Element {
    /// Creates an element with no attributes and no children.
    pub(crate) fn new(name: &str) -> Self {
        Self {
            start: BytesStart::new(name.to_owned()),
            children: Vec::new(),
            self_closing: true,
        }
    }

    /// Creates an element holding a single text node.
    pub(crate) fn with_text(name: &str, text: String) -> Self {
        let mut element = Self::new(name);
        element.children.push(Node::Text(text));
        element.self_closing = false;
        element
    }

    /// Qualified name, prefix included (e.g. `w:p`).
    pub(crate) fn name(&self) -> &[u8] {
        self.start.name().into_inner()
    }

    pub(crate) fn is(&self, qualified_name: &str) -> bool {
        self.name() == qualified_name.as_bytes()
    }

    /// Returns the unescaped value of an attribute, if present.
    pub(crate) fn attribute(&self, qualified_name: &str) -> Option<String> {
        self.start
            .attributes()
            .flatten()
            .find(|attr| attr.key.as_ref() == qualified_name.as_bytes())
            .and_then(|attr| attr.unescape_value().ok().map(Cow::into_owned))
    }

    pub(crate) fn set_attribute(&mut self, qualified_name: &str, value: &str) {
        if self.attribute(qualified_name).is_none() {
            self.start.push_attribute((qualified_name, value));
        }
    }

    pub(crate) fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub(crate) fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Concatenated character data of the direct text children.
    pub(crate) fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn push_text(&mut self, text: &str) {
        self.self_closing = false;
        push_text(&mut self.children, text);
    }
}

/// A parsed XML part: top-level nodes with exactly one root element.
#[derive(Debug, Clone)]
pub(crate) struct XmlDocument {
    nodes: Vec<Node>,
}

impl XmlDocument {
    pub(crate) fn parse(xml: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(xml);
        let mut open: Vec<Element> = Vec::new();
        let mut nodes: Vec<Node> = Vec::new();

        loop {
            let event = reader.read_event().map_err(|source| XmlError::Syntax {
                position: reader.error_position(),
                source,
            })?;

            match event {
                Event::Start(start) => open.push(Element {
                    start: start.into_owned(),
                    children: Vec::new(),
                    self_closing: false,
                }),
                Event::End(end) => {
                    let element = open.pop().ok_or_else(|| {
                        XmlError::Unbalanced(String::from_utf8_lossy(end.name().into_inner()).into_owned())
                    })?;
                    attach(&mut open, &mut nodes, Node::Element(element));
                }
                Event::Empty(start) => {
                    let element = Element {
                        start: start.into_owned(),
                        children: Vec::new(),
                        self_closing: true,
                    };
                    attach(&mut open, &mut nodes, Node::Element(element));
                }
                Event::Text(text) => {
                    let decoded = text
                        .decode()
                        .map_err(|e| XmlError::Encoding(e.to_string()))?;
                    attach_text(&mut open, &mut nodes, &decoded);
                }
                Event::CData(data) => {
                    let decoded = std::str::from_utf8(data.as_ref())
                        .map_err(|e| XmlError::Encoding(e.to_string()))?;
                    attach_text(&mut open, &mut nodes, decoded);
                }
                Event::GeneralRef(reference) => {
                    let raw = reference
                        .decode()
                        .map_err(|e| XmlError::Encoding(e.to_string()))?;
                    let resolved = resolve_entity(&raw)?;
                    attach_text(&mut open, &mut nodes, &resolved);
                }
                Event::Eof => break,
                other => attach(&mut open, &mut nodes, Node::Other(other.into_owned())),
            }
        }

        if let Some(element) = open.last() {
            return Err(XmlError::Unbalanced(
                String::from_utf8_lossy(element.name()).into_owned(),
            ));
        }

        let document = Self { nodes };
        if document.root().is_none() {
            return Err(XmlError::NoRoot);
        }
        Ok(document)
    }

    pub(crate) fn root(&self) -> Option<&Element> {
        self.nodes.iter().find_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub(crate) fn root_mut(&mut self) -> Option<&mut Element> {
        self.nodes.iter_mut().find_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, XmlError> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.nodes {
            write_node(&mut writer, node)?;
        }
        Ok(writer.into_inner())
    }
}

fn attach(open: &mut [Element], nodes: &mut Vec<Node>, node: Node) {
    match open.last_mut() {
        Some(parent) => {
            parent.self_closing = false;
            parent.children.push(node);
        }
        None => nodes.push(node),
    }
}

fn attach_text(open: &mut [Element], nodes: &mut Vec<Node>, text: &str) {
    match open.last_mut() {
        Some(parent) => parent.push_text(text),
        None => push_text(nodes, text),
    }
}

/// Appends to a trailing text node so `a &amp; b` stays one node.
fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if let Some(Node::Text(existing)) = nodes.last_mut() {
        existing.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_owned()));
    }
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), XmlError> {
    let result = match node {
        Node::Element(element) if element.self_closing && element.children.is_empty() => {
            writer.write_event(Event::Empty(element.start.borrow()))
        }
        Node::Element(element) => {
            writer
                .write_event(Event::Start(element.start.borrow()))
                .map_err(|e| XmlError::Write(e.to_string()))?;
            for child in &element.children {
                write_node(writer, child)?;
            }
            writer.write_event(Event::End(element.start.to_end()))
        }
        Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text))),
        Node::Other(event) => writer.write_event(event.borrow()),
    };
    result.map_err(|e| XmlError::Write(e.to_string()))
}

/// Resolves a predefined entity (`amp`, `lt`, ...) or a character reference.
fn resolve_entity(raw: &str) -> Result<String, XmlError> {
    if let Some(resolved) = resolve_xml_entity(raw) {
        return Ok(resolved.to_owned());
    }

    let unknown = || XmlError::UnknownEntity(raw.to_owned());
    let rest = raw.strip_prefix('#').ok_or_else(unknown)?;
    let code = match rest.strip_prefix('x').or_else(|| rest.strip_prefix('X')) {
        Some(hex) => u32::from_str_radix(hex, 16).map_err(|_| unknown())?,
        None => rest.parse::<u32>().map_err(|_| unknown())?,
    };
    char::from_u32(code)
        .map(String::from)
        .ok_or_else(unknown)
}

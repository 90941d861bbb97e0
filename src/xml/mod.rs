//! # XML Tree
//!
//! A small owned element tree used for two jobs: holding policy assertion documents
//! while their symbolic references are rewritten, and assembling the wire payloads
//! emitted by the entity builders.
//!
//! Trees are parsed with `quick-xml` and treated as values. Rewrites build a new tree
//! rather than editing a shared one, so preparing the same policy twice gives equal
//! results.
//!
//! ## Key Features
//! - Namespace prefixes are kept verbatim as part of element and attribute names
//! - Whitespace-only text between elements is dropped on parse
//! - CDATA sections are preserved as CDATA on output
//! - Consuming builder methods (`with_attr`, `with_child`, ...) for payload assembly

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::core::error::{BundleError, BundleResult};

/// A node inside an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
}

/// An XML element with ordered attributes and children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element holding a single text node, e.g. `<l7:Name>value</l7:Name>`
    pub fn text_element<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self::new(name).with_text(value)
    }

    pub fn with_attr<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_children<I: IntoIterator<Item = Element>>(mut self, children: I) -> Self {
        self.children
            .extend(children.into_iter().map(Node::Element));
        self
    }

    /// Append `child` only when present
    pub fn with_optional_child(self, child: Option<Element>) -> Self {
        match child {
            Some(child) => self.with_child(child),
            None => self,
        }
    }

    pub fn with_text<V: Into<String>>(mut self, value: V) -> Self {
        self.children.push(Node::Text(value.into()));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing an existing value in place
    pub fn set_attr<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(index).1)
    }

    /// Iterate over child elements, skipping text
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|element| element.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(element) if element.name == name => Some(element),
            _ => None,
        })
    }

    /// Replace the first child named `name` with `replacement`, or append it
    pub fn replace_child(&mut self, name: &str, replacement: Element) {
        let slot = self
            .children
            .iter_mut()
            .find(|node| matches!(node, Node::Element(element) if element.name == name));
        match slot {
            Some(node) => *node = Node::Element(replacement),
            None => self.children.push(Node::Element(replacement)),
        }
    }

    /// Concatenated text and CDATA content of this element (not descendants)
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) | Node::CData(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Depth-first search for the first descendant (or self) named `name`
    pub fn find(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.elements().find_map(|element| element.find(name))
    }

    /// Compact serialization, used for payloads embedded in other documents
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        self.write(&mut out, None, 0);
        out
    }

    /// Indented serialization with an XML declaration
    pub fn to_document_string(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        self.write(&mut out, Some(2), 0);
        out.push('\n');
        out
    }

    fn write(&self, out: &mut String, indent: Option<usize>, depth: usize) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');

        // Mixed content is never re-indented, whitespace would become significant
        let element_only = self
            .children
            .iter()
            .all(|node| matches!(node, Node::Element(_)));
        let child_indent = indent.filter(|_| element_only);

        for node in &self.children {
            if let Some(width) = child_indent {
                out.push('\n');
                out.push_str(&" ".repeat(width * (depth + 1)));
            }
            match node {
                Node::Element(element) => element.write(out, child_indent, depth + 1),
                Node::Text(text) => out.push_str(&escape(text.as_str())),
                Node::CData(text) => {
                    out.push_str("<![CDATA[");
                    out.push_str(&text.replace("]]>", "]]]]><![CDATA[>"));
                    out.push_str("]]>");
                }
            }
        }
        if let Some(width) = child_indent {
            out.push('\n');
            out.push_str(&" ".repeat(width * depth));
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// Parse a document and return its root element
pub fn parse(text: &str) -> BundleResult<Element> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(element_from_start(&start)?),
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| xml_error("unexpected closing tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let value = text.unescape()?;
                if value.trim().is_empty() {
                    continue;
                }
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Text(value.into_owned())),
                    None => return Err(xml_error("text outside of the root element")),
                }
            }
            Event::CData(data) => {
                let value = String::from_utf8(data.into_inner().into_owned())
                    .map_err(|e| xml_error(format!("CDATA is not valid UTF-8: {}", e)))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::CData(value)),
                    None => return Err(xml_error("CDATA outside of the root element")),
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and doctypes carry no policy content
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(xml_error(format!("unclosed element '{}'", stack[stack.len() - 1].name)));
    }
    root.ok_or_else(|| xml_error("document has no root element"))
}

fn element_from_start(start: &BytesStart<'_>) -> BundleResult<Element> {
    let name = utf8(start.name().as_ref())?;
    let mut element = Element::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| xml_error(e.to_string()))?;
        let key = utf8(attribute.key.as_ref())?;
        let value = attribute.unescape_value()?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> BundleResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(xml_error("document has more than one root element")),
    }
    Ok(())
}

fn utf8(bytes: &[u8]) -> BundleResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| xml_error(format!("invalid UTF-8 in name: {}", e)))
}

fn xml_error<S: Into<String>>(message: S) -> BundleError {
    BundleError::Xml {
        message: message.into(),
    }
}

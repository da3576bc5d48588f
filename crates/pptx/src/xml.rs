//! Small owned XML tree for the fragments that get rewritten.
//!
//! Slides are streamed event by event; only the subtrees that change (a text
//! body, a picture's crop) are materialized as [`Element`]s, edited, and
//! written back. Everything else passes through untouched.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Write;
use team_core::{Error, Result};

/// Extract the local name from a potentially namespaced XML element name.
pub fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

pub(crate) fn xml_err(e: quick_xml::Error) -> Error {
    Error::Xml(e.to_string())
}

/// Qualified name `prefix:local`, or just `local` without a prefix.
pub fn qualify(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}

/// A child of an [`Element`].
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    /// Text, comments and anything else, kept verbatim.
    Other(Event<'static>),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            Node::Other(_) => None,
        }
    }

    fn is_named(&self, local: &[u8]) -> bool {
        self.as_element().is_some_and(|e| e.local_name() == local)
    }
}

/// An owned element with its subtree.
#[derive(Debug, Clone)]
pub struct Element {
    pub start: BytesStart<'static>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(start: BytesStart<'static>) -> Self {
        Self {
            start,
            children: Vec::new(),
        }
    }

    /// A new empty element with the given qualified name.
    pub fn named(qname: impl Into<String>) -> Self {
        Self::new(BytesStart::new(qname.into()))
    }

    pub fn local_name(&self) -> &[u8] {
        self.start.local_name().into_inner()
    }

    /// Namespace prefix of this element, if any.
    pub fn prefix(&self) -> Option<String> {
        let name = self.start.name();
        let qname = name.as_ref();
        qname
            .iter()
            .position(|&b| b == b':')
            .map(|pos| String::from_utf8_lossy(&qname[..pos]).to_string())
    }

    /// First child element with the given local name.
    pub fn child(&self, local: &[u8]) -> Option<&Element> {
        self.children
            .iter()
            .filter_map(Node::as_element)
            .find(|e| e.local_name() == local)
    }

    pub fn child_mut(&mut self, local: &[u8]) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|n| match n {
            Node::Element(e) if e.local_name() == local => Some(e),
            _ => None,
        })
    }

    /// First descendant element with the given local name, depth first.
    pub fn descendant_mut(&mut self, local: &[u8]) -> Option<&mut Element> {
        for child in &mut self.children {
            if let Node::Element(e) = child {
                if e.local_name() == local {
                    return Some(e);
                }
                if let Some(found) = e.descendant_mut(local) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Child elements with the given local name.
    pub fn children_named<'a>(&'a self, local: &'a [u8]) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter_map(Node::as_element)
            .filter(move |e| e.local_name() == local)
    }

    /// Index of the first child element whose local name is in `locals`.
    pub fn position_of(&self, locals: &[&[u8]]) -> Option<usize> {
        self.children
            .iter()
            .position(|n| locals.iter().any(|local| n.is_named(local)))
    }

    /// Drop every child element whose local name is in `locals`.
    pub fn remove_children(&mut self, locals: &[&[u8]]) {
        self.children
            .retain(|n| !locals.iter().any(|local| n.is_named(local)));
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn insert(&mut self, index: usize, child: Element) {
        let index = index.min(self.children.len());
        self.children.insert(index, Node::Element(child));
    }

    /// Append escaped text content.
    pub fn push_text(&mut self, text: &str) {
        self.children
            .push(Node::Other(Event::Text(BytesText::new(text).into_owned())));
    }

    /// Unescaped text of all descendant text nodes.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Node::Element(e) => out.push_str(&e.text()),
                Node::Other(Event::Text(t)) => out.push_str(&t.unescape().unwrap_or_default()),
                Node::Other(_) => {}
            }
        }
        out
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.start
            .attributes()
            .flatten()
            .any(|a| a.key.as_ref() == key.as_bytes())
    }

    pub fn attr(&self, key: &str) -> Option<String> {
        self.start
            .attributes()
            .flatten()
            .find(|a| a.key.as_ref() == key.as_bytes())
            .map(|a| String::from_utf8_lossy(&a.value).to_string())
    }

    /// Qualified key of the first attribute with the given local name.
    pub fn attr_key(&self, local: &[u8]) -> Option<String> {
        self.start
            .attributes()
            .flatten()
            .find(|a| local_name(a.key.as_ref()) == local)
            .map(|a| String::from_utf8_lossy(a.key.as_ref()).to_string())
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, key: &str, value: &str) {
        let existing: Vec<(Vec<u8>, Vec<u8>)> = self
            .start
            .attributes()
            .flatten()
            .map(|a| (a.key.as_ref().to_vec(), a.value.into_owned()))
            .collect();

        self.start.clear_attributes();
        let mut replaced = false;
        for (k, v) in &existing {
            if k.as_slice() == key.as_bytes() {
                self.start.push_attribute((key, value));
                replaced = true;
            } else {
                self.start.push_attribute((k.as_slice(), v.as_slice()));
            }
        }
        if !replaced {
            self.start.push_attribute((key, value));
        }
    }

    /// Copy of this element under another name, attributes and children kept.
    pub fn renamed(&self, qname: impl Into<String>) -> Element {
        let mut start = BytesStart::new(qname.into());
        start.extend_attributes(self.start.attributes().flatten());
        Element {
            start,
            children: self.children.clone(),
        }
    }

    /// Write this element and its subtree.
    pub fn write_to<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        if self.children.is_empty() {
            return writer
                .write_event(Event::Empty(self.start.borrow()))
                .map_err(xml_err);
        }

        writer
            .write_event(Event::Start(self.start.borrow()))
            .map_err(xml_err)?;
        for child in &self.children {
            match child {
                Node::Element(e) => e.write_to(writer)?,
                Node::Other(event) => writer.write_event(event).map_err(xml_err)?,
            }
        }
        writer
            .write_event(Event::End(self.start.to_end()))
            .map_err(xml_err)
    }
}

/// Read the rest of the element opened by `start` into an owned tree.
pub fn read_subtree(reader: &mut Reader<&[u8]>, start: BytesStart<'_>) -> Result<Element> {
    let mut stack = vec![Element::new(start.into_owned())];

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) => stack.push(Element::new(e.into_owned())),
            Event::Empty(e) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push(Element::new(e.into_owned()));
                }
            }
            Event::End(_) => {
                let Some(done) = stack.pop() else {
                    return Err(Error::Xml("unbalanced end tag".to_string()));
                };
                match stack.last_mut() {
                    Some(parent) => parent.push(done),
                    None => return Ok(done),
                }
            }
            Event::Eof => {
                return Err(Error::Xml("unexpected end of document".to_string()));
            }
            other => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Other(other.into_owned()));
                }
            }
        }
    }
}

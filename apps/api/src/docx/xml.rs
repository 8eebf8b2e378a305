//! Generic XML element tree used by the DOCX codec.
//!
//! Only what a WordprocessingML part needs is modelled: elements with
//! ordered attributes, text, CDATA and comments. Processing instructions and
//! doctype declarations are dropped on read.

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

/// Ordered `(qualified name, unescaped value)` pairs.
pub type Attributes = Vec<(String, String)>;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct XmlError(String);

impl XmlError {
    fn new(message: impl std::fmt::Display) -> Self {
        Self(message.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Attributes,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub declaration: Option<Declaration>,
    pub root: Element,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attributes(name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            name: name.into(),
            attributes,
            children: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map(|(_, local)| local)
            .unwrap_or(&self.name)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> + '_ {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// Concatenated text of all descendant text and CDATA nodes.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(el: &Element, out: &mut String) {
    for node in &el.children {
        match node {
            Node::Element(child) => collect_text(child, out),
            Node::Text(text) | Node::CData(text) => out.push_str(text),
            Node::Comment(_) => {}
        }
    }
}

pub fn parse(bytes: &[u8]) -> Result<XmlDocument, XmlError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut declaration = None;
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            XmlError::new(format!("at byte {}: {e}", reader.buffer_position()))
        })?;

        match event {
            Event::Decl(decl) => declaration = Some(read_declaration(&decl)?),
            Event::Start(start) => stack.push(read_start(&start)?),
            Event::Empty(start) => {
                let el = read_start(&start)?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::End(_) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| XmlError::new("unbalanced end tag"))?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::Text(text) => {
                // Text outside the root element (line breaks after the prolog) is not content.
                if let Some(parent) = stack.last_mut() {
                    let value = text.unescape().map_err(XmlError::new)?;
                    parent.children.push(Node::Text(value.into_owned()));
                }
            }
            Event::CData(cdata) => {
                if let Some(parent) = stack.last_mut() {
                    let value = String::from_utf8(cdata.into_inner().into_owned())
                        .map_err(XmlError::new)?;
                    parent.children.push(Node::CData(value));
                }
            }
            Event::Comment(comment) => {
                if let Some(parent) = stack.last_mut() {
                    let value = String::from_utf8(comment.into_inner().into_owned())
                        .map_err(XmlError::new)?;
                    parent.children.push(Node::Comment(value));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(XmlError::new(format!(
            "unexpected end of input inside <{}>",
            stack.last().map(|el| el.name.as_str()).unwrap_or_default()
        )));
    }

    let root = root.ok_or_else(|| XmlError::new("document has no root element"))?;
    Ok(XmlDocument { declaration, root })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(el)),
        None if root.is_none() => *root = Some(el),
        None => return Err(XmlError::new("multiple root elements")),
    }
    Ok(())
}

fn read_start(start: &BytesStart<'_>) -> Result<Element, XmlError> {
    let name = utf8(start.name().as_ref())?;

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(XmlError::new)?;
        let key = utf8(attr.key.as_ref())?;
        let value = attr.unescape_value().map_err(XmlError::new)?.into_owned();
        attributes.push((key, value));
    }

    Ok(Element::with_attributes(name, attributes))
}

fn read_declaration(decl: &BytesDecl<'_>) -> Result<Declaration, XmlError> {
    let version = utf8(&decl.version().map_err(XmlError::new)?)?;
    let encoding = match decl.encoding() {
        Some(enc) => Some(utf8(&enc.map_err(XmlError::new)?)?),
        None => None,
    };
    let standalone = match decl.standalone() {
        Some(sa) => Some(utf8(&sa.map_err(XmlError::new)?)?),
        None => None,
    };

    Ok(Declaration {
        version,
        encoding,
        standalone,
    })
}

fn utf8(bytes: &[u8]) -> Result<String, XmlError> {
    Ok(std::str::from_utf8(bytes).map_err(XmlError::new)?.to_string())
}

pub fn write(doc: &XmlDocument) -> Result<Vec<u8>, XmlError> {
    let mut writer = Writer::new(Vec::new());

    if let Some(decl) = &doc.declaration {
        writer
            .write_event(Event::Decl(BytesDecl::new(
                &decl.version,
                decl.encoding.as_deref(),
                decl.standalone.as_deref(),
            )))
            .map_err(XmlError::new)?;
        // Word emits CRLF after the prolog.
        writer
            .write_event(Event::Text(BytesText::from_escaped("\r\n")))
            .map_err(XmlError::new)?;
    }

    write_element(&mut writer, &doc.root)?;
    Ok(writer.into_inner())
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(el.name.as_str());
    for (key, value) in &el.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if el.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(XmlError::new);
    }

    writer
        .write_event(Event::Start(start))
        .map_err(XmlError::new)?;

    for node in &el.children {
        match node {
            Node::Element(child) => write_element(writer, child)?,
            Node::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(XmlError::new)?,
            Node::CData(text) => writer
                .write_event(Event::CData(BytesCData::new(text.as_str())))
                .map_err(XmlError::new)?,
            Node::Comment(text) => writer
                .write_event(Event::Comment(BytesText::from_escaped(text.as_str())))
                .map_err(XmlError::new)?,
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new(el.name.as_str())))
        .map_err(XmlError::new)
}

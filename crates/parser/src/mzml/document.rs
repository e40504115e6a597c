use std::io::Cursor;

use hashbrown::HashMap;
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use crate::error::RipError;

/// One node of the parsed document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Local name, without any namespace prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn accession(&self) -> Option<&str> {
        self.attr("accession")
    }

    pub fn value(&self) -> Option<&str> {
        self.attr("value")
    }

    /// Direct children that carry a controlled-vocabulary accession.
    pub fn params(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter(|c| c.accession().is_some())
    }

    pub fn params_with_accession<'a>(
        &'a self,
        accession: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.params()
            .filter(move |p| p.accession() == Some(accession))
    }

    /// Pre-order walk over everything below this element.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: vec![self.children.iter()],
        }
    }
}

pub struct Descendants<'a> {
    stack: Vec<std::slice::Iter<'a, Element>>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(el) => {
                    self.stack.push(el.children.iter());
                    return Some(el);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// An mzML file held fully in memory.
#[derive(Debug, Clone)]
pub struct Document {
    root: Element,
    param_groups: HashMap<String, Element>,
}

impl Document {
    pub fn parse(bytes: &[u8]) -> Result<Self, RipError> {
        let mut reader = Reader::from_reader(Cursor::new(bytes));
        let mut buf = Vec::with_capacity(1024);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| {
                RipError::MalformedDocument(format!("{e} (at byte {})", reader.error_position()))
            })?;
            match event {
                Event::Start(e) => stack.push(open_element(&e)?),
                Event::Empty(e) => {
                    let el = open_element(&e)?;
                    attach(&mut stack, &mut root, el)?;
                }
                Event::End(e) => {
                    let Some(mut el) = stack.pop() else {
                        return Err(RipError::MalformedDocument(format!(
                            "unexpected closing tag </{}>",
                            String::from_utf8_lossy(e.name().as_ref())
                        )));
                    };
                    let trimmed = el.text.trim();
                    if trimmed.len() != el.text.len() {
                        el.text = trimmed.to_string();
                    }
                    attach(&mut stack, &mut root, el)?;
                }
                Event::Text(t) => {
                    if let Some(top) = stack.last_mut() {
                        top.text
                            .push_str(&t.decode().map_err(quick_xml::Error::from)?);
                    }
                }
                Event::CData(t) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                    }
                }
                Event::GeneralRef(r) => {
                    if let Some(top) = stack.last_mut() {
                        let name = r.decode().map_err(quick_xml::Error::from)?;
                        let entity = format!("&{name};");
                        top.text
                            .push_str(&unescape(&entity).map_err(quick_xml::Error::from)?);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(RipError::MalformedDocument(format!(
                "unexpected end of document inside <{}>",
                open.name
            )));
        }
        let root =
            root.ok_or_else(|| RipError::MalformedDocument("no root element".to_string()))?;

        Ok(Self::from_root(root))
    }

    pub fn from_root(root: Element) -> Self {
        let param_groups = std::iter::once(&root)
            .chain(root.descendants())
            .filter(|el| el.name == "referenceableParamGroup")
            .filter_map(|el| el.attr("id").map(|id| (id.to_string(), el.clone())))
            .collect();
        Document { root, param_groups }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn param_group(&self, id: &str) -> Option<&Element> {
        self.param_groups.get(id)
    }

    /// Parameters of `el`, followed by those of every param group it references.
    pub fn params_of<'a>(&'a self, el: &'a Element) -> Vec<&'a Element> {
        let mut out: Vec<&Element> = el.params().collect();
        for group in el
            .children
            .iter()
            .filter_map(|c| c.attr("ref"))
            .filter_map(|id| self.param_group(id))
        {
            out.extend(group.params());
        }
        out
    }
}

#[inline]
fn local_name(mut raw: &[u8]) -> &[u8] {
    if raw.first() == Some(&b'{') {
        if let Some(end) = raw.iter().position(|&b| b == b'}') {
            raw = &raw[end + 1..];
        }
    }
    if let Some(colon) = raw.iter().rposition(|&b| b == b':') {
        &raw[colon + 1..]
    } else {
        raw
    }
}

fn open_element(start: &BytesStart) -> Result<Element, RipError> {
    let mut el = Element::new(String::from_utf8_lossy(local_name(start.name().as_ref())));
    for a in start.attributes().with_checks(false).flatten() {
        let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
        let value = a.unescape_value()?.into_owned();
        el.attributes.push((key, value));
    }
    Ok(el)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    el: Element,
) -> Result<(), RipError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(el);
        return Ok(());
    }
    if root.is_some() {
        return Err(RipError::MalformedDocument(format!(
            "second root element <{}>",
            el.name
        )));
    }
    *root = Some(el);
    Ok(())
}

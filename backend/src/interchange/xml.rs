//! A small owned element tree over quick-xml.
//!
//! The solver's documents are plain nested elements with text leaves and a handful of
//! attributes, so an owned tree is enough. Writing preserves child and attribute order,
//! which keeps serialization byte-stable for a given tree.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::InterchangeError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Shorthand for `<name>text</name>`.
    pub fn leaf(name: impl Into<String>, text: impl ToString) -> Self {
        Self {
            name: name.into(),
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_leaf(self, name: impl Into<String>, text: impl ToString) -> Self {
        self.with_child(Element::leaf(name, text))
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first child called `name`.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name)
            .and_then(|c| c.text.as_deref())
            .map(str::trim)
    }

    /// Trimmed text of every child called `name`, in document order.
    pub fn child_texts(&self, name: &str) -> Vec<String> {
        self.children_named(name)
            .filter_map(|c| c.text.as_deref())
            .map(|t| t.trim().to_string())
            .collect()
    }
}

fn xml_err(e: impl std::fmt::Display) -> InterchangeError {
    InterchangeError::Xml(e.to_string())
}

/// Render `root` as an indented document with an XML declaration.
pub fn write_document(root: &Element) -> Result<String, InterchangeError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;
    write_element(&mut writer, root)?;

    let mut text = String::from_utf8(writer.into_inner()).map_err(xml_err)?;
    text.push('\n');
    Ok(text)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), InterchangeError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    let text = element.text.as_deref().filter(|t| !t.is_empty());
    if text.is_none() && element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(xml_err);
    }

    writer.write_event(Event::Start(start)).map_err(xml_err)?;
    if let Some(text) = text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_err)?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(xml_err)
}

fn start_to_element(start: &BytesStart<'_>) -> Result<Element, InterchangeError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(xml_err)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_err)?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

/// Parse a document into its root element.
pub fn read_document(text: &str) -> Result<Element, InterchangeError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(start) => stack.push(start_to_element(&start)?),
            Event::Empty(start) => {
                let element = start_to_element(&start)?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(t) => {
                let value = t.unescape().map_err(xml_err)?;
                if let Some(current) = stack.last_mut() {
                    current.text.get_or_insert_with(String::new).push_str(&value);
                }
            }
            Event::CData(c) => {
                let value = String::from_utf8_lossy(&c.into_inner()).into_owned();
                if let Some(current) = stack.last_mut() {
                    current.text.get_or_insert_with(String::new).push_str(&value);
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| InterchangeError::Xml("Unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, element);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(InterchangeError::Xml(format!(
            "Document ended inside <{}>",
            stack.last().map(|e| e.name.as_str()).unwrap_or_default()
        )));
    }

    root.ok_or_else(|| InterchangeError::Xml("Document has no root element".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_empty_elements_self_closed() {
        let root = Element::new("fet")
            .with_attr("version", "7.3.0")
            .with_child(Element::new("Activity_Tags_List"))
            .with_leaf("Name", "A & B");
        let text = write_document(&root).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(text.contains("<Activity_Tags_List/>"));
        assert!(text.contains("<Name>A &amp; B</Name>"));
    }

    #[test]
    fn reads_back_written_tree() {
        let root = Element::new("fet")
            .with_attr("version", "7.3.0")
            .with_child(
                Element::new("Days_List")
                    .with_leaf("Number_of_Days", 2)
                    .with_child(Element::new("Day").with_leaf("Name", "1"))
                    .with_child(Element::new("Day").with_leaf("Name", "2")),
            );
        let parsed = read_document(&write_document(&root).unwrap()).unwrap();
        assert_eq!(parsed, root);
        assert_eq!(parsed.attr("version"), Some("7.3.0"));
        let days = parsed.child("Days_List").unwrap();
        assert_eq!(days.children_named("Day").count(), 2);
        assert_eq!(days.child_text("Number_of_Days"), Some("2"));
    }

    #[test]
    fn rejects_truncated_document() {
        let err = read_document("<fet><Activities_List>").unwrap_err();
        assert!(matches!(err, InterchangeError::Xml(_)));
    }
}

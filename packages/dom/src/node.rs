use serde::{Deserialize, Serialize};

/// Handle to a node in a [`crate::Document`] arena.
///
/// Handles stay valid after a node is detached, so late readers (mutation
/// observers) can still serialize it. Once the document reclaims a detached
/// subtree its slots are reused under a new generation and old handles stop
/// resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(self) -> usize {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Elements whose content is never markup and never entity-decoded
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Elements whose content is text but entity-decoded
pub const ESCAPABLE_RAW_TEXT_ELEMENTS: &[&str] = &["textarea", "title"];

pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Tags whose value is exposed as a live form value
pub const FORM_CONTROLS: &[&str] = &["input", "textarea", "select"];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

pub fn is_raw_text_element(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

pub fn is_escapable_raw_text_element(tag: &str) -> bool {
    ESCAPABLE_RAW_TEXT_ELEMENTS
        .iter()
        .any(|t| t.eq_ignore_ascii_case(tag))
}

pub fn is_form_control(tag: &str) -> bool {
    FORM_CONTROLS.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Document,
    Doctype(String),
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    /// Lowercase local name
    pub tag: String,
    /// Attributes in source order; names are lowercase
    pub attributes: Vec<(String, String)>,
    /// Live `value` property; `None` means the property still mirrors the attribute
    pub value: Option<String>,
    /// Live `checked` property; `None` means it still mirrors the attribute
    pub checked: Option<bool>,
}

impl ElementData {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attributes: Vec::new(),
            value: None,
            checked: None,
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the previous value, if any
    pub fn set_attribute(&mut self, name: String, value: String) -> Option<String> {
        let name = name.to_ascii_lowercase();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.attributes.push((name, value));
                None
            }
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let pos = self
            .attributes
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))?;
        Some(self.attributes.remove(pos).1)
    }

    pub fn is_form_control(&self) -> bool {
        is_form_control(&self.tag)
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) data: NodeData,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    /// `nodeName`-style descriptor: lowercase tag for elements, `#text` etc. otherwise
    pub fn node_name(&self) -> &str {
        match &self.data {
            NodeData::Document => "#document",
            NodeData::Doctype(name) => name,
            NodeData::Element(element) => &element.tag,
            NodeData::Text(_) => "#text",
            NodeData::Comment(_) => "#comment",
        }
    }
}

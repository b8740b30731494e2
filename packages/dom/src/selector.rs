//! # Positional Addressing
//!
//! An [`Address`] is the chain of `(tag, ordinal)` pairs from the document
//! element down to a node, where the ordinal counts preceding element
//! siblings with the same tag. It renders as a strict child-combinator
//! selector: `html>body>ul:nth-of-type(1)>li:nth-of-type(2)`.
//!
//! ## Format
//!
//! `html`, `head` and `body` are written bare. Every other segment carries
//! `:nth-of-type(n)` with `n >= 1`. Parsing accepts only this grammar;
//! whitespace, other combinators and other pseudo-classes are errors.
//!
//! ## Stability
//!
//! Addresses are derived from live structure each time and only identify the
//! same node in two trees that have the same shape along that path.
//! Inserting a same-tag sibling earlier shifts the ordinal. After an earlier
//! same-tag sibling is removed, an address taken before the removal that no
//! longer lands on a node resolves to nothing; one that still lands on a
//! node of the same shape is taken at face value.
//!
//! ## Resolution
//!
//! [`resolve`] walks element children only. Text and comment children are
//! reached by name through [`resolve_child`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::Document;
use crate::node::NodeId;

/// Rendered without an ordinal; there is only ever one of each
const SINGLETON_TAGS: &[&str] = &["html", "head", "body"];

const NTH_OF_TYPE: &str = ":nth-of-type(";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    /// Lowercase tag name
    pub tag: String,
    /// 1-based position among same-tag element siblings
    pub ordinal: usize,
}

impl Segment {
    pub fn new(tag: impl Into<String>, ordinal: usize) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ordinal,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ordinal == 1 && SINGLETON_TAGS.contains(&self.tag.as_str()) {
            write!(f, "{}", self.tag)
        } else {
            write!(f, "{}{}{})", self.tag, NTH_OF_TYPE, self.ordinal)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Address {
    pub segments: Vec<Segment>,
}

impl Address {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether `prefix` names this node or one of its ancestors
    pub fn starts_with(&self, prefix: &Address) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    pub fn parent(&self) -> Option<Address> {
        let (_, rest) = self.segments.split_last()?;
        Some(Address::new(rest.to_vec()))
    }

    pub fn child(&self, segment: Segment) -> Address {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Address::new(segments)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(">")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("Empty address")]
    Empty,

    #[error("Empty segment at position {0}")]
    EmptySegment(usize),

    #[error("Invalid tag name '{0}'")]
    InvalidTag(String),

    #[error("Invalid ordinal in segment '{0}'")]
    InvalidOrdinal(String),

    #[error("Unsupported selector syntax in segment '{0}'")]
    Unsupported(String),
}

fn parse_segment(index: usize, raw: &str) -> Result<Segment, AddressParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AddressParseError::EmptySegment(index));
    }

    let (tag, ordinal) = match raw.find(':') {
        None => (raw, 1),
        Some(colon) => {
            let pseudo = &raw[colon..];
            let digits = pseudo
                .strip_prefix(NTH_OF_TYPE)
                .and_then(|rest| rest.strip_suffix(')'))
                .ok_or_else(|| AddressParseError::Unsupported(raw.to_string()))?;
            let ordinal = digits
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| AddressParseError::InvalidOrdinal(raw.to_string()))?;
            (&raw[..colon], ordinal)
        }
    };

    let valid_tag = tag
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid_tag {
        return Err(AddressParseError::InvalidTag(tag.to_string()));
    }

    Ok(Segment::new(tag, ordinal))
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(AddressParseError::Empty);
        }
        let segments = s
            .split('>')
            .enumerate()
            .map(|(i, raw)| parse_segment(i, raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Address::new(segments))
    }
}

/// Address of an element attached to the document; `None` for detached
/// nodes and for anything that is not an element.
pub fn address_of(doc: &Document, node: NodeId) -> Option<Address> {
    let mut segments = Vec::new();
    let mut current = node;

    while current != doc.root() {
        let tag = doc.tag_name(current)?;
        let parent = doc.parent(current)?;
        let ordinal = 1 + doc
            .element_children(parent)
            .take_while(|sibling| *sibling != current)
            .filter(|sibling| {
                doc.tag_name(*sibling)
                    .is_some_and(|t| t.eq_ignore_ascii_case(tag))
            })
            .count();
        segments.push(Segment::new(tag, ordinal));
        current = parent;
    }

    if segments.is_empty() {
        return None;
    }
    segments.reverse();
    Some(Address::new(segments))
}

/// The `ordinal`-th element child of `parent` with the given tag
pub fn nth_child_of_type(doc: &Document, parent: NodeId, tag: &str, ordinal: usize) -> Option<NodeId> {
    if ordinal == 0 {
        return None;
    }
    doc.element_children(parent)
        .filter(|child| {
            doc.tag_name(*child)
                .is_some_and(|t| t.eq_ignore_ascii_case(tag))
        })
        .nth(ordinal - 1)
}

/// Walk `address` down from the document node. Any miss is `None`.
pub fn resolve(doc: &Document, address: &Address) -> Option<NodeId> {
    if address.is_empty() {
        return None;
    }
    address
        .segments
        .iter()
        .try_fold(doc.root(), |parent, segment| {
            nth_child_of_type(doc, parent, &segment.tag, segment.ordinal)
        })
}

/// First direct child of `parent` whose node name is `name`: a tag, or
/// `#text` / `#comment` for character data
pub fn resolve_child(doc: &Document, parent: NodeId, name: &str) -> Option<NodeId> {
    doc.children(parent).iter().copied().find(|child| {
        doc.node(*child)
            .is_some_and(|node| node.node_name().eq_ignore_ascii_case(name))
    })
}

/// Parse and resolve in one step; unparseable selectors resolve to nothing
pub fn resolve_str(doc: &Document, selector: &str) -> Option<NodeId> {
    let address = selector.parse::<Address>().ok()?;
    resolve(doc, &address)
}

impl Document {
    pub fn address_of(&self, node: NodeId) -> Option<Address> {
        address_of(self, node)
    }

    pub fn resolve(&self, address: &Address) -> Option<NodeId> {
        resolve(self, address)
    }

    pub fn query_address(&self, selector: &str) -> Option<NodeId> {
        resolve_str(self, selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_singletons_bare() {
        let doc = Document::parse("<body><ul><li>a</li><li>b</li></ul></body>");
        let second = doc.elements_by_tag(doc.root(), "li")[1];
        let address = doc.address_of(second).unwrap();
        assert_eq!(
            address.to_string(),
            "html>body>ul:nth-of-type(1)>li:nth-of-type(2)"
        );
    }

    #[test]
    fn test_parse_bare_segment_is_first_of_type() {
        let address: Address = "html > body > div".parse().unwrap();
        assert_eq!(address.segments[2], Segment::new("div", 1));
        let explicit: Address = "html>body>div:nth-of-type(1)".parse().unwrap();
        assert_eq!(address, explicit);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Address>(), Err(AddressParseError::Empty));
        assert_eq!(
            "html>>body".parse::<Address>(),
            Err(AddressParseError::EmptySegment(1))
        );
        assert!(matches!(
            "html>div:nth-of-type(0)".parse::<Address>(),
            Err(AddressParseError::InvalidOrdinal(_))
        ));
        assert!(matches!(
            "html>div:first-child".parse::<Address>(),
            Err(AddressParseError::Unsupported(_))
        ));
        assert!(matches!(
            "html>.x".parse::<Address>(),
            Err(AddressParseError::InvalidTag(_))
        ));
    }

    #[test]
    fn test_non_elements_have_no_address() {
        let mut doc = Document::parse("<body>text</body>");
        let body = doc.body().unwrap();
        let text = doc.children(body)[0];
        assert_eq!(doc.address_of(text), None);
        assert_eq!(doc.address_of(doc.root()), None);

        let detached = doc.create_element("div");
        assert_eq!(doc.address_of(detached), None);
    }

    #[test]
    fn test_other_tags_and_text_do_not_count() {
        let doc = Document::parse("<body>x<span></span><div></div>y<p></p><div id=\"t\"></div></body>");
        let target = doc
            .elements_by_tag(doc.root(), "div")
            .into_iter()
            .find(|d| doc.attribute(*d, "id") == Some("t"))
            .unwrap();
        assert_eq!(
            doc.address_of(target).unwrap().to_string(),
            "html>body>div:nth-of-type(2)"
        );
    }

    #[test]
    fn test_resolve_miss_is_none() {
        let doc = Document::parse("<body><div></div></body>");
        assert!(doc.query_address("html>body>div:nth-of-type(1)").is_some());
        assert_eq!(doc.query_address("html>body>div:nth-of-type(2)"), None);
        assert_eq!(doc.query_address("html>body>section"), None);
        assert_eq!(doc.query_address("not a selector!"), None);
    }

    #[test]
    fn test_resolve_child_by_node_name() {
        let doc = Document::parse("<body><ul>x<li>a</li><li>b</li></ul></body>");
        let ul = doc.first_element_by_tag(doc.root(), "ul").unwrap();
        let first_li = doc.elements_by_tag(ul, "li")[0];
        assert_eq!(resolve_child(&doc, ul, "LI"), Some(first_li));
        assert_eq!(resolve_child(&doc, ul, "#text"), Some(doc.children(ul)[0]));
        assert_eq!(resolve_child(&doc, ul, "span"), None);
    }

    #[test]
    fn test_address_helpers() {
        let address: Address = "html>body>div:nth-of-type(1)".parse().unwrap();
        let body = address.parent().unwrap();
        assert!(address.starts_with(&body));
        assert_eq!(body.child(Segment::new("div", 1)), address);
    }
}

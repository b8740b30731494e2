//! HTML parsing and serialization
//!
//! The parser is forgiving: it never fails. Stray markup characters become
//! text, unmatched end tags are ignored and open elements are closed at the
//! end of input. Serialization always quotes attributes and escapes text, so
//! `parse(serialize(parse(x)))` has the same shape as `parse(x)`.

use logos::Logos;
use tracing::trace;

use crate::document::Document;
use crate::error::{DomError, DomResult};
use crate::lexer::{decode_entities, end_tag_name, parse_start_tag, HtmlToken};
use crate::node::{
    is_escapable_raw_text_element, is_raw_text_element, is_void_element, ElementData, NodeData,
    NodeId,
};

/// Elements that close an open `<p>`
const CLOSES_PARAGRAPH: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "footer", "form", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p", "pre", "section",
    "table", "ul",
];

/// Elements moved into an implied `<head>`
const HEAD_CONTENT: &[&str] = &["base", "link", "meta", "title", "style"];

/// Where [`Document::insert_adjacent_html`] puts the parsed nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjacentPosition {
    BeforeBegin,
    AfterBegin,
    BeforeEnd,
    AfterEnd,
}

struct TreeBuilder<'doc> {
    doc: &'doc mut Document,
    stack: Vec<NodeId>,
    roots: Vec<NodeId>,
    text: String,
}

impl<'doc> TreeBuilder<'doc> {
    fn new(doc: &'doc mut Document) -> Self {
        Self {
            doc,
            stack: Vec::new(),
            roots: Vec::new(),
            text: String::new(),
        }
    }

    fn current_tag(&self) -> Option<&str> {
        self.stack.last().and_then(|id| self.doc.tag_name(*id))
    }

    fn insert(&mut self, node: NodeId) {
        match self.stack.last() {
            Some(parent) => self.doc.attach_raw(*parent, node, None),
            None => self.roots.push(node),
        }
    }

    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let data = std::mem::take(&mut self.text);
        let node = self.doc.create_text(data);
        self.insert(node);
    }

    fn close_implied(&mut self, opening: &str) {
        loop {
            let Some(top) = self.current_tag() else {
                return;
            };
            let closes = match opening {
                "li" => top == "li",
                "option" => top == "option",
                "dt" | "dd" => top == "dt" || top == "dd",
                "td" | "th" => top == "td" || top == "th",
                "tr" => matches!(top, "td" | "th" | "tr"),
                _ => top == "p" && CLOSES_PARAGRAPH.contains(&opening),
            };
            if !closes {
                return;
            }
            let popped_tr = top == "tr";
            self.stack.pop();
            if popped_tr || opening != "tr" {
                return;
            }
        }
    }

    fn start_tag(&mut self, slice: &str) -> Option<String> {
        self.flush_text();
        let tag = parse_start_tag(slice);
        self.close_implied(&tag.name);

        let mut element = ElementData::new(tag.name.as_str());
        element.attributes = tag.attributes;
        let node = self.doc.create_element_with(element);
        self.insert(node);

        if tag.self_closing || is_void_element(&tag.name) {
            return None;
        }
        self.stack.push(node);
        Some(tag.name)
    }

    fn end_tag(&mut self, slice: &str) {
        self.flush_text();
        let name = end_tag_name(slice);
        let open = self
            .stack
            .iter()
            .rposition(|id| self.doc.tag_name(*id) == Some(name.as_str()));
        match open {
            Some(pos) => self.stack.truncate(pos),
            None => trace!(tag = %name, "ignoring unmatched end tag"),
        }
    }

    fn build(mut self, source: &str) -> Vec<NodeId> {
        let mut lexer = HtmlToken::lexer(source);

        while let Some(token) = lexer.next() {
            match token {
                Ok(HtmlToken::Text(text)) => self.text.push_str(&decode_entities(text)),
                // Unparseable runs stay as literal text
                Err(()) => self.text.push_str(lexer.slice()),
                Ok(HtmlToken::Comment(data)) => {
                    self.flush_text();
                    let node = self.doc.create_comment(data);
                    self.insert(node);
                }
                Ok(HtmlToken::Doctype(slice)) => {
                    self.flush_text();
                    let name = slice[2..slice.len() - 1]
                        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
                        .trim()
                        .to_string();
                    let node = self.doc.create_node(NodeData::Doctype(name));
                    self.insert(node);
                }
                Ok(HtmlToken::EndTag(slice)) => self.end_tag(slice),
                Ok(HtmlToken::StartTag(slice)) => {
                    let Some(name) = self.start_tag(slice) else {
                        continue;
                    };
                    if !is_raw_text_element(&name) && !is_escapable_raw_text_element(&name) {
                        continue;
                    }
                    let rest = lexer.remainder();
                    let end = find_raw_text_end(rest, &name).unwrap_or(rest.len());
                    let raw = &rest[..end];
                    if is_escapable_raw_text_element(&name) {
                        self.text.push_str(&decode_entities(raw));
                    } else {
                        self.text.push_str(raw);
                    }
                    lexer.bump(end);
                }
            }
        }

        self.flush_text();
        self.roots
    }
}

/// Offset of the `</tag` that closes a raw-text element, case-insensitively
fn find_raw_text_end(rest: &str, tag: &str) -> Option<usize> {
    let lower = rest.to_ascii_lowercase();
    let needle = format!("</{tag}");
    let mut from = 0;
    while let Some(pos) = lower[from..].find(&needle) {
        let at = from + pos;
        let boundary = lower[at + needle.len()..]
            .chars()
            .next()
            .map_or(true, |c| c == '>' || c == '/' || c.is_ascii_whitespace());
        if boundary {
            return Some(at);
        }
        from = at + needle.len();
    }
    None
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

impl Document {
    /// Parse a full document. `html`, `head` and `body` are implied when missing.
    pub fn parse(html: &str) -> Self {
        let mut doc = Document::new();
        let roots = TreeBuilder::new(&mut doc).build(html);
        let root = doc.root();
        for node in roots {
            doc.attach_raw(root, node, None);
        }
        doc.ensure_structure();
        doc
    }

    /// Parse a fragment into detached nodes owned by this document
    pub fn parse_fragment(&mut self, html: &str) -> Vec<NodeId> {
        TreeBuilder::new(self).build(html)
    }

    fn ensure_structure(&mut self) {
        let root = self.root();
        let html = match self.child_with_tag(root, "html") {
            Some(html) => html,
            None => {
                let html = self.create_element("html");
                let loose: Vec<NodeId> = self
                    .children(root)
                    .iter()
                    .copied()
                    .filter(|c| !matches!(self.nodes[c.index].data, NodeData::Doctype(_)))
                    .collect();
                for node in loose {
                    self.detach_raw(node);
                    self.attach_raw(html, node, None);
                }
                self.attach_raw(root, html, None);
                html
            }
        };

        let head = self.child_with_tag(html, "head");
        let body = self.child_with_tag(html, "body");
        if head.is_some() && body.is_some() {
            return;
        }

        let head = head.unwrap_or_else(|| {
            let head = self.create_element("head");
            self.attach_raw(html, head, Some(0));
            head
        });
        let body = body.unwrap_or_else(|| {
            let body = self.create_element("body");
            self.attach_raw(html, body, None);
            body
        });

        let loose: Vec<NodeId> = self
            .children(html)
            .iter()
            .copied()
            .filter(|c| *c != head && *c != body)
            .collect();
        let mut body_index = 0;
        for node in loose {
            self.detach_raw(node);
            let is_head_content = self
                .tag_name(node)
                .is_some_and(|tag| HEAD_CONTENT.contains(&tag));
            let is_blank = self
                .text_data(node)
                .is_some_and(|text| self.nodes[node.index].is_text() && text.trim().is_empty());
            if is_head_content && body_index == 0 {
                self.attach_raw(head, node, None);
            } else if !is_blank {
                self.attach_raw(body, node, Some(body_index));
                body_index += 1;
            }
        }
    }

    /// Serialize the whole document
    pub fn to_html(&self) -> String {
        self.inner_html(self.root())
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_node(*child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.data {
            NodeData::Document => {
                for child in &node.children {
                    self.write_node(*child, out);
                }
            }
            NodeData::Doctype(name) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(name);
                out.push('>');
            }
            NodeData::Comment(data) => {
                out.push_str("<!--");
                out.push_str(data);
                out.push_str("-->");
            }
            NodeData::Text(data) => {
                let raw = node
                    .parent
                    .and_then(|p| self.tag_name(p))
                    .is_some_and(is_raw_text_element);
                if raw {
                    out.push_str(data);
                } else {
                    escape_text(data, out);
                }
            }
            NodeData::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_attribute(value, out);
                    out.push('"');
                }
                out.push('>');
                if is_void_element(&element.tag) {
                    return;
                }
                for child in &node.children {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.tag);
                out.push('>');
            }
        }
    }

    /// `innerHTML` setter, recorded as one child-list change
    pub fn set_inner_html(&mut self, id: NodeId, html: &str) -> DomResult<()> {
        if !self.is_element(id) {
            return Err(DomError::NotAnElement(id));
        }
        let children = self.parse_fragment(html);
        self.replace_children(id, children)
    }

    /// `insertAdjacentHTML`, recorded as one child-list change.
    /// Returns the inserted top-level nodes.
    pub fn insert_adjacent_html(
        &mut self,
        id: NodeId,
        position: AdjacentPosition,
        html: &str,
    ) -> DomResult<Vec<NodeId>> {
        if !self.is_element(id) {
            return Err(DomError::NotAnElement(id));
        }
        let nodes = self.parse_fragment(html);
        if nodes.is_empty() {
            return Ok(nodes);
        }

        match position {
            AdjacentPosition::BeforeEnd => self.append_children(id, nodes.clone())?,
            AdjacentPosition::AfterBegin => {
                let first = self.children(id).first().copied();
                self.insert_children_before(id, nodes.clone(), first)?
            }
            AdjacentPosition::BeforeBegin | AdjacentPosition::AfterEnd => {
                let parent = self.parent(id).ok_or(DomError::Detached(id))?;
                let reference = if position == AdjacentPosition::BeforeBegin {
                    Some(id)
                } else {
                    let siblings = self.children(parent);
                    siblings
                        .iter()
                        .position(|c| *c == id)
                        .and_then(|i| siblings.get(i + 1))
                        .copied()
                };
                self.insert_children_before(parent, nodes.clone(), reference)?
            }
        }
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::MutationObserverInit;

    #[test]
    fn test_parse_implies_document_structure() {
        let doc = Document::parse("<title>Hi</title><p>one");
        assert_eq!(
            doc.to_html(),
            "<html><head><title>Hi</title></head><body><p>one</p></body></html>"
        );
        assert_eq!(doc.title().as_deref(), Some("Hi"));
    }

    #[test]
    fn test_explicit_structure_is_kept() {
        let source = "<!DOCTYPE html><html><head></head><body>\n<div id=\"a\"></div>\n</body></html>";
        let doc = Document::parse(source);
        assert_eq!(doc.to_html(), source);
    }

    #[test]
    fn test_void_and_self_closing_elements() {
        let doc = Document::parse("<body><br><img src=x><span/>t</body>");
        assert_eq!(
            doc.inner_html(doc.body().unwrap()),
            "<br><img src=\"x\"><span></span>t"
        );
    }

    #[test]
    fn test_implied_end_tags() {
        let doc = Document::parse("<ul><li>a<li>b</ul><p>x<div>y</div>");
        let body = doc.body().unwrap();
        assert_eq!(
            doc.inner_html(body),
            "<ul><li>a</li><li>b</li></ul><p>x</p><div>y</div>"
        );
    }

    #[test]
    fn test_unmatched_end_tag_is_ignored() {
        let doc = Document::parse("<body><div>a</span>b</div></body>");
        assert_eq!(doc.inner_html(doc.body().unwrap()), "<div>ab</div>");
    }

    #[test]
    fn test_raw_text_elements() {
        let doc = Document::parse("<body><script>if (a < b && c) {}</script><textarea>&lt;x&gt;</textarea></body>");
        let body = doc.body().unwrap();
        let script = doc.child_with_tag(body, "script").unwrap();
        assert_eq!(doc.text_content(script), "if (a < b && c) {}");
        let textarea = doc.child_with_tag(body, "textarea").unwrap();
        assert_eq!(doc.text_content(textarea), "<x>");
        assert_eq!(
            doc.inner_html(body),
            "<script>if (a < b && c) {}</script><textarea>&lt;x&gt;</textarea>"
        );
    }

    #[test]
    fn test_stray_markup_is_kept_as_text() {
        let mut doc = Document::new();
        let nodes = doc.parse_fragment("1 < 2 <b>bold</b>");
        assert_eq!(nodes.len(), 2);
        assert_eq!(doc.text_content(nodes[0]), "1 < 2 ");
        assert_eq!(doc.outer_html(nodes[0]), "1 &lt; 2 ");
    }

    #[test]
    fn test_serialization_reparses_to_same_markup() {
        let source = "<div title='a \"q\" &amp; b'>x &amp; y<!-- c --><input value=1 disabled></div>";
        let mut doc = Document::new();
        let nodes = doc.parse_fragment(source);
        let first = doc.outer_html(nodes[0]);

        let mut again = Document::new();
        let reparsed = again.parse_fragment(&first);
        assert_eq!(again.outer_html(reparsed[0]), first);
    }

    #[test]
    fn test_insert_adjacent_html_is_one_record() {
        let mut doc = Document::parse("<body><ul><li>a</li></ul></body>");
        let ul = doc.first_element_by_tag(doc.root(), "ul").unwrap();
        doc.observe(doc.root(), MutationObserverInit::all());

        let added = doc
            .insert_adjacent_html(ul, AdjacentPosition::BeforeEnd, "<li>b</li><li>c</li>")
            .unwrap();
        assert_eq!(added.len(), 2);
        let records = doc.take_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].added_nodes, added);
        assert_eq!(doc.inner_html(ul), "<li>a</li><li>b</li><li>c</li>");
    }

    #[test]
    fn test_insert_adjacent_html_positions() {
        let mut doc = Document::parse("<body><p>x</p></body>");
        let p = doc.first_element_by_tag(doc.root(), "p").unwrap();
        doc.insert_adjacent_html(p, AdjacentPosition::AfterBegin, "<i></i>")
            .unwrap();
        doc.insert_adjacent_html(p, AdjacentPosition::BeforeBegin, "<hr>")
            .unwrap();
        doc.insert_adjacent_html(p, AdjacentPosition::AfterEnd, "<b></b>")
            .unwrap();
        assert_eq!(
            doc.inner_html(doc.body().unwrap()),
            "<hr><p><i></i>x</p><b></b>"
        );

        let detached = doc.create_element("div");
        assert_eq!(
            doc.insert_adjacent_html(detached, AdjacentPosition::AfterEnd, "<b></b>"),
            Err(DomError::Detached(detached))
        );
    }

    #[test]
    fn test_set_inner_html() {
        let mut doc = Document::parse("<body><div><span>old</span></div></body>");
        let div = doc.first_element_by_tag(doc.root(), "div").unwrap();
        doc.observe(doc.root(), MutationObserverInit::all());
        doc.set_inner_html(div, "<em>new</em>").unwrap();

        let records = doc.take_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].removed_nodes[0].node_name, "span");
        assert_eq!(doc.inner_html(div), "<em>new</em>");
    }
}

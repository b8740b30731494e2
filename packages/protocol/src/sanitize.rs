//! Script stripping for markup that leaves the server

use dynaser_dom::{Document, NodeId};
use tracing::trace;

/// Whether an attribute installs an inline event handler (`onclick`, `OnLoad`, ...)
pub fn is_event_handler_attribute(name: &str) -> bool {
    name.get(..2)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("on"))
}

/// Remove `script` elements and event-handler attributes from `nodes` and
/// everything below them.
pub fn strip_scripts(doc: &mut Document, nodes: &[NodeId]) {
    let mut scope: Vec<NodeId> = Vec::new();
    for node in nodes {
        scope.push(*node);
        scope.extend(doc.descendants(*node));
    }

    for node in scope {
        let Some(element) = doc.element(node) else {
            continue;
        };
        if element.tag == "script" {
            // Detached fragments are never observed, so this stays unrecorded
            if doc.parent(node).is_some() {
                let _ = doc.remove(node);
            }
            continue;
        }
        let handlers: Vec<String> = element
            .attributes
            .iter()
            .map(|(name, _)| name.clone())
            .filter(|name| is_event_handler_attribute(name))
            .collect();
        for name in handlers {
            trace!(attribute = %name, "stripping event handler");
            let _ = doc.remove_attribute(node, &name);
        }
    }
}

/// Sanitize a markup fragment: parse it, drop every `script` element and
/// every `on*` attribute, serialize it again.
///
/// Never fails. Runs that cannot be read as markup come back as escaped text.
pub fn sanitize(fragment: &str) -> String {
    let mut doc = Document::new();
    let nodes = doc.parse_fragment(fragment);
    strip_scripts(&mut doc, &nodes);
    nodes
        .iter()
        .filter(|node| doc.tag_name(**node) != Some("script"))
        .map(|node| doc.outer_html(*node))
        .collect()
}

/// Sanitize a whole document, keeping its doctype and structure
pub fn sanitize_document(html: &str) -> String {
    let mut doc = Document::parse(html);
    let root = doc.root();
    let children = doc.children(root).to_vec();
    strip_scripts(&mut doc, &children);
    doc.to_html()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_handler_predicate() {
        assert!(is_event_handler_attribute("onclick"));
        assert!(is_event_handler_attribute("ONLOAD"));
        assert!(is_event_handler_attribute("on"));
        assert!(!is_event_handler_attribute("o"));
        assert!(!is_event_handler_attribute("class"));
        assert!(!is_event_handler_attribute("data-on"));
    }

    #[test]
    fn test_removes_scripts_and_handlers() {
        let out = sanitize(
            "<div onclick=\"evil()\" class=\"x\"><script>alert(1)</script><b OnMouseOver='x'>t</b></div>",
        );
        assert_eq!(out, "<div class=\"x\"><b>t</b></div>");
    }

    #[test]
    fn test_top_level_script_is_dropped() {
        assert_eq!(sanitize("<script>a()</script><p>k</p>"), "<p>k</p>");
    }

    #[test]
    fn test_text_only_fragment() {
        assert_eq!(sanitize("a < b & c"), "a &lt; b &amp; c");
    }

    #[test]
    fn test_is_idempotent() {
        let inputs = [
            "<div onclick=x><script>1</script><p>a<p>b</div>",
            "<ul><li>1<li>2</ul> stray </i> text",
            "<input value=\"&quot;q&quot;\" onchange=y><textarea>&lt;t&gt;</textarea>",
            "<style>p > b { color: red }</style><!-- c --><br/>",
            "<div class='x",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "input: {input}");
        }
    }

    #[test]
    fn test_output_is_complete() {
        let out = sanitize("<p onclick=a><SCRIPT>x</SCRIPT><span ONBLUR=b></span></p>");
        let mut doc = Document::new();
        let nodes = doc.parse_fragment(&out);
        for node in nodes.iter().flat_map(|n| {
            let mut all = vec![*n];
            all.extend(doc.descendants(*n));
            all
        }) {
            assert_ne!(doc.tag_name(node), Some("script"));
            if let Some(element) = doc.element(node) {
                assert!(element
                    .attributes
                    .iter()
                    .all(|(name, _)| !is_event_handler_attribute(name)));
            }
        }
    }

    #[test]
    fn test_sanitize_document_keeps_structure() {
        let out = sanitize_document(
            "<!DOCTYPE html><html><head><script src=a.js></script><title>T</title></head><body onload=\"go()\"><p>x</p></body></html>",
        );
        assert_eq!(
            out,
            "<!DOCTYPE html><html><head><title>T</title></head><body><p>x</p></body></html>"
        );
    }
}

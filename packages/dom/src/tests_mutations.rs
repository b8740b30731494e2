/// Observer behaviour across the higher-level document operations
use crate::*;

fn observed(source: &str) -> Document {
    let mut doc = Document::parse(source);
    doc.observe(doc.root(), MutationObserverInit::all());
    doc
}

#[test]
fn test_records_follow_observation_order() {
    let mut doc = observed("<body><ul></ul><p>t</p></body>");
    let ul = doc.first_element_by_tag(doc.root(), "ul").unwrap();
    let p = doc.first_element_by_tag(doc.root(), "p").unwrap();

    doc.insert_adjacent_html(ul, AdjacentPosition::BeforeEnd, "<li>1</li>")
        .unwrap();
    doc.set_attribute(p, "class", "done").unwrap();
    let text = doc.children(p)[0];
    doc.set_text_data(text, "u").unwrap();
    doc.remove(ul).unwrap();

    let kinds: Vec<MutationKind> = doc.take_records().iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            MutationKind::ChildList,
            MutationKind::Attributes,
            MutationKind::CharacterData,
            MutationKind::ChildList,
        ]
    );
}

#[test]
fn test_observer_options_filter_kinds() {
    let mut doc = Document::parse("<body><p>t</p></body>");
    let p = doc.first_element_by_tag(doc.root(), "p").unwrap();
    doc.observe(
        doc.root(),
        MutationObserverInit {
            child_list: true,
            attributes: false,
            character_data: false,
            subtree: true,
        },
    );

    doc.set_attribute(p, "id", "x").unwrap();
    let text = doc.children(p)[0];
    doc.set_text_data(text, "u").unwrap();
    assert_eq!(doc.pending_records(), 0);

    doc.set_text_content(p, "v").unwrap();
    assert_eq!(doc.pending_records(), 1);
}

#[test]
fn test_without_subtree_only_root_is_observed() {
    let mut doc = Document::parse("<body><div></div></body>");
    let body = doc.body().unwrap();
    let div = doc.first_element_by_tag(doc.root(), "div").unwrap();
    doc.observe(
        body,
        MutationObserverInit {
            subtree: false,
            ..MutationObserverInit::all()
        },
    );

    doc.set_attribute(div, "id", "inner").unwrap();
    doc.set_attribute(body, "id", "outer").unwrap();
    let records = doc.take_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].target, body);
}

#[test]
fn test_removed_node_keeps_its_serialization() {
    let mut doc = observed("<body><section><b>x</b></section></body>");
    let section = doc.first_element_by_tag(doc.root(), "section").unwrap();
    doc.remove(section).unwrap();

    let records = doc.take_records();
    let removed = &records[0].removed_nodes[0];
    assert_eq!(removed.node_name, "section");
    assert_eq!(doc.outer_html(removed.node), "<section><b>x</b></section>");
    assert!(!doc.is_connected(removed.node));
}

#[test]
fn test_disconnect_discards_pending_records() {
    let mut doc = observed("<body></body>");
    let body = doc.body().unwrap();
    doc.set_attribute(body, "a", "1").unwrap();
    doc.disconnect();
    assert!(!doc.is_observed());
    assert!(doc.take_records().is_empty());
}

#[test]
fn test_listener_mutations_are_recorded() {
    use std::sync::Arc;

    let mut doc = observed("<body><button>0</button></body>");
    let button = doc.first_element_by_tag(doc.root(), "button").unwrap();
    let listener: Listener = Arc::new(|doc: &mut Document, event: &DomEvent| {
        let _ = doc.set_attribute(event.target, "data-clicked", "yes");
    });
    doc.add_event_listener(button, "click", ListenerOptions::default(), listener)
        .unwrap();

    doc.click(button).unwrap();
    let records = doc.take_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attribute_name.as_deref(), Some("data-clicked"));
}

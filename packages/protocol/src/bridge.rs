//! # Mutation Bridge
//!
//! The server half of the protocol: observer records from the
//! authoritative document become [`MutationRecord`]s on the wire.
//!
//! ## Translation
//!
//! Each raw record is translated on its own, in observation order, against
//! the tree as it stands when the cycle is drained. Targets are named by
//! their positional address. Added nodes travel as sanitized outer HTML,
//! removed nodes as their node name, attribute changes as the attribute's
//! current value and text changes as `(index, data)` on the parent element.
//!
//! ## Suppression
//!
//! A record produces nothing when its target has no address, when it would
//! carry script (event handler attributes, text inside `<script>`), or when
//! sanitizing leaves a child-list record with neither additions nor
//! removals.
//!
//! ## Delivery
//!
//! [`MutationBridge::flush`] drains one cycle and hands the records to an
//! [`OutboundSink`]. Records for a missing transport are dropped; the next
//! connection starts from a fresh snapshot.

use dynaser_dom::{Document, MutationKind, MutationObserverInit, NodeId, RawMutation};
use tracing::debug;

use crate::engine::DomEngine;
use crate::error::ProtocolError;
use crate::message::{
    AttributeChange, CharacterData, MutationRecord, RemovedNodeDescriptor, ServerMessage,
};
use crate::sanitize::{is_event_handler_attribute, sanitize};

/// Where outbound messages go. Returns `false` when the transport is gone.
pub trait OutboundSink {
    fn send(&self, message: ServerMessage) -> bool;
}

impl<F> OutboundSink for F
where
    F: Fn(ServerMessage) -> bool,
{
    fn send(&self, message: ServerMessage) -> bool {
        self(message)
    }
}

pub struct MutationBridge;

impl MutationBridge {
    /// Observe everything under the document node
    pub fn attach(doc: &mut Document) {
        let root = doc.root();
        doc.observe(root, MutationObserverInit::all());
    }

    fn selector<E: DomEngine + ?Sized>(engine: &E, node: NodeId) -> Option<String> {
        match engine.address_of(node) {
            Some(address) => Some(address.to_string()),
            None => {
                debug!(node = ?node, "mutation target has no address; dropping record");
                None
            }
        }
    }

    /// Translate one raw record. `None` when there is nothing to relay.
    pub fn translate<E: DomEngine + ?Sized>(engine: &E, raw: &RawMutation) -> Option<MutationRecord> {
        match raw.kind {
            MutationKind::ChildList => {
                let mut record = MutationRecord::new(Self::selector(engine, raw.target)?);
                record.added_nodes = raw
                    .added_nodes
                    .iter()
                    .map(|node| sanitize(&engine.outer_html(*node)))
                    .filter(|html| !html.is_empty())
                    .collect();
                record.removed_nodes = raw
                    .removed_nodes
                    .iter()
                    .map(|removed| RemovedNodeDescriptor {
                        tag_name: removed.node_name.clone(),
                    })
                    .collect();
                // a record that would apply nothing is not sent
                (!record.is_empty()).then_some(record)
            }
            MutationKind::Attributes => {
                let name = raw.attribute_name.as_deref()?;
                if is_event_handler_attribute(name) {
                    debug!(attribute = name, "suppressing event handler attribute change");
                    return None;
                }
                let mut record = MutationRecord::new(Self::selector(engine, raw.target)?);
                record.attribute = Some(AttributeChange {
                    name: name.to_string(),
                    value: engine.attribute(raw.target, name),
                });
                Some(record)
            }
            MutationKind::CharacterData => {
                let parent = engine.parent(raw.target)?;
                if engine.tag_name(parent).as_deref() == Some("script") {
                    return None;
                }
                let index = engine.text_index(raw.target)?;
                let data = engine.text_data(raw.target)?;
                let mut record = MutationRecord::new(Self::selector(engine, parent)?);
                record.character_data = Some(CharacterData { index, data });
                Some(record)
            }
        }
    }

    /// Translate every record of one observation cycle
    pub fn collect<E: DomEngine + ?Sized>(engine: &mut E) -> Vec<MutationRecord> {
        let raw = engine.take_records();
        raw.iter()
            .filter_map(|record| Self::translate(&*engine, record))
            .collect()
    }

    /// Drain, translate and send. Returns how many records were delivered.
    pub fn flush<E, S>(engine: &mut E, sink: &S) -> usize
    where
        E: DomEngine + ?Sized,
        S: OutboundSink + ?Sized,
    {
        let mut delivered = 0;
        for record in Self::collect(engine) {
            if sink.send(ServerMessage::Mutation(record)) {
                delivered += 1;
            } else {
                debug!(error = %ProtocolError::TransportUnavailable, "dropping mutation record");
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn observed(source: &str) -> Document {
        let mut doc = Document::parse(source);
        MutationBridge::attach(&mut doc);
        doc
    }

    #[test]
    fn test_child_list_record() {
        let mut doc = observed("<body><ul><li>a</li></ul></body>");
        let ul = doc.first_element_by_tag(doc.root(), "ul").unwrap();
        doc.set_inner_html(ul, "<li onclick=\"x()\">b<script>1</script></li>")
            .unwrap();

        let records = MutationBridge::collect(&mut doc);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.selector, "html>body>ul:nth-of-type(1)");
        assert_eq!(record.added_nodes, vec!["<li>b</li>".to_string()]);
        assert_eq!(record.removed_nodes[0].tag_name, "li");
        assert_eq!(record.attribute, None);
    }

    #[test]
    fn test_script_only_insertion_sends_nothing() {
        let mut doc = observed("<body><div><i></i></div></body>");
        let div = doc.first_element_by_tag(doc.root(), "div").unwrap();
        let script = doc.create_element("script");
        doc.append_child(div, script).unwrap();
        assert_eq!(doc.pending_records(), 1);
        assert!(MutationBridge::collect(&mut doc).is_empty());

        // a removal in the same record still goes out on its own
        let i = doc.first_element_by_tag(div, "i").unwrap();
        let script = doc.create_element("script");
        doc.replace_children(div, vec![script]).unwrap();
        let records = MutationBridge::collect(&mut doc);
        assert_eq!(records.len(), 1);
        assert!(records[0].added_nodes.is_empty());
        assert_eq!(records[0].removed_nodes.len(), 2);
        assert!(!doc.children(div).contains(&i));
    }

    #[test]
    fn test_attribute_record_reads_live_value() {
        let mut doc = observed("<body><div></div></body>");
        let div = doc.first_element_by_tag(doc.root(), "div").unwrap();
        doc.set_attribute(div, "class", "a").unwrap();
        doc.set_attribute(div, "class", "b").unwrap();
        doc.remove_attribute(div, "title").unwrap();

        let values: Vec<_> = MutationBridge::collect(&mut doc)
            .into_iter()
            .map(|r| r.attribute.unwrap().value)
            .collect();
        // Both records observe the value at flush time
        assert_eq!(values, vec![Some("b".to_string()), Some("b".to_string())]);
    }

    #[test]
    fn test_removed_attribute_is_null() {
        let mut doc = observed("<body><div id=\"x\"></div></body>");
        let div = doc.first_element_by_tag(doc.root(), "div").unwrap();
        doc.remove_attribute(div, "id").unwrap();

        let records = MutationBridge::collect(&mut doc);
        assert_eq!(
            records[0].attribute,
            Some(AttributeChange {
                name: "id".to_string(),
                value: None
            })
        );
    }

    #[test]
    fn test_event_handler_attribute_is_suppressed() {
        let mut doc = observed("<body><button></button></body>");
        let button = doc.first_element_by_tag(doc.root(), "button").unwrap();
        doc.set_attribute(button, "onclick", "steal()").unwrap();
        doc.set_attribute(button, "disabled", "").unwrap();

        let records = MutationBridge::collect(&mut doc);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].attribute.as_ref().unwrap().name, "disabled");
    }

    #[test]
    fn test_character_data_is_addressed_through_parent() {
        let mut doc = observed("<body><p>a<b>x</b>b</p></body>");
        let p = doc.first_element_by_tag(doc.root(), "p").unwrap();
        let second_text = doc.text_child(p, 1).unwrap();
        doc.set_text_data(second_text, "changed").unwrap();

        let records = MutationBridge::collect(&mut doc);
        assert_eq!(records[0].selector, "html>body>p:nth-of-type(1)");
        assert_eq!(
            records[0].character_data,
            Some(CharacterData {
                index: 1,
                data: "changed".to_string()
            })
        );
    }

    #[test]
    fn test_record_for_detached_target_is_dropped() {
        let mut doc = observed("<body><section><p></p></section></body>");
        let section = doc.first_element_by_tag(doc.root(), "section").unwrap();
        let p = doc.first_element_by_tag(section, "p").unwrap();
        doc.set_attribute(p, "class", "x").unwrap();
        doc.remove(section).unwrap();

        let records = MutationBridge::collect(&mut doc);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].removed_nodes[0].tag_name, "section");
    }

    #[test]
    fn test_flush_sends_in_order_and_survives_closed_sink() {
        let mut doc = observed("<body><div></div></body>");
        let div = doc.first_element_by_tag(doc.root(), "div").unwrap();
        doc.set_attribute(div, "a", "1").unwrap();
        doc.set_attribute(div, "b", "2").unwrap();

        let sent = RefCell::new(Vec::new());
        let sink = |message: ServerMessage| {
            sent.borrow_mut().push(message);
            true
        };
        assert_eq!(MutationBridge::flush(&mut doc, &sink), 2);
        let names: Vec<String> = sent
            .borrow()
            .iter()
            .filter_map(|m| match m {
                ServerMessage::Mutation(r) => r.attribute.as_ref().map(|a| a.name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        doc.set_attribute(div, "c", "3").unwrap();
        let closed = |_: ServerMessage| false;
        assert_eq!(MutationBridge::flush(&mut doc, &closed), 0);
        assert_eq!(doc.pending_records(), 0);
    }
}

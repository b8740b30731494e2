use dynaser_dom::{
    resolve_child, AdjacentPosition, Address, Document, NodeId, RawMutation,
};

use crate::error::ProtocolResult;

/// What the synchronization protocol needs from a DOM.
///
/// Both ends of a session drive a `DomEngine`: the server its authoritative
/// document, the client its mirror. [`Document`] is the headless
/// implementation.
pub trait DomEngine {
    fn address_of(&self, node: NodeId) -> Option<Address>;

    fn resolve(&self, address: &Address) -> Option<NodeId>;

    /// First direct child named `name` (tag, `#text` or `#comment`)
    fn resolve_child(&self, parent: NodeId, name: &str) -> Option<NodeId>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn tag_name(&self, node: NodeId) -> Option<String>;

    fn outer_html(&self, node: NodeId) -> String;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Live form value; `None` for anything that is not a form control
    fn value(&self, node: NodeId) -> Option<String>;

    fn text_data(&self, node: NodeId) -> Option<String>;

    /// Position of a text node among its parent's text children
    fn text_index(&self, node: NodeId) -> Option<usize>;

    fn text_child(&self, parent: NodeId, index: usize) -> Option<NodeId>;

    /// Drain one observation cycle
    fn take_records(&mut self) -> Vec<RawMutation>;

    /// Free detached subtrees nothing can name any more
    fn reclaim_detached(&mut self) -> usize;

    /// `insertAdjacentHTML('beforeend', html)`
    fn append_html(&mut self, parent: NodeId, html: &str) -> ProtocolResult<Vec<NodeId>>;

    /// `innerHTML = html`
    fn replace_children_html(&mut self, parent: NodeId, html: &str) -> ProtocolResult<()>;

    fn remove(&mut self, node: NodeId) -> ProtocolResult<()>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> ProtocolResult<()>;

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> ProtocolResult<()>;

    /// Native value setter: writes the live slot without any accessor logic
    fn set_value(&mut self, node: NodeId, value: &str) -> ProtocolResult<()>;

    fn set_text_data(&mut self, node: NodeId, data: &str) -> ProtocolResult<()>;

    /// Native activation (`element.click()`)
    fn click(&mut self, node: NodeId) -> ProtocolResult<()>;

    fn dispatch(&mut self, node: NodeId, kind: &str, bubbles: bool) -> ProtocolResult<()>;
}

impl DomEngine for Document {
    fn address_of(&self, node: NodeId) -> Option<Address> {
        Document::address_of(self, node)
    }

    fn resolve(&self, address: &Address) -> Option<NodeId> {
        Document::resolve(self, address)
    }

    fn resolve_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        resolve_child(self, parent, name)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        Document::parent(self, node)
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        Document::tag_name(self, node).map(str::to_string)
    }

    fn outer_html(&self, node: NodeId) -> String {
        Document::outer_html(self, node)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        Document::attribute(self, node, name).map(str::to_string)
    }

    fn value(&self, node: NodeId) -> Option<String> {
        Document::value(self, node)
    }

    fn text_data(&self, node: NodeId) -> Option<String> {
        Document::text_data(self, node).map(str::to_string)
    }

    fn text_index(&self, node: NodeId) -> Option<usize> {
        Document::text_index(self, node)
    }

    fn text_child(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        Document::text_child(self, parent, index)
    }

    fn take_records(&mut self) -> Vec<RawMutation> {
        Document::take_records(self)
    }

    fn reclaim_detached(&mut self) -> usize {
        Document::reclaim_detached(self)
    }

    fn append_html(&mut self, parent: NodeId, html: &str) -> ProtocolResult<Vec<NodeId>> {
        Ok(self.insert_adjacent_html(parent, AdjacentPosition::BeforeEnd, html)?)
    }

    fn replace_children_html(&mut self, parent: NodeId, html: &str) -> ProtocolResult<()> {
        Ok(self.set_inner_html(parent, html)?)
    }

    fn remove(&mut self, node: NodeId) -> ProtocolResult<()> {
        Ok(Document::remove(self, node)?)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> ProtocolResult<()> {
        Ok(Document::set_attribute(self, node, name, value)?)
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> ProtocolResult<()> {
        Document::remove_attribute(self, node, name)?;
        Ok(())
    }

    fn set_value(&mut self, node: NodeId, value: &str) -> ProtocolResult<()> {
        Ok(Document::set_value(self, node, value)?)
    }

    fn set_text_data(&mut self, node: NodeId, data: &str) -> ProtocolResult<()> {
        Ok(Document::set_text_data(self, node, data)?)
    }

    fn click(&mut self, node: NodeId) -> ProtocolResult<()> {
        Document::click(self, node)?;
        Ok(())
    }

    fn dispatch(&mut self, node: NodeId, kind: &str, bubbles: bool) -> ProtocolResult<()> {
        self.dispatch_event(node, kind, bubbles)?;
        Ok(())
    }
}

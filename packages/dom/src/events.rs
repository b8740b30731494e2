//! Synchronous event dispatch
//!
//! Listeners are kept on the document, keyed by node and event type.
//! Dispatch walks the propagation path computed before any listener runs:
//! capture from the document node down, then the target, then bubbling up.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::document::Document;
use crate::error::{DomError, DomResult};
use crate::node::NodeId;

pub type Listener = Arc<dyn Fn(&mut Document, &DomEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    Capturing,
    AtTarget,
    Bubbling,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    pub capture: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent {
    pub kind: String,
    pub target: NodeId,
    pub current_target: NodeId,
    pub bubbles: bool,
    pub phase: EventPhase,
}

#[derive(Clone)]
pub(crate) struct ListenerEntry {
    id: ListenerId,
    node: NodeId,
    kind: String,
    capture: bool,
    callback: Listener,
}

impl fmt::Debug for ListenerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("id", &self.id)
            .field("node", &self.node)
            .field("kind", &self.kind)
            .field("capture", &self.capture)
            .finish_non_exhaustive()
    }
}

impl Document {
    pub fn add_event_listener(
        &mut self,
        node: NodeId,
        kind: &str,
        options: ListenerOptions,
        listener: Listener,
    ) -> DomResult<ListenerId> {
        if !self.contains_node(node) {
            return Err(DomError::NodeNotFound(node));
        }
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push(ListenerEntry {
            id,
            node,
            kind: kind.to_string(),
            capture: options.capture,
            callback: listener,
        });
        Ok(id)
    }

    /// Returns whether a listener was removed
    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|entry| entry.id != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn drop_listeners(&mut self, nodes: &HashSet<NodeId>) {
        self.listeners.retain(|entry| !nodes.contains(&entry.node));
    }

    fn listeners_for(&self, node: NodeId, kind: &str, phase: EventPhase) -> Vec<Listener> {
        self.listeners
            .iter()
            .filter(|entry| entry.node == node && entry.kind == kind)
            .filter(|entry| match phase {
                EventPhase::Capturing => entry.capture,
                EventPhase::Bubbling => !entry.capture,
                EventPhase::AtTarget => true,
            })
            .map(|entry| entry.callback.clone())
            .collect()
    }

    /// Dispatch an event at `target`. Returns the number of listeners invoked.
    pub fn dispatch_event(&mut self, target: NodeId, kind: &str, bubbles: bool) -> DomResult<usize> {
        if !self.contains_node(target) {
            return Err(DomError::NodeNotFound(target));
        }

        let mut ancestors = Vec::new();
        let mut current = self.parent(target);
        while let Some(node) = current {
            ancestors.push(node);
            current = self.parent(node);
        }

        let mut path: Vec<(NodeId, EventPhase)> = ancestors
            .iter()
            .rev()
            .map(|node| (*node, EventPhase::Capturing))
            .collect();
        path.push((target, EventPhase::AtTarget));
        if bubbles {
            path.extend(ancestors.iter().map(|node| (*node, EventPhase::Bubbling)));
        }

        let mut invoked = 0;
        for (node, phase) in path {
            let event = DomEvent {
                kind: kind.to_string(),
                target,
                current_target: node,
                bubbles,
                phase,
            };
            for listener in self.listeners_for(node, kind, phase) {
                listener(self, &event);
                invoked += 1;
            }
        }

        debug!(kind, target = ?target, invoked, "dispatched event");
        Ok(invoked)
    }

    /// Native activation, as `HTMLElement.click()` performs it
    pub fn click(&mut self, target: NodeId) -> DomResult<usize> {
        let element = self.element(target).ok_or(DomError::NotAnElement(target))?;
        let input_type = (element.tag == "input")
            .then(|| element.attribute("type").unwrap_or("text").to_ascii_lowercase());

        let toggled = match input_type.as_deref() {
            Some("checkbox") => {
                let checked = self.checked(target);
                self.set_checked(target, !checked)?;
                true
            }
            Some("radio") => {
                self.set_checked(target, true)?;
                true
            }
            _ => false,
        };

        let mut invoked = self.dispatch_event(target, "click", true)?;
        if toggled {
            invoked += self.dispatch_event(target, "input", true)?;
            invoked += self.dispatch_event(target, "change", true)?;
        }

        let is_submit = match self.tag_name(target) {
            Some("button") => self
                .attribute(target, "type")
                .map_or(true, |t| t.eq_ignore_ascii_case("submit")),
            Some("input") => input_type.as_deref() == Some("submit"),
            _ => false,
        };
        if is_submit {
            if let Some(form) = self.closest(target, "form") {
                invoked += self.dispatch_event(form, "submit", true)?;
            }
        }
        Ok(invoked)
    }

    /// Nearest inclusive ancestor element with the given tag
    pub fn closest(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(id) = current {
            if self.tag_name(id).is_some_and(|t| t.eq_ignore_ascii_case(tag)) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }
}

//! Mutation observation
//!
//! A document carries at most one observer. Every mutation made through the
//! document API is checked against the observer's options and queued in
//! observation order; `take_records` drains one observation cycle.

use crate::document::Document;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub attributes: bool,
    pub character_data: bool,
    pub subtree: bool,
}

impl MutationObserverInit {
    /// Structural, attribute and character-data changes over the whole subtree
    pub fn all() -> Self {
        Self {
            child_list: true,
            attributes: true,
            character_data: true,
            subtree: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    ChildList,
    Attributes,
    CharacterData,
}

/// What is left of a node after it was removed from its parent
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedNode {
    pub node: NodeId,
    /// Lowercase tag, or `#text` / `#comment`
    pub node_name: String,
}

/// One observed change to one target node
#[derive(Debug, Clone, PartialEq)]
pub struct RawMutation {
    pub kind: MutationKind,
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<RemovedNode>,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
}

impl RawMutation {
    pub fn child_list(target: NodeId, added_nodes: Vec<NodeId>, removed_nodes: Vec<RemovedNode>) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target,
            added_nodes,
            removed_nodes,
            attribute_name: None,
            old_value: None,
        }
    }

    pub fn attributes(target: NodeId, name: impl Into<String>, old_value: Option<String>) -> Self {
        Self {
            kind: MutationKind::Attributes,
            target,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            attribute_name: Some(name.into()),
            old_value,
        }
    }

    pub fn character_data(target: NodeId, old_value: Option<String>) -> Self {
        Self {
            kind: MutationKind::CharacterData,
            target,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            attribute_name: None,
            old_value,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MutationObserver {
    root: NodeId,
    init: MutationObserverInit,
    queue: Vec<RawMutation>,
}

impl MutationObserver {
    fn accepts(&self, kind: MutationKind) -> bool {
        match kind {
            MutationKind::ChildList => self.init.child_list,
            MutationKind::Attributes => self.init.attributes,
            MutationKind::CharacterData => self.init.character_data,
        }
    }
}

impl Document {
    /// Start observing `root`. Replaces any previous observer and its pending records.
    pub fn observe(&mut self, root: NodeId, init: MutationObserverInit) {
        self.observer = Some(MutationObserver {
            root,
            init,
            queue: Vec::new(),
        });
    }

    /// Stop observing; pending records are discarded
    pub fn disconnect(&mut self) {
        self.observer = None;
    }

    pub fn is_observed(&self) -> bool {
        self.observer.is_some()
    }

    /// Drain the records queued since the last call
    /// Drain the queue. Subtrees whose removal was reported by the previous
    /// drain and that are still detached are reclaimed here.
    pub fn take_records(&mut self) -> Vec<RawMutation> {
        let records = self
            .observer
            .as_mut()
            .map(|observer| std::mem::take(&mut observer.queue))
            .unwrap_or_default();
        let retired = std::mem::take(&mut self.retired);
        self.release(retired);
        self.retired = std::mem::take(&mut self.garbage);
        records
    }

    pub fn pending_records(&self) -> usize {
        self.observer.as_ref().map_or(0, |o| o.queue.len())
    }

    pub(crate) fn record(&mut self, mutation: RawMutation) {
        let Some(observer) = self.observer.as_ref() else {
            return;
        };
        if !observer.accepts(mutation.kind) {
            return;
        }
        let in_scope = mutation.target == observer.root
            || (observer.init.subtree && self.is_inclusive_ancestor(observer.root, mutation.target));
        if !in_scope {
            return;
        }

        trace!(kind = ?mutation.kind, target = ?mutation.target, "queued mutation");
        if let Some(observer) = self.observer.as_mut() {
            observer.queue.push(mutation);
        }
    }
}

use crate::error::{DomError, DomResult};
use crate::events::ListenerEntry;
use crate::node::{ElementData, Node, NodeData, NodeId};
use crate::observer::{MutationObserver, RawMutation, RemovedNode};
use std::collections::HashSet;
use tracing::trace;

/// Arena-backed DOM tree.
///
/// Every structural, attribute and character-data change made through this
/// API is reported to the attached observer (see [`Document::observe`]).
/// Form-control properties (`value`, `checked`) are live slots that never
/// produce records, like their browser counterparts.
///
/// Removed subtrees stay readable until they are reclaimed: one drain of
/// [`Document::take_records`] after the drain that reported their removal,
/// or on [`Document::reclaim_detached`]. Reclaimed slots are reused.
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) nodes: Vec<Node>,
    generations: Vec<u32>,
    free: Vec<usize>,
    /// Roots detached by recorded removals since the last drain
    pub(crate) garbage: Vec<NodeId>,
    /// Roots whose removal was reported by the last drain
    pub(crate) retired: Vec<NodeId>,
    pub(crate) root: NodeId,
    pub(crate) observer: Option<MutationObserver>,
    pub(crate) listeners: Vec<ListenerEntry>,
    pub(crate) next_listener_id: u64,
}

impl Document {
    /// Empty document holding only the document node
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Document)],
            generations: vec![0],
            free: Vec::new(),
            garbage: Vec::new(),
            retired: Vec::new(),
            root: NodeId::new(0, 0),
            observer: None,
            listeners: Vec::new(),
            next_listener_id: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        if self.contains_node(id) {
            self.nodes.get(id.index)
        } else {
            None
        }
    }

    fn node_mut(&mut self, id: NodeId) -> DomResult<&mut Node> {
        if !self.contains_node(id) {
            return Err(DomError::NodeNotFound(id));
        }
        self.nodes.get_mut(id.index).ok_or(DomError::NodeNotFound(id))
    }

    fn existing(&self, id: NodeId) -> DomResult<&Node> {
        self.node(id).ok_or(DomError::NodeNotFound(id))
    }

    /// Whether `id` names a live node (attached or not) of this document
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.generations.get(id.index) == Some(&id.generation)
    }

    /// Allocated node slots, live or free
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    pub fn live_nodes(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.node(id).and_then(Node::as_element)
    }

    fn element_mut(&mut self, id: NodeId) -> DomResult<&mut ElementData> {
        match &mut self.node_mut(id)?.data {
            NodeData::Element(element) => Ok(element),
            _ => Err(DomError::NotAnElement(id)),
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |child| self.is_element(*child))
    }

    /// Whether `ancestor` is `node` or one of its ancestors
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Whether the node is reachable from the document node
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains_node(id) && self.is_inclusive_ancestor(self.root, id)
    }

    /// Pre-order descendants, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    pub fn elements_by_tag(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| self.tag_name(*id).is_some_and(|t| t.eq_ignore_ascii_case(tag)))
            .collect()
    }

    pub fn first_element_by_tag(&self, scope: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|id| self.tag_name(*id).is_some_and(|t| t.eq_ignore_ascii_case(tag)))
    }

    /// First direct element child with the given tag
    pub fn child_with_tag(&self, parent: NodeId, tag: &str) -> Option<NodeId> {
        self.element_children(parent)
            .find(|id| self.tag_name(*id).is_some_and(|t| t.eq_ignore_ascii_case(tag)))
    }

    /// First connected element whose `id` attribute equals `id`
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|node| self.attribute(*node, "id") == Some(id))
    }

    pub fn document_element(&self) -> Option<NodeId> {
        self.child_with_tag(self.root, "html")
    }

    pub fn head(&self) -> Option<NodeId> {
        self.document_element()
            .and_then(|html| self.child_with_tag(html, "head"))
    }

    pub fn body(&self) -> Option<NodeId> {
        self.document_element()
            .and_then(|html| self.child_with_tag(html, "body"))
    }

    /// Text of the first `<title>`, whitespace-collapsed
    pub fn title(&self) -> Option<String> {
        let title = self.first_element_by_tag(self.root, "title")?;
        Some(
            self.text_content(title)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" "),
        )
    }

    pub fn text_content(&self, id: NodeId) -> String {
        match self.node(id).map(|n| &n.data) {
            Some(NodeData::Text(data)) | Some(NodeData::Comment(data)) => data.clone(),
            Some(_) => self
                .descendants(id)
                .into_iter()
                .filter_map(|d| match &self.nodes[d.index].data {
                    NodeData::Text(data) => Some(data.as_str()),
                    _ => None,
                })
                .collect(),
            None => String::new(),
        }
    }

    // ------------------------------------------------------------------
    // Creation (detached, unrecorded)
    // ------------------------------------------------------------------

    pub(crate) fn create_node(&mut self, data: NodeData) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                self.nodes[index] = Node::new(data);
                NodeId::new(index, self.generations[index])
            }
            None => {
                let index = self.nodes.len();
                self.nodes.push(Node::new(data));
                self.generations.push(0);
                NodeId::new(index, 0)
            }
        }
    }

    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.create_node(NodeData::Element(ElementData::new(tag)))
    }

    pub fn create_element_with(&mut self, element: ElementData) -> NodeId {
        self.create_node(NodeData::Element(element))
    }

    pub fn create_text(&mut self, data: impl Into<String>) -> NodeId {
        self.create_node(NodeData::Text(data.into()))
    }

    pub fn create_comment(&mut self, data: impl Into<String>) -> NodeId {
        self.create_node(NodeData::Comment(data.into()))
    }

    // ------------------------------------------------------------------
    // Raw tree edits (unrecorded; parser and structure fix-ups)
    // ------------------------------------------------------------------

    pub(crate) fn attach_raw(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) {
        self.nodes[child.index].parent = Some(parent);
        let children = &mut self.nodes[parent.index].children;
        match index {
            Some(i) if i <= children.len() => children.insert(i, child),
            _ => children.push(child),
        }
    }

    pub(crate) fn detach_raw(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes[child.index].parent.take() {
            self.nodes[parent.index].children.retain(|c| *c != child);
        }
    }

    // ------------------------------------------------------------------
    // Reclamation
    // ------------------------------------------------------------------

    /// Free every candidate that is still detached, with its subtree.
    /// Candidates removed again since (still in `garbage`) are kept.
    pub(crate) fn release(&mut self, candidates: Vec<NodeId>) -> usize {
        let mut freed = HashSet::new();
        for root in candidates {
            let live = self.contains_node(root) && self.parent(root).is_none();
            if !live || self.garbage.contains(&root) {
                continue;
            }
            let mut subtree = self.descendants(root);
            subtree.push(root);
            for id in subtree {
                self.nodes[id.index] = Node::new(NodeData::Comment(String::new()));
                self.generations[id.index] = id.generation.wrapping_add(1);
                self.free.push(id.index);
                freed.insert(id);
            }
        }
        if !freed.is_empty() {
            self.drop_listeners(&freed);
            trace!(count = freed.len(), "reclaimed detached nodes");
        }
        freed.len()
    }

    /// Reclaim every detached subtree left by recorded removals, unless
    /// records naming them are still pending. Returns the number of freed
    /// nodes.
    pub fn reclaim_detached(&mut self) -> usize {
        if self.pending_records() > 0 {
            return 0;
        }
        let mut candidates = std::mem::take(&mut self.retired);
        candidates.append(&mut self.garbage);
        self.release(candidates)
    }

    fn removed_descriptor(&self, node: NodeId) -> RemovedNode {
        RemovedNode {
            node,
            node_name: self.nodes[node.index].node_name().to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Recorded tree edits
    // ------------------------------------------------------------------

    fn validate_insert(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        let parent_node = self.existing(parent)?;
        let child_node = self.existing(child)?;
        if !matches!(parent_node.data, NodeData::Element(_) | NodeData::Document) {
            return Err(DomError::hierarchy(parent, child, "parent cannot have children"));
        }
        if matches!(child_node.data, NodeData::Document) {
            return Err(DomError::hierarchy(parent, child, "document node cannot be inserted"));
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::hierarchy(parent, child, "node would contain itself"));
        }
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference` (or at the end). A child that
    /// already has a parent is removed from it first, with its own record.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<()> {
        self.validate_insert(parent, child)?;
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) || reference == child {
                return Err(DomError::NotAChild {
                    parent,
                    child: reference,
                });
            }
        }

        if self.parent(child).is_some() {
            self.remove(child)?;
        }

        let index = reference.and_then(|r| self.children(parent).iter().position(|c| *c == r));
        self.attach_raw(parent, child, index);
        self.record(RawMutation::child_list(parent, vec![child], Vec::new()));
        Ok(())
    }

    /// Append several nodes as one child-list change
    pub fn append_children(&mut self, parent: NodeId, children: Vec<NodeId>) -> DomResult<()> {
        self.insert_children_before(parent, children, None)
    }

    /// Insert several nodes before `reference` (or at the end) as one child-list change
    pub fn insert_children_before(
        &mut self,
        parent: NodeId,
        children: Vec<NodeId>,
        reference: Option<NodeId>,
    ) -> DomResult<()> {
        for child in &children {
            self.validate_insert(parent, *child)?;
        }
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) || children.contains(&reference) {
                return Err(DomError::NotAChild {
                    parent,
                    child: reference,
                });
            }
        }
        for child in &children {
            if self.parent(*child).is_some() {
                self.remove(*child)?;
            }
        }
        let mut index = reference.and_then(|r| self.children(parent).iter().position(|c| *c == r));
        for child in &children {
            self.attach_raw(parent, *child, index);
            index = index.map(|i| i + 1);
        }
        if !children.is_empty() {
            self.record(RawMutation::child_list(parent, children, Vec::new()));
        }
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        if self.parent(child) != Some(parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        let removed = self.removed_descriptor(child);
        self.detach_raw(child);
        self.garbage.push(child);
        self.record(RawMutation::child_list(parent, Vec::new(), vec![removed]));
        Ok(())
    }

    /// Detach a node from its parent; a node without parent is left alone
    pub fn remove(&mut self, node: NodeId) -> DomResult<()> {
        match self.existing(node)?.parent {
            Some(parent) => self.remove_child(parent, node),
            None => Ok(()),
        }
    }

    /// Swap all children of `parent` for `children` as one child-list change
    pub fn replace_children(&mut self, parent: NodeId, children: Vec<NodeId>) -> DomResult<()> {
        for child in &children {
            self.validate_insert(parent, *child)?;
        }
        let old: Vec<NodeId> = self.children(parent).to_vec();
        let removed: Vec<RemovedNode> = old.iter().map(|c| self.removed_descriptor(*c)).collect();
        for child in old {
            self.detach_raw(child);
            self.garbage.push(child);
        }
        for child in &children {
            self.detach_raw(*child);
            self.attach_raw(parent, *child, None);
        }
        if !removed.is_empty() || !children.is_empty() {
            self.record(RawMutation::child_list(parent, children, removed));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attribute(name))
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> DomResult<()> {
        let name = name.to_ascii_lowercase();
        let old = self
            .element_mut(id)?
            .set_attribute(name.clone(), value.to_string());
        self.record(RawMutation::attributes(id, name, old));
        Ok(())
    }

    /// Returns whether the attribute existed
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> DomResult<bool> {
        let name = name.to_ascii_lowercase();
        match self.element_mut(id)?.remove_attribute(&name) {
            Some(old) => {
                self.record(RawMutation::attributes(id, name, Some(old)));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ------------------------------------------------------------------
    // Character data
    // ------------------------------------------------------------------

    pub fn text_data(&self, id: NodeId) -> Option<&str> {
        match self.node(id).map(|n| &n.data) {
            Some(NodeData::Text(data)) | Some(NodeData::Comment(data)) => Some(data),
            _ => None,
        }
    }

    pub fn set_text_data(&mut self, id: NodeId, data: &str) -> DomResult<()> {
        let old = match &mut self.node_mut(id)?.data {
            NodeData::Text(existing) | NodeData::Comment(existing) => {
                std::mem::replace(existing, data.to_string())
            }
            _ => return Err(DomError::NotAnElement(id)),
        };
        self.record(RawMutation::character_data(id, Some(old)));
        Ok(())
    }

    /// `textContent` setter: elements get a single text child, character data is rewritten
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> DomResult<()> {
        if self.text_data(id).is_some() {
            return self.set_text_data(id, text);
        }
        let children = if text.is_empty() {
            Vec::new()
        } else {
            vec![self.create_text(text)]
        };
        self.replace_children(id, children)
    }

    /// Position of a text node among its parent's text-node children
    pub fn text_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent)
            .iter()
            .filter(|c| self.nodes[c.index].is_text())
            .position(|c| *c == id)
    }

    /// The `index`-th text-node child of `parent`
    pub fn text_child(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .filter(|c| self.nodes[c.index].is_text())
            .nth(index)
    }

    // ------------------------------------------------------------------
    // Form-control properties
    // ------------------------------------------------------------------

    /// Live value of a form control; `None` for anything else
    pub fn value(&self, id: NodeId) -> Option<String> {
        let element = self.element(id)?;
        if !element.is_form_control() {
            return None;
        }
        if let Some(value) = &element.value {
            return Some(value.clone());
        }
        let value = match element.tag.as_str() {
            "textarea" => self.text_content(id),
            "select" => self.default_select_value(id).unwrap_or_default(),
            _ => element.attribute("value").unwrap_or_default().to_string(),
        };
        Some(value)
    }

    fn default_select_value(&self, select: NodeId) -> Option<String> {
        let options = self.elements_by_tag(select, "option");
        let chosen = options
            .iter()
            .find(|o| self.attribute(**o, "selected").is_some())
            .or_else(|| options.first())?;
        Some(match self.attribute(*chosen, "value") {
            Some(value) => value.to_string(),
            None => self.text_content(*chosen),
        })
    }

    /// Native value setter: writes the live slot, never the attribute
    pub fn set_value(&mut self, id: NodeId, value: &str) -> DomResult<()> {
        let element = self.element_mut(id)?;
        if !element.is_form_control() {
            return Err(DomError::NotAFormControl(id));
        }
        element.value = Some(value.to_string());
        Ok(())
    }

    pub fn checked(&self, id: NodeId) -> bool {
        self.element(id)
            .map(|e| e.checked.unwrap_or_else(|| e.attribute("checked").is_some()))
            .unwrap_or(false)
    }

    pub fn set_checked(&mut self, id: NodeId, checked: bool) -> DomResult<()> {
        self.element_mut(id)?.checked = Some(checked);
        Ok(())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

//! # Patch Applier
//!
//! The client half of the protocol: it turns [`ServerMessage`]s back into
//! edits on the browser's mirror of the server document.
//!
//! ## Addressing
//!
//! Record selectors are server addresses rooted at `html>body`. They are
//! rewritten through the [`MountPoint`] so that `html>body>X` lands at
//! `html>body>div#dynaser-app>X` on the client. A selector that does not
//! resolve, or that points outside the body, drops the whole record.
//!
//! ## Steps
//!
//! A resolved record runs its steps in order: added nodes are appended as
//! HTML, removed nodes are matched by name against the target's children,
//! then the attribute change and the character-data change. Each step
//! succeeds or fails on its own and is counted in the [`ApplyReport`].
//!
//! ## Reclamation
//!
//! Nodes detached by a message are reclaimed as soon as it has been
//! applied, so a long session keeps the mirror's arena bounded.

use dynaser_dom::{Address, Document, NodeId};
use tracing::{debug, info, warn};

use crate::boundary::MountPoint;
use crate::engine::DomEngine;
use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{MutationRecord, ServerMessage};

/// What one record did to the client tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub resolved: bool,
    pub inserted: usize,
    pub removed: usize,
    pub attributes: usize,
    pub text: usize,
    /// Steps that could not be carried out
    pub skipped: usize,
}

/// Result of applying the `initial` message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientView {
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PatchApplier {
    pub mount: MountPoint,
}

impl PatchApplier {
    pub fn new(mount: MountPoint) -> Self {
        Self { mount }
    }

    fn mount_node<E: DomEngine + ?Sized>(&self, engine: &E) -> ProtocolResult<NodeId> {
        let address = self.mount.mount_address();
        engine
            .resolve(&address)
            .ok_or_else(|| ProtocolError::AddressResolutionMiss {
                selector: address.to_string(),
            })
    }

    /// Replace the mount's content with the body of `content`
    pub fn apply_initial<E: DomEngine + ?Sized>(
        &self,
        engine: &mut E,
        content: &str,
    ) -> ProtocolResult<ClientView> {
        let mount = self.mount_node(engine)?;
        let incoming = Document::parse(content);
        let body_html = incoming
            .body()
            .map(|body| incoming.inner_html(body))
            .unwrap_or_default();
        engine.replace_children_html(mount, &body_html)?;
        engine.reclaim_detached();

        let view = ClientView {
            title: incoming.title(),
        };
        info!(title = ?view.title, "applied initial document");
        Ok(view)
    }

    /// Apply one mutation record. Every step runs even if an earlier one failed.
    pub fn apply<E: DomEngine + ?Sized>(&self, engine: &mut E, record: &MutationRecord) -> ApplyReport {
        let mut report = ApplyReport::default();

        let Some(target) = self.resolve_target(engine, &record.selector) else {
            debug!(selector = %record.selector, "mutation target not found; ignoring");
            return report;
        };
        report.resolved = true;

        for html in &record.added_nodes {
            match engine.append_html(target, html) {
                Ok(_) => report.inserted += 1,
                Err(err) => {
                    debug!(error = %err, "failed to insert node");
                    report.skipped += 1;
                }
            }
        }

        for removed in &record.removed_nodes {
            let outcome = engine
                .resolve_child(target, &removed.tag_name)
                .map(|child| engine.remove(child));
            match outcome {
                Some(Ok(())) => report.removed += 1,
                Some(Err(err)) => {
                    debug!(error = %err, "failed to remove node");
                    report.skipped += 1;
                }
                None => {
                    debug!(tag = %removed.tag_name, "no child to remove");
                    report.skipped += 1;
                }
            }
        }

        if let Some(change) = &record.attribute {
            let outcome = match (change.name.as_str(), &change.value) {
                ("value", Some(value)) if engine.value(target).is_some() => {
                    engine.set_value(target, value)
                }
                (name, Some(value)) => engine.set_attribute(target, name, value),
                (name, None) => engine.remove_attribute(target, name),
            };
            match outcome {
                Ok(()) => report.attributes += 1,
                Err(err) => {
                    debug!(error = %err, attribute = %change.name, "failed to apply attribute");
                    report.skipped += 1;
                }
            }
        }

        if let Some(text) = &record.character_data {
            let outcome = engine
                .text_child(target, text.index)
                .map(|node| engine.set_text_data(node, &text.data));
            match outcome {
                Some(Ok(())) => report.text += 1,
                _ => {
                    debug!(index = text.index, "text child not found");
                    report.skipped += 1;
                }
            }
        }

        engine.reclaim_detached();
        report
    }

    fn resolve_target<E: DomEngine + ?Sized>(&self, engine: &E, selector: &str) -> Option<NodeId> {
        let server = selector.parse::<Address>().ok()?;
        let client = self.mount.to_client(&server)?;
        engine.resolve(&client)
    }
}

/// Client end of one connection: the mirrored document plus what it learned
/// from the server.
#[derive(Debug)]
pub struct ClientSession {
    pub document: Document,
    pub applier: PatchApplier,
    pub title: Option<String>,
}

impl ClientSession {
    /// A client page: an empty mount wrapper under `<body>`
    pub fn new(mount: MountPoint) -> Self {
        let shell = format!(
            "<html><head></head><body><{tag} id=\"dynaser-app\"></{tag}></body></html>",
            tag = mount.segment.tag
        );
        Self::with_document(Document::parse(&shell), mount)
    }

    pub fn with_document(document: Document, mount: MountPoint) -> Self {
        Self {
            document,
            applier: PatchApplier::new(mount),
            title: None,
        }
    }

    /// Handle one inbound text frame. Malformed frames are rejected without
    /// affecting the session.
    pub fn handle(&mut self, text: &str) -> ProtocolResult<()> {
        let message = match ServerMessage::from_json(text) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "rejecting malformed server message");
                return Err(err);
            }
        };
        self.handle_message(&message)
    }

    pub fn handle_message(&mut self, message: &ServerMessage) -> ProtocolResult<()> {
        match message {
            ServerMessage::Initial { content, .. } => {
                let view = self.applier.apply_initial(&mut self.document, content)?;
                self.title = view.title;
            }
            ServerMessage::Mutation(record) => {
                self.applier.apply(&mut self.document, record);
            }
            ServerMessage::Event(event) => {
                info!(detail = ?event.detail, "server event");
            }
        }
        Ok(())
    }

    /// Mount content as HTML
    pub fn mounted_html(&self) -> String {
        self.document
            .resolve(&self.applier.mount.mount_address())
            .map(|mount| self.document.inner_html(mount))
            .unwrap_or_default()
    }
}

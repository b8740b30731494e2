//! One authoritative document and the connection currently viewing it

use std::sync::atomic::{AtomicU64, Ordering};

use dynaser_dom::Document;
use dynaser_protocol::{
    replay, sanitize_document, ClientMessage, MutationBridge, OutboundSink, ProtocolResult,
    ReplayOutcome, ServerMessage,
};
use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::app::Application;
use crate::error::ServerResult;

pub type SessionId = String;

struct Outbound {
    generation: u64,
    tx: UnboundedSender<ServerMessage>,
}

pub struct Session {
    id: SessionId,
    document: Mutex<Document>,
    outbound: Mutex<Option<Outbound>>,
    generations: AtomicU64,
}

impl Session {
    /// Build the application's document and start observing it
    pub fn new(id: SessionId, app: &dyn Application) -> ServerResult<Self> {
        let mut document = Document::parse(&app.render());
        app.install(&mut document)?;
        MutationBridge::attach(&mut document);
        info!(session = %id, app = app.name(), "session created");

        Ok(Self {
            id,
            document: Mutex::new(document),
            outbound: Mutex::new(None),
            generations: AtomicU64::new(0),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Attach a new connection. The first message on the returned channel is
    /// always the full snapshot; a previous connection's channel is closed.
    pub fn connect(&self) -> (u64, UnboundedReceiver<ServerMessage>) {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = unbounded_channel();

        let mut doc = self.document.lock();
        // the snapshot already reflects anything still pending
        let stale = doc.take_records();
        if !stale.is_empty() {
            debug!(session = %self.id, count = stale.len(), "discarding records superseded by snapshot");
        }
        let initial = ServerMessage::Initial {
            content: sanitize_document(&doc.to_html()),
            url: None,
        };
        let _ = tx.send(initial);

        let previous = self.outbound.lock().replace(Outbound { generation, tx });
        drop(doc);

        if let Some(previous) = previous {
            info!(session = %self.id, replaced = previous.generation, "connection replaced");
        }
        (generation, rx)
    }

    /// Detach the connection if it is still the current one
    pub fn disconnect(&self, generation: u64) -> bool {
        let mut outbound = self.outbound.lock();
        match outbound.as_ref() {
            Some(current) if current.generation == generation => {
                *outbound = None;
                info!(session = %self.id, generation, "connection closed");
                true
            }
            _ => false,
        }
    }

    /// Whether `generation` is the connection currently attached
    pub fn is_current(&self, generation: u64) -> bool {
        self.outbound
            .lock()
            .as_ref()
            .is_some_and(|current| current.generation == generation)
    }

    pub fn is_connected(&self) -> bool {
        self.outbound.lock().is_some()
    }

    /// Handle one inbound text frame. Malformed frames are rejected and the
    /// session carries on.
    pub fn handle_text(&self, text: &str) -> ProtocolResult<ReplayOutcome> {
        let message = match ClientMessage::from_json(text) {
            Ok(message) => message,
            Err(err) => {
                warn!(session = %self.id, error = %err, "rejecting malformed client message");
                return Err(err);
            }
        };
        let ClientMessage::Event(event) = message;

        let mut doc = self.document.lock();
        let outcome = replay(&mut *doc, &event);
        let sent = MutationBridge::flush(&mut *doc, self);
        debug!(
            session = %self.id,
            event = %event.event_type,
            outcome = ?outcome,
            sent,
            "replayed client event"
        );
        Ok(outcome)
    }

    /// Run a server-side change against the document and relay what it did
    pub fn with_document<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        let mut doc = self.document.lock();
        let result = f(&mut doc);
        MutationBridge::flush(&mut *doc, self);
        result
    }
}

impl OutboundSink for Session {
    fn send(&self, message: ServerMessage) -> bool {
        match self.outbound.lock().as_ref() {
            Some(outbound) => outbound.tx.send(message).is_ok(),
            None => false,
        }
    }
}

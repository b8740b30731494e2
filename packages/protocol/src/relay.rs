//! Client-side event relay

use std::fmt;
use std::sync::Arc;

use dynaser_dom::{DomEvent, DomResult, Document, ListenerId, ListenerOptions, NodeId};
use tracing::{debug, trace};

use crate::boundary::MountPoint;
use crate::message::{ClientMessage, InteractionEvent};

/// Event types relayed to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    DblClick,
    Change,
    MouseOver,
    MouseOut,
    MouseDown,
    MouseUp,
    MouseMove,
    KeyDown,
    KeyPress,
    KeyUp,
    Focus,
    Blur,
    Submit,
    Reset,
    Resize,
    Scroll,
    Select,
}

impl EventKind {
    pub const ALL: [EventKind; 18] = [
        EventKind::Click,
        EventKind::DblClick,
        EventKind::Change,
        EventKind::MouseOver,
        EventKind::MouseOut,
        EventKind::MouseDown,
        EventKind::MouseUp,
        EventKind::MouseMove,
        EventKind::KeyDown,
        EventKind::KeyPress,
        EventKind::KeyUp,
        EventKind::Focus,
        EventKind::Blur,
        EventKind::Submit,
        EventKind::Reset,
        EventKind::Resize,
        EventKind::Scroll,
        EventKind::Select,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::DblClick => "dblclick",
            EventKind::Change => "change",
            EventKind::MouseOver => "mouseover",
            EventKind::MouseOut => "mouseout",
            EventKind::MouseDown => "mousedown",
            EventKind::MouseUp => "mouseup",
            EventKind::MouseMove => "mousemove",
            EventKind::KeyDown => "keydown",
            EventKind::KeyPress => "keypress",
            EventKind::KeyUp => "keyup",
            EventKind::Focus => "focus",
            EventKind::Blur => "blur",
            EventKind::Submit => "submit",
            EventKind::Reset => "reset",
            EventKind::Resize => "resize",
            EventKind::Scroll => "scroll",
            EventKind::Select => "select",
        }
    }

    pub fn parse(name: &str) -> Option<EventKind> {
        EventKind::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Whether a dispatched event of this kind propagates to ancestors
    pub fn bubbles(self) -> bool {
        !matches!(
            self,
            EventKind::Focus | EventKind::Blur | EventKind::Resize | EventKind::Scroll
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type EventSink = Arc<dyn Fn(ClientMessage) + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct EventRelay {
    pub mount: MountPoint,
}

impl EventRelay {
    pub fn new(mount: MountPoint) -> Self {
        Self { mount }
    }

    /// Build the upstream message for an event at `target`. `None` for
    /// targets outside the mount.
    pub fn capture(&self, doc: &Document, kind: EventKind, target: NodeId) -> Option<ClientMessage> {
        let client = doc.address_of(target)?;
        let Some(server) = self.mount.to_server(&client) else {
            trace!(selector = %client, "event target outside mount; not relayed");
            return None;
        };
        Some(ClientMessage::Event(InteractionEvent {
            event_type: kind.as_str().to_string(),
            selector: server.to_string(),
            value: doc.value(target),
        }))
    }

    /// Register one capturing listener per relayed kind on the document node
    pub fn attach(&self, doc: &mut Document, sink: EventSink) -> DomResult<Vec<ListenerId>> {
        let root = doc.root();
        EventKind::ALL
            .into_iter()
            .map(|kind| {
                let relay = self.clone();
                let sink = sink.clone();
                let listener = Arc::new(move |doc: &mut Document, event: &DomEvent| {
                    if let Some(message) = relay.capture(doc, kind, event.target) {
                        debug!(kind = %kind, "relaying event");
                        sink(message);
                    }
                });
                doc.add_event_listener(root, kind.as_str(), ListenerOptions { capture: true }, listener)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn client() -> Document {
        Document::parse(
            "<body><div id=\"dynaser-app\"><input value=\"5\"><button>go</button></div><p>outside</p></body>",
        )
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::parse("contextmenu"), None);
        assert!(EventKind::Click.bubbles());
        assert!(!EventKind::Focus.bubbles());
    }

    #[test]
    fn test_capture_translates_and_carries_value() {
        let doc = client();
        let relay = EventRelay::default();
        let input = doc.first_element_by_tag(doc.root(), "input").unwrap();
        let button = doc.first_element_by_tag(doc.root(), "button").unwrap();

        let ClientMessage::Event(change) = relay.capture(&doc, EventKind::Change, input).unwrap();
        assert_eq!(change.selector, "html>body>input:nth-of-type(1)");
        assert_eq!(change.value.as_deref(), Some("5"));

        let ClientMessage::Event(click) = relay.capture(&doc, EventKind::Click, button).unwrap();
        assert_eq!(click.event_type, "click");
        assert_eq!(click.value, None);
    }

    #[test]
    fn test_targets_outside_mount_are_not_relayed() {
        let doc = client();
        let p = doc.first_element_by_tag(doc.root(), "p").unwrap();
        assert_eq!(EventRelay::default().capture(&doc, EventKind::Click, p), None);
    }

    #[test]
    fn test_attached_listeners_relay_dispatched_events() {
        let mut doc = client();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let log = sent.clone();
        let sink: EventSink = Arc::new(move |message: ClientMessage| log.lock().unwrap().push(message));

        let ids = EventRelay::default().attach(&mut doc, sink).unwrap();
        assert_eq!(ids.len(), EventKind::ALL.len());

        let button = doc.first_element_by_tag(doc.root(), "button").unwrap();
        doc.click(button).unwrap();
        doc.dispatch_event(button, "contextmenu", true).unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let ClientMessage::Event(event) = &sent[0];
        assert_eq!(event.selector, "html>body>button:nth-of-type(1)");
    }
}

/// Server and client trees driven through the full message loop
use std::cell::RefCell;
use std::sync::{Arc, Mutex};

use dynaser_dom::{AdjacentPosition, DomEvent, Document, Listener, ListenerOptions, NodeId};

use crate::*;

struct Harness {
    server: Document,
    client: ClientSession,
}

impl Harness {
    fn new(page: &str) -> Self {
        let mut server = Document::parse(page);
        MutationBridge::attach(&mut server);

        let mut client = ClientSession::new(MountPoint::default());
        let initial = ServerMessage::Initial {
            content: sanitize_document(&server.to_html()),
            url: None,
        };
        let wire = initial.to_json().unwrap();
        client.handle(&wire).unwrap();

        Self { server, client }
    }

    /// Flush server records through JSON into the client
    fn sync(&mut self) -> usize {
        let outbox = RefCell::new(Vec::new());
        let sink = |message: ServerMessage| {
            outbox.borrow_mut().push(message.to_json().unwrap());
            true
        };
        let sent = MutationBridge::flush(&mut self.server, &sink);
        for text in outbox.into_inner() {
            self.client.handle(&text).unwrap();
        }
        sent
    }

    fn server_body(&self) -> String {
        let body = self.server.body().unwrap();
        sanitize(&self.server.inner_html(body))
    }

    fn assert_converged(&self) {
        assert_eq!(self.client.mounted_html(), self.server_body());
    }

    fn server_node(&self, tag: &str, index: usize) -> NodeId {
        self.server.elements_by_tag(self.server.root(), tag)[index]
    }
}

#[test]
fn test_initial_snapshot_matches() {
    let harness = Harness::new(
        "<html><head><title>T</title><script>boot()</script></head><body><ul><li onclick=\"x\">a</li></ul></body></html>",
    );
    harness.assert_converged();
    assert_eq!(harness.client.mounted_html(), "<ul><li>a</li></ul>");
    assert_eq!(harness.client.title.as_deref(), Some("T"));
}

#[test]
fn test_mutation_replay_converges() {
    let mut h = Harness::new("<body><ul><li>a</li><li>b</li></ul><p>x<b>y</b>z</p><div></div></body>");
    let ul = h.server_node("ul", 0);
    let p = h.server_node("p", 0);
    let div = h.server_node("div", 0);

    h.server
        .insert_adjacent_html(ul, AdjacentPosition::BeforeEnd, "<li>c</li>")
        .unwrap();
    let first_li = h.server.elements_by_tag(ul, "li")[0];
    h.server.remove(first_li).unwrap();
    h.server.set_attribute(div, "class", "ready").unwrap();
    let z = h.server.text_child(p, 1).unwrap();
    h.server.set_text_data(z, "Z").unwrap();
    h.server.set_inner_html(div, "<span>new</span>").unwrap();
    h.server.remove_attribute(div, "class").unwrap();

    assert_eq!(h.sync(), 6);
    h.assert_converged();
}

#[test]
fn test_sanitized_additions_converge() {
    let mut h = Harness::new("<body><section></section></body>");
    let section = h.server_node("section", 0);
    h.server
        .set_inner_html(section, "<a href=\"#\" onclick=\"steal()\">link</a><script>evil()</script>")
        .unwrap();
    h.sync();
    h.assert_converged();
    assert_eq!(h.client.mounted_html(), "<section><a href=\"#\">link</a></section>");
}

#[test]
fn test_dropped_record_leaves_client_unchanged() {
    let mut h = Harness::new("<body><div></div></body>");
    let before = h.client.document.to_html();

    let mut record = MutationRecord::new("html>body>div:nth-of-type(1)>p:nth-of-type(4)");
    record.added_nodes.push("<i>lost</i>".to_string());
    let wire = ServerMessage::Mutation(record).to_json().unwrap();
    h.client.handle(&wire).unwrap();

    assert_eq!(h.client.document.to_html(), before);
}

#[test]
fn test_click_round_trip() {
    let mut h = Harness::new("<body><span>0</span><button>+</button></body>");
    let span = h.server_node("span", 0);
    let button = h.server_node("button", 0);
    let increment: Listener = Arc::new(move |doc: &mut Document, _: &DomEvent| {
        let count: i64 = doc.text_content(span).parse().unwrap_or(0);
        let _ = doc.set_text_content(span, &(count + 1).to_string());
    });
    h.server
        .add_event_listener(button, "click", ListenerOptions::default(), increment)
        .unwrap();

    let upstream = Arc::new(Mutex::new(Vec::new()));
    let log = upstream.clone();
    let sink: EventSink = Arc::new(move |message: ClientMessage| {
        log.lock().unwrap().push(message.to_json().unwrap());
    });
    EventRelay::default()
        .attach(&mut h.client.document, sink)
        .unwrap();

    let client_button = h
        .client
        .document
        .first_element_by_tag(h.client.document.root(), "button")
        .unwrap();
    h.client.document.click(client_button).unwrap();

    let frames: Vec<String> = upstream.lock().unwrap().drain(..).collect();
    assert_eq!(frames.len(), 1);
    let ClientMessage::Event(event) = ClientMessage::from_json(&frames[0]).unwrap();
    assert_eq!(event.selector, "html>body>button:nth-of-type(1)");
    assert_eq!(replay(&mut h.server, &event), ReplayOutcome::Dispatched);

    h.sync();
    h.assert_converged();
    assert_eq!(h.client.mounted_html(), "<span>1</span><button>+</button>");
}

#[test]
fn test_change_round_trip_reflects_value() {
    let mut h = Harness::new("<body><div><input value=\"\"></div></body>");
    let input = h.server_node("input", 0);

    let client_input = h
        .client
        .document
        .first_element_by_tag(h.client.document.root(), "input")
        .unwrap();
    h.client.document.set_value(client_input, "42").unwrap();
    let relay = EventRelay::default();
    let ClientMessage::Event(event) = relay
        .capture(&h.client.document, EventKind::Change, client_input)
        .unwrap();
    assert_eq!(event.selector, "html>body>div:nth-of-type(1)>input:nth-of-type(1)");
    assert_eq!(event.value.as_deref(), Some("42"));

    assert_eq!(replay(&mut h.server, &event), ReplayOutcome::Dispatched);
    assert_eq!(h.server.attribute(input, "value"), Some("42"));
    assert_eq!(h.sync(), 1);
    assert_eq!(h.client.document.value(client_input).as_deref(), Some("42"));
}

#[test]
fn test_boundary_translation_scenario() {
    let mut h = Harness::new("<body><div><p>first</p></div><div><p>second</p></div></body>");
    let second_p = h.server_node("p", 1);
    h.server.set_attribute(second_p, "class", "hit").unwrap();
    h.sync();

    let client = &h.client.document;
    let client_p = client.elements_by_tag(client.root(), "p")[1];
    assert_eq!(
        client.address_of(client_p).unwrap().to_string(),
        "html>body>div:nth-of-type(1)>div:nth-of-type(2)>p:nth-of-type(1)"
    );
    assert_eq!(client.attribute(client_p, "class"), Some("hit"));
    h.assert_converged();
}

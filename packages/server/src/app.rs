//! Applications served by the server
//!
//! An application owns the initial markup of a session's document and the
//! listeners that react to replayed interactions.

use std::path::Path;
use std::sync::Arc;

use dynaser_dom::{DomEvent, Document, Listener, ListenerOptions, NodeId};
use tracing::warn;

use crate::config::Config;
use crate::error::{ServerError, ServerResult};

pub trait Application: Send + Sync {
    fn name(&self) -> &str;

    /// Full HTML of a fresh session document
    fn render(&self) -> String;

    /// Register listeners on a freshly parsed document
    fn install(&self, doc: &mut Document) -> ServerResult<()>;
}

const COUNTER_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Counter</title></head>
<body>
<h1>Counter</h1>
<p>Count: <span id="count">0</span></p>
<button id="decrement">-</button>
<button id="increment">+</button>
<button id="reset">reset</button>
<label>Step <input id="step" type="number" value="1"></label>
</body>
</html>"#;

/// A counter driven entirely by server-side listeners
#[derive(Debug, Default)]
pub struct CounterApp;

impl CounterApp {
    fn read_count(doc: &Document, span: NodeId) -> i64 {
        doc.text_content(span).trim().parse().unwrap_or(0)
    }

    fn read_step(doc: &Document, input: NodeId) -> i64 {
        doc.value(input)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(1)
    }

    fn on_button(span: NodeId, step: NodeId, delta: i64) -> Listener {
        Arc::new(move |doc: &mut Document, _: &DomEvent| {
            let next = if delta == 0 {
                0
            } else {
                Self::read_count(doc, span) + delta * Self::read_step(doc, step)
            };
            if let Err(err) = doc.set_text_content(span, &next.to_string()) {
                warn!(error = %err, "failed to update counter");
            }
        })
    }
}

fn required(doc: &Document, id: &str) -> ServerResult<NodeId> {
    doc.element_by_id(id)
        .ok_or_else(|| ServerError::MissingElement(id.to_string()))
}

impl Application for CounterApp {
    fn name(&self) -> &str {
        "counter"
    }

    fn render(&self) -> String {
        COUNTER_HTML.to_string()
    }

    fn install(&self, doc: &mut Document) -> ServerResult<()> {
        let span = required(doc, "count")?;
        let step = required(doc, "step")?;

        for (id, delta) in [("decrement", -1), ("increment", 1), ("reset", 0)] {
            let button = required(doc, id)?;
            doc.add_event_listener(
                button,
                "click",
                ListenerOptions::default(),
                Self::on_button(span, step, delta),
            )?;
        }

        // keep the attribute in step with what the user typed
        let reflect: Listener = Arc::new(move |doc: &mut Document, _: &DomEvent| {
            let value = doc.value(step).unwrap_or_default();
            if let Err(err) = doc.set_attribute(step, "value", &value) {
                warn!(error = %err, "failed to reflect step value");
            }
        });
        doc.add_event_listener(step, "input", ListenerOptions::default(), reflect)?;
        Ok(())
    }
}

/// Serves a fixed HTML document with no listeners
#[derive(Debug, Clone)]
pub struct StaticPage {
    pub html: String,
}

impl StaticPage {
    pub fn load(path: &Path) -> ServerResult<Self> {
        let html = std::fs::read_to_string(path)?;
        Ok(Self { html })
    }
}

impl Application for StaticPage {
    fn name(&self) -> &str {
        "static"
    }

    fn render(&self) -> String {
        self.html.clone()
    }

    fn install(&self, _doc: &mut Document) -> ServerResult<()> {
        Ok(())
    }
}

pub fn build_app(config: &Config) -> ServerResult<Arc<dyn Application>> {
    match config.app.as_str() {
        "counter" => Ok(Arc::new(CounterApp)),
        "static" => {
            let path = config.document.as_deref().ok_or_else(|| {
                ServerError::Config("the static app requires a `document` path".to_string())
            })?;
            Ok(Arc::new(StaticPage::load(path)?))
        }
        other => Err(ServerError::Config(format!("unknown app '{}'", other))),
    }
}

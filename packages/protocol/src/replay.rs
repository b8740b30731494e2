//! Server-side event replay

use dynaser_dom::{Address, NodeId};
use tracing::{debug, warn};

use crate::engine::DomEngine;
use crate::error::ProtocolResult;
use crate::message::InteractionEvent;
use crate::relay::EventKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The selector names no node in the authoritative document
    Unresolved,
    /// The event type is not relayed
    UnknownKind,
    /// The DOM refused the operation
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    Dispatched,
    Dropped(DropReason),
}

/// Replay a relayed client interaction against the authoritative document.
///
/// A miss leaves the document untouched.
pub fn replay<E: DomEngine + ?Sized>(engine: &mut E, event: &InteractionEvent) -> ReplayOutcome {
    let Some(kind) = EventKind::parse(&event.event_type) else {
        debug!(event_type = %event.event_type, "dropping unknown event type");
        return ReplayOutcome::Dropped(DropReason::UnknownKind);
    };

    let target = event
        .selector
        .parse::<Address>()
        .ok()
        .and_then(|address| engine.resolve(&address));
    let Some(target) = target else {
        debug!(selector = %event.selector, "event target not found; dropping");
        return ReplayOutcome::Dropped(DropReason::Unresolved);
    };

    match perform(engine, kind, target, event.value.as_deref()) {
        Ok(()) => ReplayOutcome::Dispatched,
        Err(err) => {
            warn!(error = %err, kind = %kind, selector = %event.selector, "replay rejected");
            ReplayOutcome::Dropped(DropReason::Rejected)
        }
    }
}

fn perform<E: DomEngine + ?Sized>(
    engine: &mut E,
    kind: EventKind,
    target: NodeId,
    value: Option<&str>,
) -> ProtocolResult<()> {
    match kind {
        EventKind::Click => engine.click(target),
        EventKind::Change => {
            if let Some(value) = value {
                engine.set_value(target, value)?;
            }
            engine.dispatch(target, "input", true)?;
            reflect_value(engine, target)
        }
        other => engine.dispatch(target, other.as_str(), other.bubbles()),
    }
}

/// Copy the live value into the `value` attribute so the observer records it.
/// Listeners that already reflected it leave nothing to do.
fn reflect_value<E: DomEngine + ?Sized>(engine: &mut E, target: NodeId) -> ProtocolResult<()> {
    let Some(live) = engine.value(target) else {
        return Ok(());
    };
    if engine.attribute(target, "value").as_deref() == Some(live.as_str()) {
        return Ok(());
    }
    engine.set_attribute(target, "value", &live)
}

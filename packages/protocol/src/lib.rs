pub mod applier;
pub mod boundary;
pub mod bridge;
pub mod engine;
pub mod error;
pub mod message;
pub mod relay;
pub mod replay;
pub mod sanitize;

#[cfg(test)]
mod tests_sync;

pub use applier::{ApplyReport, ClientSession, ClientView, PatchApplier};
pub use boundary::MountPoint;
pub use bridge::{MutationBridge, OutboundSink};
pub use engine::DomEngine;
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    AttributeChange, CharacterData, ClientMessage, InteractionEvent, MutationRecord,
    RemovedNodeDescriptor, ServerEvent, ServerMessage,
};
pub use relay::{EventKind, EventRelay, EventSink};
pub use replay::{replay, DropReason, ReplayOutcome};
pub use sanitize::{is_event_handler_attribute, sanitize, sanitize_document};

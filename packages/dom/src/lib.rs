pub mod document;
pub mod error;
pub mod events;
pub mod html;
pub mod lexer;
pub mod node;
pub mod observer;
pub mod selector;

#[cfg(test)]
mod tests_mutations;

pub use document::Document;
pub use error::{DomError, DomResult};
pub use events::{DomEvent, EventPhase, Listener, ListenerId, ListenerOptions};
pub use html::AdjacentPosition;
pub use node::{ElementData, Node, NodeData, NodeId};
pub use observer::{MutationKind, MutationObserverInit, RawMutation, RemovedNode};
pub use selector::{
    address_of, resolve, resolve_child, resolve_str, Address, AddressParseError, Segment,
};

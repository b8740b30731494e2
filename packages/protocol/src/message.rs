//! Wire messages
//!
//! Every message is one JSON text frame tagged by `type`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolResult;

/// Server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Full sanitized document, sent once per connection before any mutation
    Initial {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Mutation(MutationRecord),
    /// Reserved; clients only log it
    Event(ServerEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRecord {
    /// Server-space address of the target element
    pub selector: String,
    #[serde(default)]
    pub added_nodes: Vec<String>,
    #[serde(default)]
    pub removed_nodes: Vec<RemovedNodeDescriptor>,
    /// Always present on the wire, `null` unless this is an attribute change
    #[serde(default)]
    pub attribute: Option<AttributeChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_data: Option<CharacterData>,
}

impl MutationRecord {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            attribute: None,
            character_data: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.attribute.is_none()
            && self.character_data.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedNodeDescriptor {
    /// Lowercase tag, or `#text` / `#comment`
    pub tag_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub name: String,
    /// `None` when the attribute was removed
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterData {
    /// Position among the target's text-node children
    pub index: usize,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServerEvent {
    #[serde(flatten)]
    pub detail: Map<String, Value>,
}

/// Client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Event(InteractionEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEvent {
    #[serde(rename = "eventType")]
    pub event_type: String,
    /// Server-space address of the event target
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ServerMessage {
    pub fn from_json(text: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ClientMessage {
    pub fn from_json(text: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

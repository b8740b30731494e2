use thiserror::Error;

use dynaser_dom::DomError;

pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    #[error("No node at {selector}")]
    AddressResolutionMiss { selector: String },

    #[error("Transport unavailable")]
    TransportUnavailable,

    #[error("DOM error: {0}")]
    Dom(#[from] DomError),
}

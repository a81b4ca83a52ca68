//! JSON messages exchanged with a connected client.

use ivy_core::{CommitMessage, InboundEvent};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed inbound message: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("could not encode outbound message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("client connection failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("client connection is closed")]
    Closed,
}

/// A user-facing error report shown by the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
}

/// Everything the host sends to its client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    Commit(CommitMessage),
    Notification(Notification),
}

impl OutboundMessage {
    pub fn to_json(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(WireError::Encode)
    }
}

/// Decodes one inbound event, e.g.
/// `{"widgetId": 12, "eventName": "click", "args": []}`.
pub fn decode_event(json: &str) -> Result<InboundEvent, WireError> {
    serde_json::from_str(json).map_err(WireError::Decode)
}

/// Outbound half of a client link. Implementations deliver messages in the
/// order they are sent.
pub trait ClientConnection {
    fn send(&self, message: OutboundMessage) -> Result<(), WireError>;
}

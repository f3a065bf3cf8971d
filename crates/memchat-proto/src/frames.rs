use serde::{Deserialize, Serialize};

use crate::error::ProtoError;
use crate::types::{ChatRequest, ConversationMessage};

/// Frames pushed by the server over the socket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Event(ServerEvent),
    State(StateSync),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    /// Assistant reply for the connection that sent the message.
    Message { text: String },
    /// Handshake: the socket is bound to the named agent instance.
    Identity { agent: String, name: String },
    /// Validation failure for a socket message.
    Error { error: String },
}

/// Authoritative full conversation. Always replaces the receiver's copy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSync {
    pub conversation: Vec<ConversationMessage>,
}

impl ServerFrame {
    pub fn message(text: impl Into<String>) -> Self {
        ServerFrame::Event(ServerEvent::Message { text: text.into() })
    }

    pub fn identity(agent: impl Into<String>, name: impl Into<String>) -> Self {
        ServerFrame::Event(ServerEvent::Identity {
            agent: agent.into(),
            name: name.into(),
        })
    }

    pub fn error(error: impl Into<String>) -> Self {
        ServerFrame::Event(ServerEvent::Error { error: error.into() })
    }

    pub fn state(conversation: Vec<ConversationMessage>) -> Self {
        ServerFrame::State(StateSync { conversation })
    }

    pub fn decode(raw: &str) -> Result<Self, ProtoError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        serde_json::from_value(value.clone()).map_err(|_| ProtoError::UnknownFrame(value.to_string()))
    }

    pub fn encode(&self) -> String {
        // Serializing these plain structs cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Assistant text carried by a `message` frame, if non-blank.
    pub fn assistant_text(&self) -> Option<&str> {
        match self {
            ServerFrame::Event(ServerEvent::Message { text }) if !text.trim().is_empty() => {
                Some(text)
            }
            _ => None,
        }
    }
}

/// Control frames sent by the client next to chat bodies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientControl {
    /// Clear the remote conversation.
    Reset,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientFrame {
    Control(ClientControl),
    Chat(ChatRequest),
}

impl ClientFrame {
    /// Lenient decode: anything that is not a recognised frame becomes an empty chat
    /// request, which the server rejects as a missing message.
    pub fn from_text(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| ClientFrame::Chat(ChatRequest::default()))
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

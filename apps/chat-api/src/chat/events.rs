//! Chat wire-format messages, both directions.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChatError;
use crate::models::message::RoomMessage;

// ---------------------------------------------------------------------------
// Client → Server message
// ---------------------------------------------------------------------------

/// Message kinds accepted from a client.
pub struct MessageKind;

impl MessageKind {
    pub const JOIN: &'static str = "join";
    pub const CHAT: &'static str = "chat";
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JoinPayload {
    pub name: String,
    pub receiver: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatPayload {
    pub text: String,
}

/// A message received from the client, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Join(JoinPayload),
    Chat(ChatPayload),
}

impl ClientMessage {
    /// Parse a raw text frame.
    ///
    /// An unknown `type` is reported as [`ChatError::UnrecognizedMessage`];
    /// anything structurally wrong (bad JSON, missing fields) as
    /// [`ChatError::MalformedMessage`].
    pub fn parse(raw: &str) -> Result<Self, ChatError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| ChatError::MalformedMessage(e.to_string()))?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ChatError::MalformedMessage("missing message type".to_string()))?
            .to_string();

        let malformed = |e: serde_json::Error| ChatError::MalformedMessage(e.to_string());
        match kind.as_str() {
            MessageKind::JOIN => Ok(Self::Join(serde_json::from_value(value).map_err(malformed)?)),
            MessageKind::CHAT => Ok(Self::Chat(serde_json::from_value(value).map_err(malformed)?)),
            _ => Err(ChatError::UnrecognizedMessage(kind)),
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client message
// ---------------------------------------------------------------------------

/// Frame sent when a server message cannot be serialized.
const SERIALIZE_FAILED: &str = r#"{"type":"error","text":"failed to encode message"}"#;

/// A message sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// System notice (joins, departures).
    Note { text: String },
    Chat {
        name: String,
        text: String,
        date: String,
    },
    /// Room history, sent only to the connection that just joined.
    History { messages: Vec<RoomMessage> },
    /// A rejected inbound message. The connection stays open.
    Error { text: String },
}

impl ServerMessage {
    pub fn joined(name: &str, room: &str) -> Self {
        Self::Note {
            text: format!("{name} joined \"{room}\"."),
        }
    }

    pub fn left(name: &str, room: &str) -> Self {
        Self::Note {
            text: format!("{name} left \"{room}\"."),
        }
    }

    /// Build a chat broadcast stamped with the handling time.
    pub fn chat(name: &str, text: &str, at: DateTime<Utc>) -> Self {
        Self::Chat {
            name: name.to_string(),
            text: text.to_string(),
            date: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn error(err: &ChatError) -> Self {
        Self::Error {
            text: err.to_string(),
        }
    }

    /// Serialize for the wire. Every variant is plain strings and derived
    /// records, so failure is not expected; if it happens it is logged and an
    /// error frame is sent in place of an empty one.
    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(%err, "failed to serialize server message");
                SERIALIZE_FAILED.to_string()
            }
        }
    }
}

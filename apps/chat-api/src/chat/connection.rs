//! Per-connection handler: adapts one transport connection to one room.

use std::sync::Arc;

use bookclub_common::id::prefix;
use bookclub_common::PrefixedId;
use chrono::Utc;

use crate::error::ChatError;

use super::events::{ChatPayload, ClientMessage, JoinPayload, ServerMessage};
use super::history::MessageHistory;
use super::registry::RoomRegistry;
use super::room::{Member, Room};
use super::sink::MessageSink;

/// Lifecycle of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    Unjoined,
    Joined,
    Closed,
}

/// Bridges one connection's inbound messages to room operations.
///
/// Inbound messages must be fed in arrival order; the transport awaits each
/// `on_message` before reading the next frame.
pub struct ConnectionHandler {
    connection_id: String,
    room_name: String,
    sink: Arc<dyn MessageSink>,
    registry: Arc<RoomRegistry>,
    history: MessageHistory,
    room: Option<Arc<Room>>,
    member: Option<Member>,
    state: HandlerState,
}

impl PrefixedId for ConnectionHandler {
    const PREFIX: &'static str = prefix::CONNECTION;
}

impl ConnectionHandler {
    /// Called when a connection opens for `room_name`. The room itself is
    /// resolved lazily on first join.
    pub fn open(
        room_name: impl Into<String>,
        sink: Arc<dyn MessageSink>,
        registry: Arc<RoomRegistry>,
        history: MessageHistory,
    ) -> Self {
        Self {
            connection_id: Self::generate(),
            room_name: room_name.into(),
            sink,
            registry,
            history,
            room: None,
            member: None,
            state: HandlerState::Unjoined,
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    /// Sender identity, set once joined.
    pub fn name(&self) -> Option<&str> {
        self.member.as_ref().map(|m| m.name.as_str())
    }

    /// Counterpart identity, set once joined.
    pub fn receiver(&self) -> Option<&str> {
        self.member.as_ref().map(|m| m.receiver.as_str())
    }

    /// Handle one raw inbound frame.
    pub async fn on_message(&mut self, raw: &str) -> Result<(), ChatError> {
        if self.state == HandlerState::Closed {
            return Err(ChatError::Closed);
        }
        match ClientMessage::parse(raw)? {
            ClientMessage::Join(payload) => self.join(payload).await,
            ClientMessage::Chat(payload) => self.chat(payload).await,
        }
    }

    async fn join(&mut self, JoinPayload { name, receiver }: JoinPayload) -> Result<(), ChatError> {
        let room = self.resolve_room().await?;
        let member = Member::new(&self.connection_id, name, receiver, self.sink.clone());

        if let Err(err) = room.join(member.clone()).await {
            if !room.is_member(&self.connection_id) {
                self.room = None;
            }
            return Err(err);
        }
        self.member = Some(member);
        self.state = HandlerState::Joined;

        let name = self.name().unwrap_or_default();
        tracing::info!(
            connection_id = %self.connection_id,
            room = %self.room_name,
            member = %name,
            members = room.member_count(),
            "connection joined room"
        );

        room.broadcast(&ServerMessage::joined(name, &self.room_name));

        let messages = self.history.messages_for_room(&self.room_name).await?;
        self.show(&ServerMessage::History { messages })
    }

    async fn chat(&mut self, ChatPayload { text }: ChatPayload) -> Result<(), ChatError> {
        let (Some(room), Some(member)) = (self.room.as_ref(), self.member.as_ref()) else {
            return Err(ChatError::NotJoined);
        };

        room.broadcast(&ServerMessage::chat(&member.name, &text, Utc::now()));
        self.history
            .record_message(&self.room_name, &member.name, &text)
            .await?;
        Ok(())
    }

    /// Deliver a payload to this connection only.
    pub fn show(&self, message: &ServerMessage) -> Result<(), ChatError> {
        match (&self.room, &self.member) {
            (Some(room), Some(member)) => room.show(member, message)?,
            _ => self.sink.send(&message.to_json())?,
        }
        Ok(())
    }

    /// Called when the connection closes. Leaves the room and tells the
    /// remaining members; a no-op if no room was ever resolved.
    pub fn on_close(&mut self) {
        let previous = std::mem::replace(&mut self.state, HandlerState::Closed);
        if previous == HandlerState::Closed {
            return;
        }
        let Some(room) = self.room.take() else {
            return;
        };

        if let Some(member) = room.leave(&self.connection_id) {
            room.broadcast(&ServerMessage::left(&member.name, &self.room_name));
            tracing::info!(
                connection_id = %self.connection_id,
                room = %self.room_name,
                member = %member.name,
                members = room.member_count(),
                "connection left room"
            );
        }
    }

    /// The room to join. A cached room is reused only while this connection
    /// is live in it; otherwise it may have been pruned, so ask the registry
    /// again.
    async fn resolve_room(&mut self) -> Result<Arc<Room>, ChatError> {
        if let Some(room) = &self.room {
            if room.is_member(&self.connection_id) {
                return Ok(room.clone());
            }
        }
        let room = self.registry.get(&self.room_name).await?;
        self.room = Some(room.clone());
        Ok(room)
    }
}

//! Read/write access to persisted chat messages, keyed by room name.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::store::ChatStore;
use crate::error::ChatError;
use crate::models::message::{Message, RoomMessage};
use crate::models::room::RoomRecord;
use crate::models::user::MemberProfile;

/// A conversation in a user's "recent" list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RecentRoom {
    pub room: String,
    pub last_activity: DateTime<Utc>,
    /// The other party of the two-party room, if anyone else is enrolled.
    pub counterpart: Option<MemberProfile>,
    /// `None` for rooms nobody has written in yet.
    pub last_message: Option<Message>,
}

#[derive(Clone)]
pub struct MessageHistory {
    store: Arc<dyn ChatStore>,
}

impl MessageHistory {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    /// Persist a message in an existing room. Unlike `RoomRegistry::get`,
    /// this never creates the room.
    pub async fn record_message(
        &self,
        room_name: &str,
        sender: &str,
        text: &str,
    ) -> Result<Message, ChatError> {
        let room = self.resolve(room_name).await?;
        self.store.insert_message(room.id, sender, text).await
    }

    /// Full history of a room, oldest first. A room without messages yields
    /// an empty list; a room that does not exist is an error.
    pub async fn messages_for_room(&self, room_name: &str) -> Result<Vec<RoomMessage>, ChatError> {
        let room = self.resolve(room_name).await?;
        self.store.room_messages(room.id).await
    }

    /// Rooms the user has ever been enrolled in, most recently active first.
    pub async fn rooms_for_user(&self, username: &str) -> Result<Vec<RoomRecord>, ChatError> {
        self.store.rooms_for_user(username).await
    }

    /// The user's rooms with their latest message and counterpart, in the
    /// same order as [`Self::rooms_for_user`].
    pub async fn last_message_per_room(&self, username: &str) -> Result<Vec<RecentRoom>, ChatError> {
        let rooms = self.rooms_for_user(username).await?;

        let mut recent = Vec::with_capacity(rooms.len());
        for room in rooms {
            let last_message = self.store.last_message(room.id).await?;
            let counterpart = self.store.counterpart(room.id, username).await?;
            recent.push(RecentRoom {
                room: room.name,
                last_activity: room.last_activity,
                counterpart,
                last_message,
            });
        }
        Ok(recent)
    }

    async fn resolve(&self, room_name: &str) -> Result<RoomRecord, ChatError> {
        self.store
            .find_room(room_name)
            .await?
            .ok_or_else(|| ChatError::RoomNotFound(room_name.to_string()))
    }
}

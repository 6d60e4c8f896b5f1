use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::messages;

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: i64,
    pub room_id: i32,
    pub sender: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage<'a> {
    pub room_id: i32,
    pub sender: &'a str,
    pub text: &'a str,
    pub created_at: DateTime<Utc>,
}

/// A message as returned for history hydration: the row plus the sender's
/// display image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RoomMessage {
    pub id: i64,
    pub sender: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub sender_image: Option<String>,
}

impl RoomMessage {
    pub fn new(message: Message, sender_image: Option<String>) -> Self {
        Self {
            id: message.id,
            sender: message.sender,
            text: message.text,
            created_at: message.created_at,
            sender_image,
        }
    }
}

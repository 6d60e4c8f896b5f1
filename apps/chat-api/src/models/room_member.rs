use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::db::schema::room_members;

/// Durable (room, user) association. Independent of live connections.
#[derive(Debug, Insertable)]
#[diesel(table_name = room_members)]
pub struct NewRoomMember<'a> {
    pub room_id: i32,
    pub username: &'a str,
    pub joined_at: DateTime<Utc>,
}

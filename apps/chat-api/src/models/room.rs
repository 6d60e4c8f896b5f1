use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema::rooms;

/// The persisted row behind a chat room. Outlives the in-memory `Room`.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize)]
#[diesel(table_name = rooms)]
pub struct RoomRecord {
    pub id: i32,
    pub name: String,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = rooms)]
pub struct NewRoom<'a> {
    pub name: &'a str,
    pub last_activity: DateTime<Utc>,
}

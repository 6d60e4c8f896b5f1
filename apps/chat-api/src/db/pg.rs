//! Postgres-backed persistence gateway.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use diesel_async::{AsyncConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;

use crate::db::pool::DbPool;
use crate::db::schema::{messages, room_members, rooms, users};
use crate::error::ChatError;
use crate::models::message::{Message, NewMessage, RoomMessage};
use crate::models::room::{NewRoom, RoomRecord};
use crate::models::room_member::NewRoomMember;
use crate::models::user::MemberProfile;

use super::store::ChatStore;

pub struct PgChatStore {
    db: DbPool,
}

impl PgChatStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn find_room(&self, name: &str) -> Result<Option<RoomRecord>, ChatError> {
        let mut conn = self.db.get().await?;
        let room = rooms::table
            .filter(rooms::name.eq(name))
            .select(RoomRecord::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(room)
    }

    async fn create_room(&self, name: &str) -> Result<RoomRecord, ChatError> {
        let mut conn = self.db.get().await?;
        let room = diesel::insert_into(rooms::table)
            .values(NewRoom {
                name,
                last_activity: Utc::now(),
            })
            .returning(RoomRecord::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(room)
    }

    async fn touch_room(&self, room_id: i32) -> Result<RoomRecord, ChatError> {
        let mut conn = self.db.get().await?;
        let room = diesel::update(rooms::table.find(room_id))
            .set(rooms::last_activity.eq(Utc::now()))
            .returning(RoomRecord::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(room)
    }

    async fn add_room_members(&self, room_id: i32, usernames: &[&str]) -> Result<usize, ChatError> {
        let mut conn = self.db.get().await?;
        let usernames: Vec<String> = usernames.iter().map(|u| u.to_string()).collect();

        let inserted = conn
            .transaction::<_, ChatError, _>(|conn| {
                async move {
                    let mut inserted = 0;
                    for username in &usernames {
                        let exists: Option<String> = room_members::table
                            .find((room_id, username))
                            .select(room_members::username)
                            .first(conn)
                            .await
                            .optional()?;
                        if exists.is_some() {
                            continue;
                        }

                        inserted += diesel::insert_into(room_members::table)
                            .values(NewRoomMember {
                                room_id,
                                username,
                                joined_at: Utc::now(),
                            })
                            .execute(conn)
                            .await?;
                    }
                    Ok(inserted)
                }
                .scope_boxed()
            })
            .await?;

        Ok(inserted)
    }

    async fn insert_message(
        &self,
        room_id: i32,
        sender: &str,
        text: &str,
    ) -> Result<Message, ChatError> {
        let mut conn = self.db.get().await?;
        let message = diesel::insert_into(messages::table)
            .values(NewMessage {
                room_id,
                sender,
                text,
                created_at: Utc::now(),
            })
            .returning(Message::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(message)
    }

    async fn room_messages(&self, room_id: i32) -> Result<Vec<RoomMessage>, ChatError> {
        let mut conn = self.db.get().await?;
        let rows: Vec<(Message, Option<String>)> = messages::table
            .left_join(users::table.on(users::username.eq(messages::sender)))
            .filter(messages::room_id.eq(room_id))
            .order((messages::created_at.asc(), messages::id.asc()))
            .select((Message::as_select(), users::image_url.nullable()))
            .load(&mut conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(message, image)| RoomMessage::new(message, image))
            .collect())
    }

    async fn rooms_for_user(&self, username: &str) -> Result<Vec<RoomRecord>, ChatError> {
        let mut conn = self.db.get().await?;
        let rooms = rooms::table
            .inner_join(room_members::table)
            .filter(room_members::username.eq(username))
            .order((rooms::last_activity.desc(), rooms::id.desc()))
            .select(RoomRecord::as_select())
            .load(&mut conn)
            .await?;
        Ok(rooms)
    }

    async fn last_message(&self, room_id: i32) -> Result<Option<Message>, ChatError> {
        let mut conn = self.db.get().await?;
        let message = messages::table
            .filter(messages::room_id.eq(room_id))
            .order((messages::created_at.desc(), messages::id.desc()))
            .select(Message::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(message)
    }

    async fn counterpart(
        &self,
        room_id: i32,
        username: &str,
    ) -> Result<Option<MemberProfile>, ChatError> {
        let mut conn = self.db.get().await?;
        let row: Option<(String, Option<String>)> = room_members::table
            .left_join(users::table.on(users::username.eq(room_members::username)))
            .filter(room_members::room_id.eq(room_id))
            .filter(room_members::username.ne(username))
            .order(room_members::joined_at.asc())
            .select((room_members::username, users::image_url.nullable()))
            .first(&mut conn)
            .await
            .optional()?;

        Ok(row.map(|(username, image)| MemberProfile {
            username,
            image_url: image,
        }))
    }
}

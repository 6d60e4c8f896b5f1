use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::error::ChatError;
use crate::models::message::{Message, RoomMessage};
use crate::models::room::RoomRecord;
use crate::models::user::MemberProfile;

/// Persistence gateway for rooms, room membership and messages.
///
/// Backed by Postgres in production and an in-memory store in tests. Every
/// call is treated as atomic; failures are returned unmodified and never
/// retried by the caller.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn find_room(&self, name: &str) -> Result<Option<RoomRecord>, ChatError>;

    async fn create_room(&self, name: &str) -> Result<RoomRecord, ChatError>;

    /// Refresh `last_activity` to now and return the updated row.
    async fn touch_room(&self, room_id: i32) -> Result<RoomRecord, ChatError>;

    /// Insert a membership row for every username that does not have one yet,
    /// all or nothing. Returns the number of rows inserted.
    async fn add_room_members(&self, room_id: i32, usernames: &[&str]) -> Result<usize, ChatError>;

    /// Insert a message; the store assigns the id and timestamp.
    async fn insert_message(
        &self,
        room_id: i32,
        sender: &str,
        text: &str,
    ) -> Result<Message, ChatError>;

    /// All messages of a room, oldest first, with sender display metadata.
    async fn room_messages(&self, room_id: i32) -> Result<Vec<RoomMessage>, ChatError>;

    /// Rooms the user has a membership row in, most recently active first.
    async fn rooms_for_user(&self, username: &str) -> Result<Vec<RoomRecord>, ChatError>;

    async fn last_message(&self, room_id: i32) -> Result<Option<Message>, ChatError>;

    /// The first other member of a room, as seen from `username`.
    async fn counterpart(
        &self,
        room_id: i32,
        username: &str,
    ) -> Result<Option<MemberProfile>, ChatError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation (for tests)
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    next_room_id: i32,
    next_message_id: i64,
    rooms: Vec<RoomRecord>,
    /// Membership rows in insertion order.
    members: Vec<(i32, String)>,
    messages: Vec<Message>,
    users: HashMap<String, Option<String>>,
}

impl MemoryState {
    fn image_of(&self, username: &str) -> Option<String> {
        self.users.get(username).cloned().flatten()
    }
}

pub struct MemoryChatStore {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
    fail_member_insert: AtomicBool,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            unavailable: AtomicBool::new(false),
            fail_member_insert: AtomicBool::new(false),
        }
    }

    /// Seed display metadata for a user.
    pub fn register_user(&self, username: &str, image_url: Option<&str>) {
        self.state
            .lock()
            .users
            .insert(username.to_string(), image_url.map(str::to_string));
    }

    /// Make every subsequent call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make only the next `add_room_members` call fail.
    pub fn fail_next_member_insert(&self) {
        self.fail_member_insert.store(true, Ordering::SeqCst);
    }

    /// Number of persisted rows carrying `name`.
    pub fn room_rows(&self, name: &str) -> usize {
        self.state.lock().rooms.iter().filter(|r| r.name == name).count()
    }

    /// Usernames with a membership row in the room, in insertion order.
    pub fn member_rows(&self, room_id: i32) -> Vec<String> {
        self.state
            .lock()
            .members
            .iter()
            .filter(|(id, _)| *id == room_id)
            .map(|(_, username)| username.clone())
            .collect()
    }

    pub fn message_count(&self) -> usize {
        self.state.lock().messages.len()
    }

    fn check(&self) -> Result<(), ChatError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ChatError::Persistence("store unavailable".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryChatStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn find_room(&self, name: &str) -> Result<Option<RoomRecord>, ChatError> {
        // A real gateway suspends here; yield so lookup-then-create races surface.
        tokio::task::yield_now().await;
        self.check()?;
        Ok(self.state.lock().rooms.iter().find(|r| r.name == name).cloned())
    }

    async fn create_room(&self, name: &str) -> Result<RoomRecord, ChatError> {
        self.check()?;
        let mut state = self.state.lock();
        state.next_room_id += 1;
        let room = RoomRecord {
            id: state.next_room_id,
            name: name.to_string(),
            last_activity: Utc::now(),
        };
        state.rooms.push(room.clone());
        Ok(room)
    }

    async fn touch_room(&self, room_id: i32) -> Result<RoomRecord, ChatError> {
        self.check()?;
        let mut state = self.state.lock();
        let room = state
            .rooms
            .iter_mut()
            .find(|r| r.id == room_id)
            .ok_or_else(|| ChatError::Persistence(format!("room {room_id} vanished")))?;
        room.last_activity = Utc::now();
        Ok(room.clone())
    }

    async fn add_room_members(&self, room_id: i32, usernames: &[&str]) -> Result<usize, ChatError> {
        self.check()?;
        if self.fail_member_insert.swap(false, Ordering::SeqCst) {
            return Err(ChatError::Persistence("membership insert failed".to_string()));
        }
        let mut state = self.state.lock();
        let mut inserted = 0;
        for username in usernames {
            let exists = state
                .members
                .iter()
                .any(|(id, name)| *id == room_id && name == username);
            if !exists {
                state.members.push((room_id, username.to_string()));
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn insert_message(
        &self,
        room_id: i32,
        sender: &str,
        text: &str,
    ) -> Result<Message, ChatError> {
        self.check()?;
        let mut state = self.state.lock();
        state.next_message_id += 1;
        let message = Message {
            id: state.next_message_id,
            room_id,
            sender: sender.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn room_messages(&self, room_id: i32) -> Result<Vec<RoomMessage>, ChatError> {
        self.check()?;
        let state = self.state.lock();
        let mut messages: Vec<&Message> =
            state.messages.iter().filter(|m| m.room_id == room_id).collect();
        messages.sort_by_key(|m| (m.created_at, m.id));
        Ok(messages
            .into_iter()
            .map(|m| RoomMessage::new(m.clone(), state.image_of(&m.sender)))
            .collect())
    }

    async fn rooms_for_user(&self, username: &str) -> Result<Vec<RoomRecord>, ChatError> {
        self.check()?;
        let state = self.state.lock();
        let mut rooms: Vec<RoomRecord> = state
            .rooms
            .iter()
            .filter(|r| {
                state
                    .members
                    .iter()
                    .any(|(id, name)| *id == r.id && name == username)
            })
            .cloned()
            .collect();
        rooms.sort_by(|a, b| {
            b.last_activity
                .cmp(&a.last_activity)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rooms)
    }

    async fn last_message(&self, room_id: i32) -> Result<Option<Message>, ChatError> {
        self.check()?;
        Ok(self
            .state
            .lock()
            .messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .max_by_key(|m| (m.created_at, m.id))
            .cloned())
    }

    async fn counterpart(
        &self,
        room_id: i32,
        username: &str,
    ) -> Result<Option<MemberProfile>, ChatError> {
        self.check()?;
        let state = self.state.lock();
        Ok(state
            .members
            .iter()
            .find(|(id, name)| *id == room_id && name != username)
            .map(|(_, name)| MemberProfile {
                username: name.clone(),
                image_url: state.image_of(name),
            }))
    }
}

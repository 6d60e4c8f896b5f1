//! Process-wide registry of live rooms, keyed by room name.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::db::store::ChatStore;
use crate::error::ChatError;

use super::room::Room;

/// Owns the single live `Room` per room name.
///
/// Created once at server start and shared through `AppState`. The
/// lookup-or-create of the persisted row and of the in-memory room runs under
/// a per-name guard, so concurrent first access to a new name yields one row
/// and one object.
pub struct RoomRegistry {
    store: Arc<dyn ChatStore>,
    rooms: DashMap<String, Arc<Room>>,
    guards: DashMap<String, Arc<Mutex<()>>>,
}

impl RoomRegistry {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self {
            store,
            rooms: DashMap::new(),
            guards: DashMap::new(),
        }
    }

    /// Return the live room for `name`, creating the persisted row and the
    /// in-memory room as needed. An existing row gets its `last_activity`
    /// refreshed. Never fails with "not found".
    pub async fn get(&self, name: &str) -> Result<Arc<Room>, ChatError> {
        let guard = self.guards.entry(name.to_string()).or_default().clone();
        let _held = guard.lock().await;

        let record = match self.store.find_room(name).await? {
            Some(existing) => self.store.touch_room(existing.id).await?,
            None => {
                let created = self.store.create_room(name).await?;
                tracing::info!(room = %name, room_id = created.id, "room created");
                created
            }
        };

        let room = self
            .rooms
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Room::new(record.id, name, self.store.clone())))
            .clone();
        room.touch();

        Ok(room)
    }

    /// The live room for `name`, if this process has one. No persistence.
    pub fn lookup(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.get(name).map(|r| r.value().clone())
    }

    /// Number of live rooms held in memory.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Drop in-memory rooms that have no live members and have not been
    /// accessed for at least `ttl`, along with guards no longer in use.
    /// Persisted rows are untouched. Rooms whose guard is currently held by a
    /// `get` are skipped.
    ///
    /// Returns the number of rooms removed.
    pub fn prune_idle(&self, ttl: Duration) -> usize {
        let candidates: Vec<String> = self
            .rooms
            .iter()
            .filter(|entry| entry.member_count() == 0 && entry.idle_for() >= ttl)
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for name in candidates {
            let Some(guard) = self.guards.get(&name).map(|g| g.value().clone()) else {
                continue;
            };
            let Ok(_held) = guard.try_lock() else {
                continue;
            };
            if self
                .rooms
                .remove_if(&name, |_, room| {
                    room.member_count() == 0 && room.idle_for() >= ttl
                })
                .is_some()
            {
                tracing::debug!(room = %name, "pruned idle room");
                removed += 1;
            }
        }

        // A guard with no room and no other holder has no `get` behind it.
        self.guards
            .retain(|name, guard| Arc::strong_count(guard) > 1 || self.rooms.contains_key(name));

        removed
    }
}

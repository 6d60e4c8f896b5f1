//! A chat room and its live member set.
//!
//! In practice every room is a two-party channel: joining enrolls both the
//! joiner and the declared receiver as persisted members, whichever side
//! opens it first. The live member set, however, only ever holds actual
//! connections.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::db::store::ChatStore;
use crate::error::{ChatError, DeliveryError};

use super::events::ServerMessage;
use super::sink::MessageSink;

/// A live connection registered in a room.
///
/// Identity is the connection id, not the display name: two connections
/// joining as the same user are two members.
#[derive(Clone)]
pub struct Member {
    pub connection_id: String,
    pub name: String,
    pub receiver: String,
    sink: Arc<dyn MessageSink>,
}

impl Member {
    pub fn new(
        connection_id: impl Into<String>,
        name: impl Into<String>,
        receiver: impl Into<String>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            name: name.into(),
            receiver: receiver.into(),
            sink,
        }
    }

    fn send(&self, payload: &str) -> Result<(), DeliveryError> {
        self.sink.send(payload)
    }
}

/// A member whose send capability failed during a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub connection_id: String,
    pub name: String,
    pub error: DeliveryError,
}

/// Outcome of a broadcast. Failures belong to the failing members, not to
/// whoever triggered the broadcast.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: Vec<DeliveryFailure>,
}

pub struct Room {
    id: i32,
    name: String,
    store: Arc<dyn ChatStore>,
    members: Mutex<HashMap<String, Member>>,
    last_access: Mutex<Instant>,
}

impl Room {
    pub(crate) fn new(id: i32, name: impl Into<String>, store: Arc<dyn ChatStore>) -> Self {
        Self {
            id,
            name: name.into(),
            store,
            members: Mutex::new(HashMap::new()),
            last_access: Mutex::new(Instant::now()),
        }
    }

    /// Persisted row id.
    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enroll the member's name and receiver as persisted members (each at
    /// most once), then add the connection to the live set.
    pub async fn join(&self, member: Member) -> Result<(), ChatError> {
        let inserted = self
            .store
            .add_room_members(self.id, &[member.name.as_str(), member.receiver.as_str()])
            .await?;

        tracing::debug!(
            room = %self.name,
            connection_id = %member.connection_id,
            member = %member.name,
            inserted,
            "member joined room"
        );

        self.members
            .lock()
            .insert(member.connection_id.clone(), member);
        Ok(())
    }

    /// Remove a connection from the live set. Persisted membership stays.
    ///
    /// Returns the removed member, or `None` if it was not present.
    pub fn leave(&self, connection_id: &str) -> Option<Member> {
        self.members.lock().remove(connection_id)
    }

    /// Deliver a message to exactly one member.
    pub fn show(&self, member: &Member, message: &ServerMessage) -> Result<(), DeliveryError> {
        member.send(&message.to_json())
    }

    /// Deliver a message to every current member. A failing member does not
    /// stop delivery to the others.
    pub fn broadcast(&self, message: &ServerMessage) -> BroadcastReport {
        let payload = message.to_json();
        // Snapshot so sends never run under the member lock.
        let members: Vec<Member> = self.members.lock().values().cloned().collect();

        let mut report = BroadcastReport::default();
        for member in members {
            match member.send(&payload) {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    tracing::warn!(
                        room = %self.name,
                        connection_id = %member.connection_id,
                        ?error,
                        "delivery to member failed"
                    );
                    report.failed.push(DeliveryFailure {
                        connection_id: member.connection_id,
                        name: member.name,
                        error,
                    });
                }
            }
        }
        report
    }

    pub fn member_count(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_member(&self, connection_id: &str) -> bool {
        self.members.lock().contains_key(connection_id)
    }

    /// Display names of live members, sorted.
    pub fn member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .members
            .lock()
            .values()
            .map(|m| m.name.clone())
            .collect();
        names.sort();
        names
    }

    pub(crate) fn touch(&self) {
        *self.last_access.lock() = Instant::now();
    }

    pub(crate) fn idle_for(&self) -> Duration {
        self.last_access.lock().elapsed()
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, by: Duration) {
        let mut at = self.last_access.lock();
        *at -= by;
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, SignalError};
use crate::rooms::{Participant, Room};

/// Owns every live room. The map sits behind a single lock so two racing
/// connects on a never-seen id agree on one room and one initiator; each
/// room guards its own participant list. Lock order is always map first,
/// then room.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the existing room or creates an empty one. Creation is not
    /// an error condition.
    pub async fn get_or_create(&self, room_id: &str) -> Arc<Room> {
        let mut rooms = self.rooms.write().await;

        if let Some(room) = rooms.get(room_id) {
            return room.clone();
        }

        let room = Arc::new(Room::new(room_id));
        rooms.insert(room_id.to_string(), room.clone());
        tracing::info!("Created room {}", room_id);

        room
    }

    pub async fn get(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Deletes the room if present. Idempotent.
    pub async fn remove(&self, room_id: &str) {
        if self.rooms.write().await.remove(room_id).is_some() {
            tracing::info!("Removed room {}", room_id);
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Adds a connection to the room, creating it on first use. The map
    /// lock is held across the join, so of N concurrent connects on a fresh
    /// id exactly one creates the room and at most two get in.
    pub async fn join(&self, room_id: &str, connection_id: Uuid) -> Result<(Arc<Room>, Participant)> {
        let mut rooms = self.rooms.write().await;

        let room = match rooms.get(room_id) {
            Some(room) => room.clone(),
            None => {
                let room = Arc::new(Room::new(room_id));
                rooms.insert(room_id.to_string(), room.clone());
                tracing::info!("Created room {}", room_id);
                room
            }
        };

        let participant = room.join(connection_id).await?;
        Ok((room, participant))
    }

    /// Removes a connection from the room and returns the removed
    /// participant together with the peer still present, if any. The room
    /// itself is deleted as soon as its participant list empties, on this
    /// path and every other: deletion follows the count, not the caller.
    pub async fn leave(
        &self,
        room_id: &str,
        connection_id: Uuid,
    ) -> Result<(Participant, Option<Participant>)> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get(room_id).cloned().ok_or(SignalError::RoomNotFound)?;

        let removed = room.leave(connection_id).await?;
        let peer = room.peer_of(connection_id).await;

        if room.is_empty().await {
            rooms.remove(room_id);
            tracing::info!("Removed empty room {}", room_id);
        }

        Ok((removed, peer))
    }

    /// Drops every room idle for longer than `timeout` before `now`.
    /// Returns how many were reclaimed. Holding the map lock keeps the
    /// sweep from racing a concurrent join or leave; each room's own lock
    /// is taken only long enough to read its timestamp.
    pub async fn evict_idle(&self, now: DateTime<Utc>, timeout: Duration) -> usize {
        let mut rooms = self.rooms.write().await;

        let mut stale = Vec::new();
        for (id, room) in rooms.iter() {
            if now - room.last_activity().await > timeout {
                stale.push(id.clone());
            }
        }

        for id in &stale {
            rooms.remove(id);
            tracing::info!("Evicted idle room {}", id);
        }

        stale.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, SignalError};

/// Hard cap on concurrent participants in a room.
pub const MAX_PARTICIPANTS: usize = 2;

/// Signaling role, fixed when the participant joins. The first joiner
/// initiates the offer/answer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    pub fn is_initiator(self) -> bool {
        matches!(self, Role::Initiator)
    }
}

/// One connection's membership in a room. Owned exclusively by the room;
/// removed on leave or disconnect.
#[derive(Debug, Clone)]
pub struct Participant {
    pub connection_id: Uuid,
    pub joined_at: DateTime<Utc>,
    pub role: Role,
}

struct RoomInner {
    /// Join order; the initiator, when present, is first.
    participants: Vec<Participant>,
    last_activity: DateTime<Utc>,
}

/// A rendezvous point for two connections.
pub struct Room {
    id: String,
    created_at: DateTime<Utc>,
    inner: RwLock<RoomInner>,
}

impl Room {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            inner: RwLock::new(RoomInner {
                participants: Vec::with_capacity(MAX_PARTICIPANTS),
                last_activity: now,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Adds a participant, assigning Initiator to the first joiner and
    /// Responder to the second.
    pub async fn join(&self, connection_id: Uuid) -> Result<Participant> {
        let mut inner = self.inner.write().await;
        if inner.participants.len() >= MAX_PARTICIPANTS {
            return Err(SignalError::RoomFull);
        }

        let role = if inner.participants.is_empty() {
            Role::Initiator
        } else {
            Role::Responder
        };
        let participant = Participant {
            connection_id,
            joined_at: Utc::now(),
            role,
        };
        inner.participants.push(participant.clone());
        inner.last_activity = participant.joined_at;

        Ok(participant)
    }

    /// Removes and returns the matching participant so callers can notify
    /// the peer. Deleting an emptied room from the registry is the caller's
    /// job, not this method's.
    pub async fn leave(&self, connection_id: Uuid) -> Result<Participant> {
        let mut inner = self.inner.write().await;
        let index = inner
            .participants
            .iter()
            .position(|p| p.connection_id == connection_id)
            .ok_or(SignalError::NotFound)?;

        let removed = inner.participants.remove(index);
        inner.last_activity = Utc::now();

        Ok(removed)
    }

    /// The other participant, if one exists. Every relay and notify
    /// decision goes through here.
    pub async fn peer_of(&self, connection_id: Uuid) -> Option<Participant> {
        self.inner
            .read()
            .await
            .participants
            .iter()
            .find(|p| p.connection_id != connection_id)
            .cloned()
    }

    /// Marks the room active at `at`. Also how tests backdate a room for
    /// eviction.
    pub async fn touch(&self, at: DateTime<Utc>) {
        self.inner.write().await.last_activity = at;
    }

    pub async fn last_activity(&self) -> DateTime<Utc> {
        self.inner.read().await.last_activity
    }

    pub async fn participant_count(&self) -> usize {
        self.inner.read().await.participants.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.participants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_joiner_initiates_second_responds() {
        let room = Room::new("lobby");
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let first = room.join(a).await.unwrap();
        assert_eq!(first.role, Role::Initiator);

        let second = room.join(b).await.unwrap();
        assert_eq!(second.role, Role::Responder);
        assert_eq!(room.participant_count().await, 2);
    }

    #[tokio::test]
    async fn third_join_is_rejected() {
        let room = Room::new("lobby");
        room.join(Uuid::new_v4()).await.unwrap();
        room.join(Uuid::new_v4()).await.unwrap();

        let err = room.join(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SignalError::RoomFull));
        assert_eq!(room.participant_count().await, 2);
    }

    #[tokio::test]
    async fn leave_is_idempotent_per_connection() {
        let room = Room::new("lobby");
        let a = Uuid::new_v4();
        room.join(a).await.unwrap();

        let removed = room.leave(a).await.unwrap();
        assert_eq!(removed.connection_id, a);

        let err = room.leave(a).await.unwrap_err();
        assert!(matches!(err, SignalError::NotFound));
        assert!(room.is_empty().await);
    }

    #[tokio::test]
    async fn peer_of_sees_only_the_other_side() {
        let room = Room::new("lobby");
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        room.join(a).await.unwrap();
        assert!(room.peer_of(a).await.is_none());

        room.join(b).await.unwrap();
        assert_eq!(room.peer_of(a).await.unwrap().connection_id, b);
        assert_eq!(room.peer_of(b).await.unwrap().connection_id, a);
    }
}

//! The signaling state machine.
//!
//! Decides, for each inbound event, which connections hear about it and
//! what they hear. The engine only mutates room state and returns
//! [`Delivery`] values; actually pushing them onto sockets is the
//! connection adapter's job, done after every lock here has been released,
//! so a stalled peer cannot stall unrelated rooms.

use std::sync::Arc;

use chrono::Utc;
use rondo_protocol::{ClientMessage, ServerMessage};
use uuid::Uuid;

use crate::error::{Result, SignalError};
use crate::rooms::{Room, RoomRegistry};

/// A message routed to a single connection.
#[derive(Debug)]
pub struct Delivery {
    pub target: Uuid,
    pub message: ServerMessage,
}

pub struct RelayEngine {
    registry: Arc<RoomRegistry>,
}

impl RelayEngine {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Transport-level connect: the connection enters `room_id`, creating
    /// the room on first use. The joiner is welcomed with its role; an
    /// already-present peer is told someone arrived.
    pub async fn connect(&self, room_id: &str, connection_id: Uuid) -> Result<Vec<Delivery>> {
        let (room, participant) = self.registry.join(room_id, connection_id).await?;

        tracing::info!(
            "Connection {} joined room {} as {:?}",
            connection_id,
            room_id,
            participant.role
        );

        let mut deliveries = vec![Delivery {
            target: connection_id,
            message: ServerMessage::Welcome {
                room: room_id.to_string(),
                is_initiator: participant.role.is_initiator(),
            },
        }];

        if let Some(peer) = room.peer_of(connection_id).await {
            deliveries.push(Delivery {
                target: peer.connection_id,
                message: ServerMessage::PeerJoined {
                    room: room_id.to_string(),
                },
            });
        }

        Ok(deliveries)
    }

    /// A signaling message from a connected client. Every accepted message
    /// refreshes the room's activity clock, whatever else it does.
    pub async fn handle_message(
        &self,
        connection_id: Uuid,
        message: ClientMessage,
    ) -> Result<Vec<Delivery>> {
        let room_id = message.room().to_string();
        let room = self
            .registry
            .get(&room_id)
            .await
            .ok_or(SignalError::RoomNotFound)?;
        room.touch(Utc::now()).await;

        match message {
            ClientMessage::Join { .. } => match room.peer_of(connection_id).await {
                Some(_) => Ok(vec![Delivery {
                    target: connection_id,
                    message: ServerMessage::PeerJoined { room: room_id },
                }]),
                None => Ok(vec![Self::ack(connection_id)]),
            },
            ClientMessage::Offer { payload, .. } => {
                self.relay_to_peer(
                    &room,
                    connection_id,
                    ServerMessage::Offer {
                        room: room_id,
                        payload,
                        forwarded: true,
                    },
                )
                .await
            }
            ClientMessage::Answer { payload, .. } => {
                self.relay_to_peer(
                    &room,
                    connection_id,
                    ServerMessage::Answer {
                        room: room_id,
                        payload,
                        forwarded: true,
                    },
                )
                .await
            }
            ClientMessage::Candidate { payload, .. } => {
                self.relay_to_peer(
                    &room,
                    connection_id,
                    ServerMessage::Candidate {
                        room: room_id,
                        payload,
                        forwarded: true,
                    },
                )
                .await
            }
            ClientMessage::Leave { .. } => {
                let (removed, peer) = self.registry.leave(&room_id, connection_id).await?;
                tracing::info!("Connection {} left room {}", removed.connection_id, room_id);

                let mut deliveries = vec![Self::ack(connection_id)];
                if let Some(peer) = peer {
                    deliveries.push(Delivery {
                        target: peer.connection_id,
                        message: ServerMessage::PeerLeft { room: room_id },
                    });
                }
                Ok(deliveries)
            }
        }
    }

    /// Transport-level disconnect, synthesized exactly once per connection
    /// by the adapter. Late or duplicate disconnects find no room or no
    /// participant and are quietly absorbed.
    pub async fn disconnect(&self, room_id: &str, connection_id: Uuid) -> Vec<Delivery> {
        match self.registry.leave(room_id, connection_id).await {
            Ok((removed, peer)) => {
                tracing::info!(
                    "Connection {} disconnected from room {}",
                    removed.connection_id,
                    room_id
                );
                peer.map(|peer| Delivery {
                    target: peer.connection_id,
                    message: ServerMessage::PeerLeft {
                        room: room_id.to_string(),
                    },
                })
                .into_iter()
                .collect()
            }
            Err(err) => {
                tracing::debug!(
                    "Disconnect for {} in room {} ignored: {}",
                    connection_id,
                    room_id,
                    err
                );
                Vec::new()
            }
        }
    }

    /// Forwards a relay message to the peer, acknowledging the sender.
    /// With nobody to receive it the payload is meaningless, and dropping
    /// it silently would hide a protocol bug, so the sender hears `no-peer`.
    async fn relay_to_peer(
        &self,
        room: &Room,
        sender: Uuid,
        message: ServerMessage,
    ) -> Result<Vec<Delivery>> {
        let peer = room.peer_of(sender).await.ok_or(SignalError::NoPeer)?;

        tracing::debug!(
            "Relaying from {} to {} in room {}",
            sender,
            peer.connection_id,
            room.id()
        );

        Ok(vec![
            Delivery {
                target: peer.connection_id,
                message,
            },
            Self::ack(sender),
        ])
    }

    fn ack(target: Uuid) -> Delivery {
        Delivery {
            target,
            message: ServerMessage::Ack {
                timestamp: Utc::now().timestamp_millis(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rondo_protocol::decode_client_message;

    fn engine() -> RelayEngine {
        RelayEngine::new(Arc::new(RoomRegistry::new()))
    }

    fn targets(deliveries: &[Delivery]) -> Vec<Uuid> {
        deliveries.iter().map(|d| d.target).collect()
    }

    #[tokio::test]
    async fn first_connect_is_welcomed_as_initiator() {
        let engine = engine();
        let a = Uuid::new_v4();

        let deliveries = engine.connect("lobby", a).await.unwrap();
        assert_eq!(targets(&deliveries), vec![a]);
        match &deliveries[0].message {
            ServerMessage::Welcome { room, is_initiator } => {
                assert_eq!(room, "lobby");
                assert!(*is_initiator);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_connect_pushes_peer_joined_to_the_first() {
        let engine = engine();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        engine.connect("lobby", a).await.unwrap();

        let deliveries = engine.connect("lobby", b).await.unwrap();
        assert_eq!(targets(&deliveries), vec![b, a]);
        match &deliveries[0].message {
            ServerMessage::Welcome { is_initiator, .. } => assert!(!is_initiator),
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(matches!(
            deliveries[1].message,
            ServerMessage::PeerJoined { .. }
        ));
    }

    #[tokio::test]
    async fn third_connect_is_rejected_without_state_change() {
        let engine = engine();
        engine.connect("lobby", Uuid::new_v4()).await.unwrap();
        engine.connect("lobby", Uuid::new_v4()).await.unwrap();

        let err = engine.connect("lobby", Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SignalError::RoomFull));
        assert_eq!(
            engine
                .registry
                .get("lobby")
                .await
                .unwrap()
                .participant_count()
                .await,
            2
        );
    }

    #[tokio::test]
    async fn offer_reaches_the_peer_with_payload_untouched() {
        let engine = engine();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        engine.connect("lobby", a).await.unwrap();
        engine.connect("lobby", b).await.unwrap();

        let message =
            decode_client_message(r#"{"type":"offer","room":"lobby","payload":{"sdp":"v=0 o=-"}}"#)
                .unwrap();
        let deliveries = engine.handle_message(b, message).await.unwrap();

        assert_eq!(deliveries[0].target, a);
        match &deliveries[0].message {
            ServerMessage::Offer {
                payload: Some(payload),
                forwarded,
                ..
            } => {
                assert_eq!(payload.get(), r#"{"sdp":"v=0 o=-"}"#);
                assert!(*forwarded);
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(matches!(deliveries[1].message, ServerMessage::Ack { .. }));
    }

    #[tokio::test]
    async fn relay_without_a_peer_is_a_soft_error() {
        let engine = engine();
        let a = Uuid::new_v4();
        engine.connect("lobby", a).await.unwrap();

        let message = decode_client_message(r#"{"type":"candidate","room":"lobby"}"#).unwrap();
        let err = engine.handle_message(a, message).await.unwrap_err();
        assert!(matches!(err, SignalError::NoPeer));
    }

    #[tokio::test]
    async fn message_to_a_dead_room_reports_room_not_found() {
        let engine = engine();
        let message = decode_client_message(r#"{"type":"join","room":"nowhere"}"#).unwrap();
        let err = engine.handle_message(Uuid::new_v4(), message).await.unwrap_err();
        assert!(matches!(err, SignalError::RoomNotFound));
    }

    #[tokio::test]
    async fn join_message_tells_the_sender_about_an_existing_peer() {
        let engine = engine();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        engine.connect("lobby", a).await.unwrap();

        let message = decode_client_message(r#"{"type":"join","room":"lobby"}"#).unwrap();
        let deliveries = engine.handle_message(a, message.clone()).await.unwrap();
        assert!(matches!(deliveries[0].message, ServerMessage::Ack { .. }));

        engine.connect("lobby", b).await.unwrap();
        let deliveries = engine.handle_message(a, message).await.unwrap();
        assert_eq!(deliveries[0].target, a);
        assert!(matches!(
            deliveries[0].message,
            ServerMessage::PeerJoined { .. }
        ));
    }

    #[tokio::test]
    async fn disconnect_notifies_the_peer_and_empties_the_room() {
        let engine = engine();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        engine.connect("lobby", a).await.unwrap();
        engine.connect("lobby", b).await.unwrap();

        let deliveries = engine.disconnect("lobby", b).await;
        assert_eq!(targets(&deliveries), vec![a]);
        assert!(matches!(
            deliveries[0].message,
            ServerMessage::PeerLeft { .. }
        ));

        let deliveries = engine.disconnect("lobby", a).await;
        assert!(deliveries.is_empty());
        assert_eq!(engine.registry.room_count().await, 0);

        // Duplicate disconnect: the room is gone, nothing crashes.
        let deliveries = engine.disconnect("lobby", a).await;
        assert!(deliveries.is_empty());
    }

    #[tokio::test]
    async fn leave_message_acks_sender_and_notifies_peer() {
        let engine = engine();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        engine.connect("lobby", a).await.unwrap();
        engine.connect("lobby", b).await.unwrap();

        let message = decode_client_message(r#"{"type":"leave","room":"lobby"}"#).unwrap();
        let deliveries = engine.handle_message(b, message).await.unwrap();

        assert_eq!(targets(&deliveries), vec![b, a]);
        assert!(matches!(deliveries[0].message, ServerMessage::Ack { .. }));
        assert!(matches!(
            deliveries[1].message,
            ServerMessage::PeerLeft { .. }
        ));

        // The initiator is still there, so the room survives.
        assert_eq!(engine.registry.room_count().await, 1);
    }
}

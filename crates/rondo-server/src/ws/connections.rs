use rondo_protocol::ServerMessage;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Tracks the outbound half of every live connection so any part of the
/// service can push a message to a peer, not just answer the sender.
/// Senders are unbounded channels: queueing never blocks, so a slow peer
/// only backs up its own queue.
pub struct ConnectionManager {
    senders: RwLock<HashMap<Uuid, mpsc::UnboundedSender<String>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
        }
    }

    pub async fn add_connection(&self, connection_id: Uuid, sender: mpsc::UnboundedSender<String>) {
        self.senders.write().await.insert(connection_id, sender);
        tracing::debug!("Registered connection {}", connection_id);
    }

    pub async fn remove_connection(&self, connection_id: Uuid) {
        self.senders.write().await.remove(&connection_id);
        tracing::debug!("Unregistered connection {}", connection_id);
    }

    pub async fn send_to_connection(&self, connection_id: Uuid, message: &ServerMessage) {
        let json = match serde_json::to_string(message) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!("Failed to serialize message: {}", e);
                return;
            }
        };

        let senders = self.senders.read().await;

        if let Some(sender) = senders.get(&connection_id) {
            if let Err(e) = sender.send(json) {
                tracing::error!("Failed to send message to {}: {}", connection_id, e);
            }
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.senders.read().await.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_reach_only_the_addressed_connection() {
        let manager = ConnectionManager::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        manager.add_connection(a, tx_a).await;
        manager.add_connection(b, tx_b).await;

        manager
            .send_to_connection(a, &ServerMessage::Disconnected)
            .await;

        assert_eq!(rx_a.recv().await.unwrap(), r#"{"type":"disconnected"}"#);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn sending_to_a_removed_connection_is_a_no_op() {
        let manager = ConnectionManager::new();
        let a = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        manager.add_connection(a, tx).await;
        manager.remove_connection(a).await;

        manager
            .send_to_connection(a, &ServerMessage::Disconnected)
            .await;

        assert!(rx.try_recv().is_err());
        assert_eq!(manager.connection_count().await, 0);
    }
}

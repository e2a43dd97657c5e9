use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use rondo_protocol::{decode_client_message, ServerMessage, DEFAULT_ROOM};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::SignalError;
use crate::relay::Delivery;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    room: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let room_id = query
        .room
        .filter(|room| !room.is_empty())
        .unwrap_or_else(|| DEFAULT_ROOM.to_string());
    ws.on_upgrade(move |socket| handle_socket(socket, state, room_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, room_id: String) {
    let (mut sender, mut receiver) = socket.split();
    let connection_id = Uuid::new_v4();

    // Join before registering the outbound pump: a rejected connection is
    // answered directly and never becomes pushable.
    let deliveries = match state.relay.connect(&room_id, connection_id).await {
        Ok(deliveries) => deliveries,
        Err(err) => {
            let _ = sender
                .send(Message::Text(
                    serde_json::to_string(&err.to_message()).unwrap().into(),
                ))
                .await;
            return;
        }
    };

    // Outbound channel for server-push; the pump owns the socket's write
    // half from here on.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.connections.add_connection(connection_id, tx).await;

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    dispatch(&state, deliveries).await;

    let mut graceful = false;
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_text(&state, connection_id, &text).await;
            }
            Ok(Message::Close(_)) => {
                graceful = true;
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("WebSocket error on {}: {}", connection_id, e);
                break;
            }
        }
    }

    // Synthesize the disconnect exactly once, however the loop ended.
    let deliveries = state.relay.disconnect(&room_id, connection_id).await;
    dispatch(&state, deliveries).await;

    if graceful {
        // Close acknowledgment; the close handshake usually still allows a
        // final frame through.
        state
            .connections
            .send_to_connection(connection_id, &ServerMessage::Disconnected)
            .await;
    }

    // Dropping the last sender lets the pump drain the queue and exit.
    state.connections.remove_connection(connection_id).await;
    let _ = send_task.await;

    // Opportunistic sweep alongside the periodic timer.
    state
        .registry
        .evict_idle(Utc::now(), state.config.idle_timeout())
        .await;

    tracing::info!("Connection {} closed (room {})", connection_id, room_id);
}

async fn handle_text(state: &AppState, connection_id: Uuid, text: &str) {
    let message = match decode_client_message(text) {
        Ok(message) => message,
        Err(err) => {
            // A malformed frame still proves the connection is alive, so
            // refresh the room it addressed before rejecting it.
            if let Some(room_id) = err.room() {
                if let Some(room) = state.registry.get(room_id).await {
                    room.touch(Utc::now()).await;
                }
            }
            tracing::warn!("Malformed message from {}: {}", connection_id, err);
            state
                .connections
                .send_to_connection(connection_id, &SignalError::from(err).to_message())
                .await;
            return;
        }
    };

    match state.relay.handle_message(connection_id, message).await {
        Ok(deliveries) => dispatch(state, deliveries).await,
        Err(err) => {
            tracing::debug!("Rejected message from {}: {}", connection_id, err);
            state
                .connections
                .send_to_connection(connection_id, &err.to_message())
                .await;
        }
    }
}

async fn dispatch(state: &AppState, deliveries: Vec<Delivery>) {
    for delivery in deliveries {
        state
            .connections
            .send_to_connection(delivery.target, &delivery.message)
            .await;
    }
}

//! Rondo Signaling Server Library
//!
//! A rendezvous and message-relay service: exactly two endpoints meet in a
//! named room and exchange the offer/answer/candidate handshake needed to
//! open a direct peer connection. This module exposes the server components
//! for testing and embedding.

pub mod api;
pub mod error;
pub mod relay;
pub mod rooms;
pub mod state;
pub mod ws;

use chrono::Utc;

/// Create and configure the server application.
pub fn create_app(config: state::Config) -> (axum::Router, state::AppState) {
    let app_state = state::AppState::new(config);
    let router = api::create_router(app_state.clone());
    (router, app_state)
}

/// Background sweep reclaiming rooms idle past the configured timeout.
pub fn spawn_idle_eviction(state: state::AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.evict_interval());
        loop {
            interval.tick().await;
            let evicted = state
                .registry
                .evict_idle(Utc::now(), state.config.idle_timeout())
                .await;
            if evicted > 0 {
                tracing::info!("Evicted {} idle room(s)", evicted);
            }
        }
    })
}

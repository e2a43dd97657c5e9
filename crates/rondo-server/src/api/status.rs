use crate::state::AppState;
use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub service: &'static str,
    pub status: &'static str,
    pub rooms: usize,
    pub timestamp: i64,
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        service: "rondo-signaling",
        status: "operational",
        rooms: state.registry.room_count().await,
        timestamp: Utc::now().timestamp_millis(),
    })
}

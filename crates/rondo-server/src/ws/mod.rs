//! WebSocket transport: the connection adapter and the push registry.

pub mod connections;
pub mod handler;

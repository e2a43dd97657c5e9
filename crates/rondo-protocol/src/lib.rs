//! Rondo Protocol
//!
//! Wire-level message definitions shared between the rondo signaling server
//! and its clients, plus the lenient decoder the server uses at the
//! transport boundary.

mod codec;
mod messages;

pub use codec::{decode_client_message, DecodeError};
pub use messages::{ClientMessage, ErrorCode, ServerMessage, DEFAULT_ROOM};

use rondo_protocol::{DecodeError, ErrorCode, ServerMessage};
use thiserror::Error;

/// Failures surfaced by the signaling core.
///
/// None of these are fatal to the process: each is answered on the
/// originating connection as a structured wire message and leaves every
/// other room untouched.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Room is full (max 2 users)")]
    RoomFull,

    #[error("Room not found")]
    RoomNotFound,

    #[error("No peer in the room to receive the message")]
    NoPeer,

    #[error("{0}")]
    Malformed(#[from] DecodeError),

    #[error("Unknown participant")]
    NotFound,
}

impl SignalError {
    /// Wire response for the originating connection.
    pub fn to_message(&self) -> ServerMessage {
        let code = match self {
            SignalError::RoomFull => {
                return ServerMessage::RoomFull {
                    message: self.to_string(),
                };
            }
            SignalError::RoomNotFound => ErrorCode::RoomNotFound,
            SignalError::NoPeer => ErrorCode::NoPeer,
            SignalError::Malformed(_) => ErrorCode::MalformedMessage,
            SignalError::NotFound => ErrorCode::NotFound,
        };

        ServerMessage::Error {
            code,
            message: self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SignalError>;

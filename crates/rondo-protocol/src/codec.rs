use serde::Deserialize;
use serde_json::value::RawValue;
use thiserror::Error;

use crate::messages::{ClientMessage, DEFAULT_ROOM};

/// A client message the decoder could not accept.
///
/// Carries the room the envelope addressed whenever that much was readable,
/// so the server can still refresh the room's activity clock: a malformed
/// frame proves the connection is alive.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct DecodeError {
    room: Option<String>,
    reason: String,
}

impl DecodeError {
    fn new(reason: impl Into<String>, room: Option<String>) -> Self {
        Self {
            room,
            reason: reason.into(),
        }
    }

    /// Room the rejected message addressed, if the envelope was readable.
    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }
}

/// Envelope shared by every client message. Unknown extra fields are
/// ignored; only `type`, `room` and `payload` matter to the server.
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    room: Option<String>,
    #[serde(default)]
    payload: Option<Box<RawValue>>,
}

/// Salvage parse used when the envelope itself is rejected, to recover the
/// room id for activity tracking.
#[derive(Deserialize)]
struct RoomHint {
    #[serde(default)]
    room: Option<String>,
}

/// Decodes one inbound text frame into a [`ClientMessage`].
///
/// Any failure, including an unknown `type`, becomes a [`DecodeError`]
/// rather than a serde error: the boundary converts everything unparseable
/// into a single rejected message and the connection lives on.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, DecodeError> {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            let room = serde_json::from_str::<RoomHint>(text)
                .ok()
                .and_then(|hint| hint.room);
            return Err(DecodeError::new(
                format!("Invalid message format: {err}"),
                room,
            ));
        }
    };

    let Envelope {
        kind,
        room,
        payload,
    } = envelope;
    let effective_room = Some(match room.as_deref() {
        Some(room) if !room.is_empty() => room.to_string(),
        _ => DEFAULT_ROOM.to_string(),
    });

    match kind.as_deref() {
        Some("join") => Ok(ClientMessage::Join { room }),
        Some("offer") => Ok(ClientMessage::Offer { room, payload }),
        Some("answer") => Ok(ClientMessage::Answer { room, payload }),
        Some("candidate") => Ok(ClientMessage::Candidate { room, payload }),
        Some("leave") => Ok(ClientMessage::Leave { room }),
        Some(other) => Err(DecodeError::new(
            format!("unknown message type `{other}`"),
            effective_room,
        )),
        None => Err(DecodeError::new("missing message type", effective_room)),
    }
}

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Room id used when a client does not name one. Clients sharing no explicit
/// id land in the same room, so deployments should always supply one.
pub const DEFAULT_ROOM: &str = "default";

/// Messages sent from client to server over the signaling socket.
///
/// Every message may carry a `room` field; it falls back to [`DEFAULT_ROOM`]
/// when absent. Offer/answer/candidate payloads are opaque to the server and
/// relayed byte-for-byte, which is why they are kept as [`RawValue`].
///
/// Decoding happens through [`decode_client_message`](crate::decode_client_message)
/// rather than a serde derive: the decoder turns unknown or unparseable
/// messages into a structured error instead of a bare serde failure.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Announce presence; answered with `peer-joined` when a peer is already
    /// in the room.
    Join {
        #[serde(skip_serializing_if = "Option::is_none")]
        room: Option<String>,
    },

    /// WebRTC session description offer, relayed verbatim to the peer.
    Offer {
        #[serde(skip_serializing_if = "Option::is_none")]
        room: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Box<RawValue>>,
    },

    /// WebRTC session description answer, relayed verbatim to the peer.
    Answer {
        #[serde(skip_serializing_if = "Option::is_none")]
        room: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Box<RawValue>>,
    },

    /// ICE candidate, relayed verbatim to the peer.
    Candidate {
        #[serde(skip_serializing_if = "Option::is_none")]
        room: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Box<RawValue>>,
    },

    /// Leave the room without closing the connection.
    Leave {
        #[serde(skip_serializing_if = "Option::is_none")]
        room: Option<String>,
    },
}

impl ClientMessage {
    /// Room the message addresses. Absent or empty ids fall back to
    /// [`DEFAULT_ROOM`].
    pub fn room(&self) -> &str {
        let room = match self {
            ClientMessage::Join { room }
            | ClientMessage::Offer { room, .. }
            | ClientMessage::Answer { room, .. }
            | ClientMessage::Candidate { room, .. }
            | ClientMessage::Leave { room } => room,
        };
        match room.as_deref() {
            Some(room) if !room.is_empty() => room,
            _ => DEFAULT_ROOM,
        }
    }
}

/// Messages sent from server to client over the signaling socket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Connection accepted into a room.
    Welcome { room: String, is_initiator: bool },

    /// The second participant has arrived.
    PeerJoined { room: String },

    /// The other participant left or disconnected.
    PeerLeft { room: String },

    /// Offer relayed from the peer.
    Offer {
        room: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Box<RawValue>>,
        forwarded: bool,
    },

    /// Answer relayed from the peer.
    Answer {
        room: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Box<RawValue>>,
        forwarded: bool,
    },

    /// ICE candidate relayed from the peer.
    Candidate {
        room: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Box<RawValue>>,
        forwarded: bool,
    },

    /// Message accepted, nothing to relay. Millisecond Unix timestamp.
    Ack { timestamp: i64 },

    /// Close acknowledgment, sent best-effort on graceful shutdown of a
    /// connection.
    Disconnected,

    /// Connection rejected: the room already holds two participants.
    RoomFull { message: String },

    /// Structured error response for the originating connection.
    Error { code: ErrorCode, message: String },
}

/// Error codes carried by [`ServerMessage::Error`].
///
/// All of these are recoverable: the client may retry with a new room id,
/// re-connect, or simply fix the offending message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// The room id does not (or no longer does) name a live room.
    RoomNotFound,
    /// Relay attempted with nobody to receive it.
    NoPeer,
    /// Unparseable or unknown message; only that message is rejected.
    MalformedMessage,
    /// Leave or disconnect for a participant the room does not hold.
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn to_value(message: &ServerMessage) -> Value {
        serde_json::from_str(&serde_json::to_string(message).unwrap()).unwrap()
    }

    #[test]
    fn welcome_uses_camel_case_wire_names() {
        let value = to_value(&ServerMessage::Welcome {
            room: "lobby".to_string(),
            is_initiator: true,
        });
        assert_eq!(
            value,
            json!({"type": "welcome", "room": "lobby", "isInitiator": true})
        );
    }

    #[test]
    fn variant_names_are_kebab_case() {
        let value = to_value(&ServerMessage::PeerJoined {
            room: "lobby".to_string(),
        });
        assert_eq!(value["type"], "peer-joined");

        let value = to_value(&ServerMessage::RoomFull {
            message: "Room is full (max 2 users)".to_string(),
        });
        assert_eq!(value["type"], "room-full");
    }

    #[test]
    fn forwarded_envelope_keeps_payload_bytes() {
        let payload = serde_json::value::RawValue::from_string(
            r#"{"sdp":"v=0","kind":"offer"}"#.to_string(),
        )
        .unwrap();
        let message = ServerMessage::Offer {
            room: "lobby".to_string(),
            payload: Some(payload),
            forwarded: true,
        };
        let text = serde_json::to_string(&message).unwrap();
        assert!(text.contains(r#""payload":{"sdp":"v=0","kind":"offer"}"#));
        assert!(text.contains(r#""forwarded":true"#));
    }

    #[test]
    fn payload_is_omitted_when_absent() {
        let text = serde_json::to_string(&ServerMessage::Candidate {
            room: "lobby".to_string(),
            payload: None,
            forwarded: true,
        })
        .unwrap();
        assert!(!text.contains("payload"));
    }

    #[test]
    fn client_room_falls_back_to_default() {
        let message = ClientMessage::Join { room: None };
        assert_eq!(message.room(), DEFAULT_ROOM);

        let message = ClientMessage::Leave {
            room: Some("lobby".to_string()),
        };
        assert_eq!(message.room(), "lobby");
    }

    #[test]
    fn error_codes_serialize_kebab_case() {
        let value = to_value(&ServerMessage::Error {
            code: ErrorCode::NoPeer,
            message: "no peer in the room to receive the message".to_string(),
        });
        assert_eq!(value["code"], "no-peer");
    }
}

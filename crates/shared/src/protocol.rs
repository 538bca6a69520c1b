//! Message envelopes and payload shapes.
//!
//! Incoming frames are `{"type", "payload", "request_id"}`; outgoing frames
//! mirror that, with `request_id` echoed on acks and errors and omitted on
//! broadcasts. The message-type set is closed: anything else fails to parse
//! and is answered with `invalid_message_format`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, ErrorPayload};
use flipflop_engine::FlipFlopKind;

/// Every message type on the wire, client-to-server and server-to-client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MsgType {
    // Server to client.
    #[serde(rename = "connected")]
    Connected,
    #[serde(rename = "created")]
    RoomCreated,
    #[serde(rename = "joined")]
    JoinedRoom,
    #[serde(rename = "left")]
    LeftRoom,
    #[serde(rename = "player_left")]
    PlayerLeft,
    #[serde(rename = "player_rejoined")]
    PlayerRejoined,
    #[serde(rename = "start")]
    GameStart,
    #[serde(rename = "end")]
    GameEnd,
    #[serde(rename = "chat")]
    Chat,
    #[serde(rename = "rematch_requested")]
    RematchRequested,
    #[serde(rename = "rematch_cancelled")]
    RematchCancelled,
    #[serde(rename = "ack")]
    Ack,
    #[serde(rename = "error")]
    Error,

    // Client to server.
    #[serde(rename = "create")]
    CreateRoom,
    #[serde(rename = "join")]
    JoinRoom,
    #[serde(rename = "leave")]
    LeaveRoom,
    #[serde(rename = "forfeit")]
    Forfeit,
    #[serde(rename = "message")]
    SendMessage,
    #[serde(rename = "rematch")]
    Rematch,
    #[serde(rename = "cancel_rematch")]
    CancelRematch,

    // Both directions: a move request and the move broadcast; a state
    // request and the state reply.
    #[serde(rename = "move")]
    Move,
    #[serde(rename = "game_state")]
    GameState,
}

/// An envelope received from a client.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(rename = "type")]
    pub msg_type: MsgType,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl IncomingMessage {
    /// Envelope-level validation: the request id is required and must be a
    /// UUID.
    pub fn validate(&self) -> Result<(), Vec<ValidationErrorDto>> {
        let mut errors = Vec::new();
        match self.request_id.as_deref() {
            None | Some("") => errors.push(ValidationErrorDto::new(
                "request_id",
                "This field is required",
            )),
            Some(id) if Uuid::parse_str(id).is_err() => {
                errors.push(ValidationErrorDto::new("request_id", "Must be a valid UUID"))
            }
            _ => {}
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// An envelope sent to a client.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMessage {
    #[serde(rename = "type")]
    pub msg_type: MsgType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl OutgoingMessage {
    /// Build an envelope; broadcasts pass `None` for the request id.
    pub fn new(
        msg_type: MsgType,
        payload: impl Serialize,
        request_id: Option<String>,
    ) -> OutgoingMessage {
        OutgoingMessage {
            msg_type,
            payload: serde_json::to_value(payload).ok().filter(|v| !v.is_null()),
            request_id,
        }
    }

    pub fn error(err: AppError, request_id: Option<String>) -> OutgoingMessage {
        OutgoingMessage::new(MsgType::Error, ErrorPayload::new(err), request_id)
    }

    pub fn error_with_details(
        err: AppError,
        details: Value,
        request_id: Option<String>,
    ) -> OutgoingMessage {
        OutgoingMessage::new(
            MsgType::Error,
            ErrorPayload::with_details(err, details),
            request_id,
        )
    }

    /// Serialize once; callers fan the text out to every connection.
    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// One field-level validation failure, in the shape the original validator
/// reported them.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationErrorDto {
    pub field: &'static str,
    pub error: String,
}

impl ValidationErrorDto {
    pub fn new(field: &'static str, error: impl Into<String>) -> ValidationErrorDto {
        ValidationErrorDto {
            field,
            error: error.into(),
        }
    }
}

fn validation_details(errors: Vec<ValidationErrorDto>) -> Value {
    serde_json::to_value(errors).unwrap_or(Value::Null)
}

/// The supported game variants, by wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameType {
    #[serde(rename = "flipflop3x3")]
    Flipflop3x3,
    #[serde(rename = "flipflop5x5")]
    Flipflop5x5,
}

impl GameType {
    pub fn kind(self) -> FlipFlopKind {
        match self {
            GameType::Flipflop3x3 => FlipFlopKind::FlipFlop3x3,
            GameType::Flipflop5x5 => FlipFlopKind::FlipFlop5x5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    #[serde(rename = "singleplayer")]
    Singleplayer,
    #[serde(rename = "multiplayer")]
    Multiplayer,
}

/// Payload of a `create` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomPayload {
    pub game_type: GameType,
    pub game_mode: GameMode,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_difficulty: Option<String>,
}

impl CreateRoomPayload {
    pub fn validate(&self) -> Result<(), Value> {
        let mut errors = Vec::new();
        check_length("username", &self.username, 2, 20, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(validation_details(errors))
        }
    }
}

/// Payload of a `join` request. The username may be absent: reconnecting
/// players are recognized by client id and keep their original name, and
/// the room itself rejects new players without one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRoomPayload {
    pub room_id: String,
    #[serde(default)]
    pub username: String,
}

impl JoinRoomPayload {
    pub fn validate(&self) -> Result<(), Value> {
        let mut errors = Vec::new();
        if self.room_id.len() != 4 || !self.room_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            errors.push(ValidationErrorDto::new(
                "room_id",
                "Must be exactly 4 alphanumeric characters",
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(validation_details(errors))
        }
    }
}

/// Payload of a `message` (chat) request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPayload {
    pub content: String,
}

impl ChatPayload {
    pub fn validate(&self) -> Result<(), Value> {
        let mut errors = Vec::new();
        check_length("content", &self.content, 1, 1000, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(validation_details(errors))
        }
    }
}

fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
    errors: &mut Vec<ValidationErrorDto>,
) {
    let len = value.chars().count();
    if len < min {
        errors.push(ValidationErrorDto::new(
            field,
            format!("Minimum length is {min}"),
        ));
    } else if len > max {
        errors.push(ValidationErrorDto::new(
            field,
            format!("Maximum length is {max}"),
        ));
    }
}

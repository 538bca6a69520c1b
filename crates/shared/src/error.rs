//! Application error codes surfaced to clients.
//!
//! Every failure a client can observe is one of these codes, sent as an
//! `error` envelope with the originating request id when one was parsed.
//! The strings are stable identifiers, not prose; `code()` is the single
//! source of truth and `Display` delegates to it.

use flipflop_engine::EngineError;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// The closed set of client-visible errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppError {
    ValidationFailed,
    InvalidMessageFormat,
    InvalidMsgType,
    AlreadyInGame,
    NotInGame,
    RoomNotFound,
    RoomFull,
    RoomClosed,
    GameNotStarted,
    GameEnded,
    GameNotEnded,
    NotYourTurn,
    IllegalMove,
    ClientNotFound,
    UsernameRequired,
    UnauthorizedAction,
    IdGenerationFailed,
    InvalidAiDifficulty,
}

impl AppError {
    /// The stable wire identifier for this error.
    pub fn code(self) -> &'static str {
        match self {
            AppError::ValidationFailed => "validation_failed",
            AppError::InvalidMessageFormat => "invalid_message_format",
            AppError::InvalidMsgType => "invalid_msg_type",
            AppError::AlreadyInGame => "already_in_game",
            AppError::NotInGame => "must_join_game_first",
            AppError::RoomNotFound => "room_not_found",
            AppError::RoomFull => "room_full",
            AppError::RoomClosed => "room_closed",
            AppError::GameNotStarted => "game_not_started",
            AppError::GameEnded => "game_ended",
            AppError::GameNotEnded => "game_not_ended",
            AppError::NotYourTurn => "not_your_turn",
            AppError::IllegalMove => "illegal_move",
            AppError::ClientNotFound => "client_not_found",
            AppError::UsernameRequired => "username_required",
            AppError::UnauthorizedAction => "unauthorized_action",
            AppError::IdGenerationFailed => "id_generation_failed",
            AppError::InvalidAiDifficulty => "invalid_ai_difficulty",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::error::Error for AppError {}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> AppError {
        match err {
            EngineError::IllegalMove => AppError::IllegalMove,
            EngineError::GameEnded => AppError::GameEnded,
            EngineError::InvalidMoveFormat => AppError::InvalidMessageFormat,
            EngineError::NotYourTurn => AppError::NotYourTurn,
        }
    }
}

/// The wire shape of an `error` envelope payload.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorPayload {
    pub fn new(err: AppError) -> ErrorPayload {
        ErrorPayload {
            code: err.code(),
            details: None,
        }
    }

    pub fn with_details(err: AppError, details: Value) -> ErrorPayload {
        ErrorPayload {
            code: err.code(),
            details: Some(details),
        }
    }
}

//! Error types for the FlipFlop engine.

use thiserror::Error;

/// Errors produced by engine operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// The move violates the rules in the current position.
    #[error("illegal move")]
    IllegalMove,

    /// The game has already ended; no further moves are accepted.
    #[error("game has already ended")]
    GameEnded,

    /// The move payload could not be parsed into two board squares.
    #[error("invalid move format")]
    InvalidMoveFormat,

    /// A search was started for the side that is not to move.
    #[error("not this side's turn")]
    NotYourTurn,
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

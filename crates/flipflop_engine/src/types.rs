//! Core types shared across the engine.
//!
//! Pieces are arena-allocated: the [`FlipFlop`](crate::game::FlipFlop)
//! struct owns a `Vec<Piece>` and everything else (board cells, player piece
//! lists, move records) refers to pieces by [`PieceId`]. Captured pieces are
//! flagged rather than removed so the undo stack can restore them, and ids
//! stay stable for the lifetime of a game.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Stable index into the game's piece arena.
pub type PieceId = usize;

/// The two sides of a game. White moves first and starts on the bottom rank.
///
/// Sides travel the wire as integer codes (`0` = White, `1` = Black), the
/// format the original frontend expects, so serde impls are written by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerSide {
    White,
    Black,
}

impl PlayerSide {
    pub fn opponent(self) -> PlayerSide {
        match self {
            PlayerSide::White => PlayerSide::Black,
            PlayerSide::Black => PlayerSide::White,
        }
    }

    /// Wire code for this side.
    pub fn code(self) -> u8 {
        match self {
            PlayerSide::White => 0,
            PlayerSide::Black => 1,
        }
    }

    pub fn from_code(code: u8) -> Option<PlayerSide> {
        match code {
            0 => Some(PlayerSide::White),
            1 => Some(PlayerSide::Black),
            _ => None,
        }
    }
}

impl fmt::Display for PlayerSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerSide::White => write!(f, "White"),
            PlayerSide::Black => write!(f, "Black"),
        }
    }
}

impl Serialize for PlayerSide {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for PlayerSide {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        PlayerSide::from_code(code)
            .ok_or_else(|| de::Error::custom(format!("invalid player side code: {code}")))
    }
}

/// Serde helper for optional winners: `None` is `-1` on the wire.
///
/// Usage: `#[serde(with = "winner_repr")]` on an `Option<PlayerSide>` field.
pub mod winner_repr {
    use super::PlayerSide;
    use serde::de::{self, Deserializer};
    use serde::{Deserialize, Serializer};

    pub fn serialize<S: Serializer>(
        winner: &Option<PlayerSide>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match winner {
            Some(side) => serializer.serialize_i8(side.code() as i8),
            None => serializer.serialize_i8(-1),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<PlayerSide>, D::Error> {
        match i8::deserialize(deserializer)? {
            -1 => Ok(None),
            code => PlayerSide::from_code(code as u8)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid winner code: {code}"))),
        }
    }
}

/// The movement mode a piece is currently in. Pieces flip after every move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceSide {
    /// Moves along ranks and files.
    Rook,
    /// Moves along diagonals.
    Bishop,
}

impl PieceSide {
    pub fn flipped(self) -> PieceSide {
        match self {
            PieceSide::Rook => PieceSide::Bishop,
            PieceSide::Bishop => PieceSide::Rook,
        }
    }
}

/// The two supported board sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipFlopKind {
    FlipFlop3x3,
    FlipFlop5x5,
}

impl FlipFlopKind {
    pub fn board_size(self) -> usize {
        match self {
            FlipFlopKind::FlipFlop3x3 => 3,
            FlipFlopKind::FlipFlop5x5 => 5,
        }
    }
}

/// A board cell. Row 0 is the top rank in internal storage; the algebraic
/// codec numbers ranks from the bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square {
    pub row: usize,
    pub col: usize,
}

impl Square {
    pub fn new(row: usize, col: usize) -> Square {
        Square { row, col }
    }
}

/// A single piece in the arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub color: PlayerSide,
    pub side: PieceSide,
    pub pos: Square,
    pub captured: bool,
}

/// One legal `(from, to)` pair produced by move generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidMove {
    pub from: Square,
    pub to: Square,
}

/// Per-player state: the fixed goal square, the owned pieces, and the cached
/// legal-move list for validation of the next incoming move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerState {
    pub color: PlayerSide,
    pub goal: Square,
    pub pieces: Vec<PieceId>,
    pub valid_moves: Vec<ValidMove>,
}

/// The wire form of a move: two algebraic squares such as `"A1"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseMove {
    pub from: String,
    pub to: String,
}

/// One entry of the numbered move history, notation `FROM-TO`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveHistoryEntry {
    pub move_number: usize,
    pub player: PlayerSide,
    pub notation: String,
}

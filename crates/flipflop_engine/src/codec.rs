//! Algebraic square codec and board-key characters.
//!
//! Squares are written as a column letter followed by a rank digit (`"A1"`
//! is the bottom-left corner). Internal storage puts row 0 at the top, so
//! parsing flips the rank.
//!
//! Board keys are fen-like strings produced by
//! [`FlipFlop::board_string`](crate::game::FlipFlop::board_string): a
//! row-major walk emitting one character per cell (`o` empty, `a` black
//! rook, `b` black bishop, `x` white rook, `y` white bishop), rows separated
//! by `/`, with a trailing `1` (White to move) or `2` (Black). The key is
//! the sole basis for threefold-repetition detection, which is why the
//! side-to-move marker is mandatory.

use crate::error::{EngineError, EngineResult};
use crate::types::{PieceSide, PlayerSide, Square};

/// Parse an algebraic square like `"B2"` into internal coordinates.
pub fn parse_square(s: &str, board_size: usize) -> EngineResult<Square> {
    let bytes = s.as_bytes();
    if bytes.len() != 2 {
        return Err(EngineError::IllegalMove);
    }

    let col = bytes[0].wrapping_sub(b'A') as usize;
    let rank = bytes[1].wrapping_sub(b'1') as usize;
    if col >= board_size || rank >= board_size {
        return Err(EngineError::IllegalMove);
    }

    Ok(Square::new(board_size - 1 - rank, col))
}

/// Format internal coordinates back into algebraic form.
pub fn format_square(sq: Square, board_size: usize) -> String {
    format!("{}{}", (b'A' + sq.col as u8) as char, board_size - sq.row)
}

/// The board-key character for a piece.
pub fn piece_char(color: PlayerSide, side: PieceSide) -> char {
    match (color, side) {
        (PlayerSide::Black, PieceSide::Rook) => 'a',
        (PlayerSide::Black, PieceSide::Bishop) => 'b',
        (PlayerSide::White, PieceSide::Rook) => 'x',
        (PlayerSide::White, PieceSide::Bishop) => 'y',
    }
}

/// The board-key character for the side to move.
pub fn turn_char(turn: PlayerSide) -> char {
    match turn {
        PlayerSide::White => '1',
        PlayerSide::Black => '2',
    }
}

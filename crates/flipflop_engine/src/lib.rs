//! FlipFlop game engine.
//!
//! FlipFlop is a two-player abstract game played on a 3x3 or 5x5 board.
//! Every piece starts as a rook and toggles between rook and bishop movement
//! after each of its moves. Each player owns the middle square of their own
//! back rank (the goal square); leaving an enemy piece on your goal at the
//! end of your turn loses the game, stalemating the opponent wins it, and
//! the third repetition of a position (including side to move) is a draw.
//!
//! The crate provides:
//! - [`FlipFlop`]: authoritative rules, move generation, a reversible move
//!   stack, and terminal-state detection.
//! - [`codec`]: the algebraic square codec and the compact board-key
//!   encoding used for repetition detection.
//! - [`FlipFlopAi`]: a depth-limited minimax opponent with cooperative
//!   cancellation, driven off the engine's undo stack.

pub mod cancel;
pub mod codec;
pub mod error;
pub mod evaluation;
pub mod game;
pub mod move_gen;
pub mod search;
pub mod types;

pub use cancel::CancelToken;
pub use error::{EngineError, EngineResult};
pub use game::FlipFlop;
pub use search::{ai_display_name, AiDifficulty, FlipFlopAi, UnknownDifficulty};
pub use types::{
    BaseMove, FlipFlopKind, MoveHistoryEntry, PieceSide, PlayerSide, Square, ValidMove,
};

//! Depth-limited minimax over the engine's undo stack.
//!
//! The search is deliberately plain: no alpha-beta, no move ordering, no
//! transposition table. FlipFlop boards are small enough that depth 6 is
//! still interactive, and the simple shape keeps cancellation semantics
//! obvious: the token is polled on entry to every node, and a cancelled
//! search degrades to a static evaluation so partial results stay
//! well-defined.
//!
//! Moves are applied to the game and undone afterwards, which is why the
//! caller hands over `&mut FlipFlop`. Rooms pass a clone of their engine so
//! the live game never leaves the room lock.

use std::str::FromStr;

use rand::seq::SliceRandom;
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::codec::format_square;
use crate::error::{EngineError, EngineResult};
use crate::evaluation::{evaluate, MAX_SCORE};
use crate::game::FlipFlop;
use crate::move_gen::generate_moves;
use crate::types::{BaseMove, PlayerSide, ValidMove};

/// Search depth presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiDifficulty {
    Easy,
    Medium,
    Hard,
}

impl AiDifficulty {
    pub fn depth(self) -> u32 {
        match self {
            AiDifficulty::Easy => 2,
            AiDifficulty::Medium => 4,
            AiDifficulty::Hard => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AiDifficulty::Easy => "easy",
            AiDifficulty::Medium => "medium",
            AiDifficulty::Hard => "hard",
        }
    }
}

impl Default for AiDifficulty {
    fn default() -> Self {
        AiDifficulty::Medium
    }
}

/// Error returned when a difficulty string is not in the supported set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown AI difficulty: {0}")]
pub struct UnknownDifficulty(pub String);

impl FromStr for AiDifficulty {
    type Err = UnknownDifficulty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(AiDifficulty::Easy),
            "medium" => Ok(AiDifficulty::Medium),
            "hard" => Ok(AiDifficulty::Hard),
            other => Err(UnknownDifficulty(other.to_owned())),
        }
    }
}

const AI_NAMES: &[&str] = &[
    "Iota", "Alpha", "Beta", "Gamma", "Delta", "Zeta", "Eta", "Theta", "Epsilon", "Sigma",
    "Lambda", "Omega",
];

/// A random display name for an AI player slot.
pub fn ai_display_name() -> String {
    let name = AI_NAMES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Iota");
    format!("{name} (AI)")
}

/// The minimax opponent. Holds only its difficulty; every search runs
/// against the game the caller provides.
#[derive(Debug, Clone)]
pub struct FlipFlopAi {
    difficulty: AiDifficulty,
}

impl FlipFlopAi {
    pub fn new(difficulty: AiDifficulty) -> FlipFlopAi {
        FlipFlopAi { difficulty }
    }

    pub fn difficulty(&self) -> AiDifficulty {
        self.difficulty
    }

    /// Find the best move for `ai_side`, which must be the side to move.
    ///
    /// Returns `Ok(None)` when there is no legal move at the root; callers
    /// treat that as a forfeit. When the token is cancelled mid-search the
    /// best move found so far is returned.
    pub fn find_best_move(
        &self,
        game: &mut FlipFlop,
        ai_side: PlayerSide,
        cancel: &CancelToken,
    ) -> EngineResult<Option<BaseMove>> {
        if game.current_turn() != ai_side {
            return Err(EngineError::NotYourTurn);
        }

        let mut moves = generate_moves(game, ai_side);
        if game.in_check(ai_side) {
            moves = filter_safe_moves(game, moves, ai_side);
        }
        if moves.is_empty() {
            return Ok(None);
        }

        let depth = self.difficulty.depth();
        let mut best_move = to_base_move(game, moves[0]);
        let mut best_score = -MAX_SCORE;

        for candidate in moves {
            if cancel.is_cancelled() {
                return Ok(Some(best_move));
            }

            let mv = to_base_move(game, candidate);
            game.apply_move(&mv)?;
            let score = minimax(game, ai_side, depth - 1, cancel);
            game.undo_last_move();

            if score > best_score {
                best_score = score;
                best_move = mv;
            }
        }

        Ok(Some(best_move))
    }
}

fn to_base_move(game: &FlipFlop, mv: ValidMove) -> BaseMove {
    let size = game.board_size();
    BaseMove {
        from: format_square(mv.from, size),
        to: format_square(mv.to, size),
    }
}

/// Drop moves that leave `side` still in check afterwards (try and undo).
fn filter_safe_moves(game: &mut FlipFlop, moves: Vec<ValidMove>, side: PlayerSide) -> Vec<ValidMove> {
    let mut safe = Vec::with_capacity(moves.len());
    for mv in moves {
        if game.apply_move(&to_base_move(game, mv)).is_err() {
            continue;
        }
        let still_in_check = game.in_check(side);
        game.undo_last_move();

        if !still_in_check {
            safe.push(mv);
        }
    }
    safe
}

fn minimax(game: &mut FlipFlop, ai_side: PlayerSide, depth: u32, cancel: &CancelToken) -> i32 {
    if cancel.is_cancelled() {
        return evaluate(game, ai_side);
    }

    if depth == 0 || game.is_game_ended() {
        return evaluate(game, ai_side);
    }

    if game.current_turn() == ai_side {
        let mut moves = generate_moves(game, ai_side);
        if game.in_check(ai_side) {
            moves = filter_safe_moves(game, moves, ai_side);
        }
        if moves.is_empty() {
            return -MAX_SCORE;
        }

        let mut best = -MAX_SCORE;
        for mv in moves {
            if game.apply_move(&to_base_move(game, mv)).is_err() {
                continue;
            }
            let score = minimax(game, ai_side, depth - 1, cancel);
            game.undo_last_move();
            best = best.max(score);
        }
        best
    } else {
        let opponent = ai_side.opponent();
        let mut best = MAX_SCORE;
        for mv in generate_moves(game, opponent) {
            if game.apply_move(&to_base_move(game, mv)).is_err() {
                continue;
            }
            let score = minimax(game, ai_side, depth - 1, cancel);
            game.undo_last_move();
            best = best.min(score);
        }
        best
    }
}

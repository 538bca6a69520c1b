//! Static evaluation for the minimax opponent.
//!
//! Scores are from the AI's point of view. Terminal positions dominate
//! everything at `±MAX_SCORE`; a position where the opponent is already in
//! check or out of moves is worth half of that; otherwise the score is a
//! weighted sum of mobility, moves threatening the enemy goal, and surviving
//! pieces.

use crate::game::FlipFlop;
use crate::move_gen::generate_moves;
use crate::types::{PlayerSide, Square, ValidMove};

/// Score of a won (or lost, negated) position.
pub const MAX_SCORE: i32 = 1_000_000;

const MOBILITY_WEIGHT: i32 = 100;
const WINNING_MOVE_WEIGHT: i32 = 1_000;
const PIECE_WEIGHT: i32 = 500;

/// Count moves whose destination is the given goal square.
fn count_winning_moves(moves: &[ValidMove], goal: Square) -> i32 {
    moves.iter().filter(|m| m.to == goal).count() as i32
}

/// Evaluate the current position for `ai_side`.
pub fn evaluate(game: &FlipFlop, ai_side: PlayerSide) -> i32 {
    let opponent = ai_side.opponent();

    if game.is_game_ended() {
        return match game.winner() {
            Some(winner) if winner == ai_side => MAX_SCORE,
            Some(_) => -MAX_SCORE,
            None => 0,
        };
    }

    // An opponent in check, or one with no reply, is nearly lost.
    if game.in_check(opponent) {
        return MAX_SCORE / 2;
    }

    let opponent_moves = generate_moves(game, opponent);
    if opponent_moves.is_empty() {
        return MAX_SCORE / 2;
    }

    let ai_moves = generate_moves(game, ai_side);

    let mut score = 0;
    score += ai_moves.len() as i32 * MOBILITY_WEIGHT;
    score -= opponent_moves.len() as i32 * MOBILITY_WEIGHT;

    score += count_winning_moves(&ai_moves, game.goal(opponent)) * WINNING_MOVE_WEIGHT;
    score -= count_winning_moves(&opponent_moves, game.goal(ai_side)) * WINNING_MOVE_WEIGHT;

    score += game.non_captured_count(ai_side) as i32 * PIECE_WEIGHT;
    score -= game.non_captured_count(opponent) as i32 * PIECE_WEIGHT;

    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BaseMove, FlipFlopKind};

    #[test]
    fn won_position_scores_max() {
        let mut game = FlipFlop::new(FlipFlopKind::FlipFlop3x3);
        // White walks into check and ignores it; Black wins.
        for (from, to) in [("A1", "A2"), ("B3", "B1"), ("C1", "C2")] {
            game.apply_move(&BaseMove {
                from: from.into(),
                to: to.into(),
            })
            .unwrap();
        }
        assert_eq!(game.winner(), Some(PlayerSide::Black));

        assert_eq!(evaluate(&game, PlayerSide::Black), MAX_SCORE);
        assert_eq!(evaluate(&game, PlayerSide::White), -MAX_SCORE);
    }

    #[test]
    fn opponent_in_check_scores_half_max() {
        let mut game = FlipFlop::new(FlipFlopKind::FlipFlop3x3);
        // Black captures into White's goal: White is in check, so from
        // Black's viewpoint the position is nearly won.
        for (from, to) in [("A1", "A2"), ("B3", "B1")] {
            game.apply_move(&BaseMove {
                from: from.into(),
                to: to.into(),
            })
            .unwrap();
        }
        assert!(game.in_check(PlayerSide::White));

        assert_eq!(evaluate(&game, PlayerSide::Black), MAX_SCORE / 2);
    }

    #[test]
    fn symmetric_position_scores_zero() {
        let game = FlipFlop::new(FlipFlopKind::FlipFlop3x3);
        // The initial position is mirror symmetric, including each side's
        // single capture-at-goal threat.
        assert_eq!(evaluate(&game, PlayerSide::Black), 0);
        assert_eq!(evaluate(&game, PlayerSide::White), 0);
    }

    #[test]
    fn material_and_mobility_favor_the_stronger_side() {
        use crate::types::{PieceSide, Square};
        // Lone white rook in the open vs nothing threatening: White has
        // strictly more moves and pieces than... a cornered black bishop.
        let game = FlipFlop::with_position(
            FlipFlopKind::FlipFlop3x3,
            &[
                (PlayerSide::White, PieceSide::Rook, Square::new(1, 1)),
                (PlayerSide::Black, PieceSide::Bishop, Square::new(0, 0)),
            ],
            PlayerSide::White,
        );

        assert!(evaluate(&game, PlayerSide::White) > 0);
        assert!(evaluate(&game, PlayerSide::Black) < 0);
    }
}

//! Move generation.
//!
//! Pieces slide along rays: rooks on the four cardinal directions, bishops
//! on the four diagonals. An empty square is a destination and the ray
//! continues past it. A ray stops at the first occupied square; that square
//! is additionally a destination iff it is a goal square held by the
//! opposite color (the capture-at-goal rule, the only capture in the game).

use crate::game::FlipFlop;
use crate::types::{PieceSide, PlayerSide, Square, ValidMove};

pub(crate) const ROOK_DIRECTIONS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
pub(crate) const BISHOP_DIRECTIONS: [(i32, i32); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];

/// Generate all legal moves for `side` in the current position.
pub fn generate_moves(game: &FlipFlop, side: PlayerSide) -> Vec<ValidMove> {
    let size = game.board_size() as i32;
    let mut moves = Vec::new();

    for &piece_id in game.player(side).pieces.iter() {
        let piece = game.piece(piece_id);
        if piece.captured {
            continue;
        }

        let directions = match piece.side {
            PieceSide::Rook => &ROOK_DIRECTIONS,
            PieceSide::Bishop => &BISHOP_DIRECTIONS,
        };

        for &(dr, dc) in directions {
            let mut row = piece.pos.row as i32;
            let mut col = piece.pos.col as i32;
            loop {
                row += dr;
                col += dc;
                if row < 0 || row >= size || col < 0 || col >= size {
                    break;
                }

                let to = Square::new(row as usize, col as usize);
                match game.piece_at(to) {
                    Some(occupant) => {
                        // Blocked. The square is still a destination when it
                        // is a goal square held by the other color.
                        if game.is_goal_square(to) && occupant.color != piece.color {
                            moves.push(ValidMove {
                                from: piece.pos,
                                to,
                            });
                        }
                        break;
                    }
                    None => {
                        moves.push(ValidMove {
                            from: piece.pos,
                            to,
                        });
                    }
                }
            }
        }
    }

    moves
}

//! The authoritative game state and its reversible move stack.

use std::collections::HashMap;

use crate::codec::{format_square, parse_square, piece_char, turn_char};
use crate::error::{EngineError, EngineResult};
use crate::move_gen::generate_moves;
use crate::types::{
    BaseMove, FlipFlopKind, MoveHistoryEntry, Piece, PieceId, PieceSide, PlayerSide, PlayerState,
    Square, ValidMove,
};

/// Snapshot taken before a move is applied, sufficient to restore the prior
/// state exactly. One record is pushed per applied move and popped on undo;
/// the AI search winds and unwinds this stack.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MoveRecord {
    from: Square,
    to: Square,
    moved_piece: PieceId,
    captured_piece: Option<PieceId>,
    turn: PlayerSide,
    game_ended: bool,
    winner: Option<PlayerSide>,
    white_valid_moves: Vec<ValidMove>,
    black_valid_moves: Vec<ValidMove>,
}

/// A FlipFlop game.
///
/// Pieces live in an arena (`pieces`); the board grid and the player piece
/// lists hold [`PieceId`]s. A cell holds at most one non-captured piece and
/// captured pieces stay in the arena, flagged, so undo can resurrect them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlipFlop {
    kind: FlipFlopKind,
    pieces: Vec<Piece>,
    board: Vec<Vec<Option<PieceId>>>,
    white: PlayerState,
    black: PlayerState,
    current_turn: PlayerSide,
    game_ended: bool,
    winner: Option<PlayerSide>,
    position_counts: HashMap<String, u32>,
    board_history: Vec<String>,
    move_records: Vec<MoveRecord>,
}

impl FlipFlop {
    /// Set up the initial position: both back ranks filled with rooks,
    /// White to move. Goal squares are the middle cells of each player's own
    /// back rank.
    pub fn new(kind: FlipFlopKind) -> FlipFlop {
        let size = kind.board_size();
        let white_goal = Square::new(size - 1, size / 2);
        let black_goal = Square::new(0, size / 2);

        let mut game = FlipFlop {
            kind,
            pieces: Vec::with_capacity(size * 2),
            board: vec![vec![None; size]; size],
            white: PlayerState {
                color: PlayerSide::White,
                goal: white_goal,
                pieces: Vec::with_capacity(size),
                valid_moves: Vec::new(),
            },
            black: PlayerState {
                color: PlayerSide::Black,
                goal: black_goal,
                pieces: Vec::with_capacity(size),
                valid_moves: Vec::new(),
            },
            current_turn: PlayerSide::White,
            game_ended: false,
            winner: None,
            position_counts: HashMap::new(),
            board_history: Vec::new(),
            move_records: Vec::new(),
        };

        for col in 0..size {
            game.add_piece(PlayerSide::Black, Square::new(0, col));
            game.add_piece(PlayerSide::White, Square::new(size - 1, col));
        }

        game.white.valid_moves = generate_moves(&game, PlayerSide::White);

        let initial = game.encode_state();
        game.position_counts.insert(initial.clone(), 1);
        game.board_history.push(initial);

        game
    }

    fn add_piece(&mut self, color: PlayerSide, pos: Square) {
        let id = self.pieces.len();
        self.pieces.push(Piece {
            color,
            side: PieceSide::Rook,
            pos,
            captured: false,
        });
        self.board[pos.row][pos.col] = Some(id);
        match color {
            PlayerSide::White => self.white.pieces.push(id),
            PlayerSide::Black => self.black.pieces.push(id),
        }
    }

    pub fn board_size(&self) -> usize {
        self.kind.board_size()
    }

    pub fn kind(&self) -> FlipFlopKind {
        self.kind
    }

    pub fn current_turn(&self) -> PlayerSide {
        self.current_turn
    }

    pub fn is_game_ended(&self) -> bool {
        self.game_ended
    }

    pub fn winner(&self) -> Option<PlayerSide> {
        self.winner
    }

    /// The key of the current position, i.e. the latest history entry.
    pub fn board_string(&self) -> &str {
        self.board_history
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn player(&self, side: PlayerSide) -> &PlayerState {
        match side {
            PlayerSide::White => &self.white,
            PlayerSide::Black => &self.black,
        }
    }

    fn player_mut(&mut self, side: PlayerSide) -> &mut PlayerState {
        match side {
            PlayerSide::White => &mut self.white,
            PlayerSide::Black => &mut self.black,
        }
    }

    pub(crate) fn piece(&self, id: PieceId) -> &Piece {
        &self.pieces[id]
    }

    /// The non-captured piece on a cell, if any.
    pub fn piece_at(&self, sq: Square) -> Option<&Piece> {
        self.board[sq.row][sq.col].map(|id| &self.pieces[id])
    }

    pub fn goal(&self, side: PlayerSide) -> Square {
        self.player(side).goal
    }

    pub fn is_goal_square(&self, sq: Square) -> bool {
        sq == self.white.goal || sq == self.black.goal
    }

    /// A side is in check when an enemy piece sits on its goal square. The
    /// side then has one move to clear it before losing.
    pub fn in_check(&self, side: PlayerSide) -> bool {
        self.piece_at(self.goal(side))
            .is_some_and(|piece| piece.color != side)
    }

    pub fn non_captured_count(&self, side: PlayerSide) -> usize {
        self.player(side)
            .pieces
            .iter()
            .filter(|&&id| !self.pieces[id].captured)
            .count()
    }

    /// The cached legal moves for a side. The cache for the side to move is
    /// always fresh: it is regenerated after every applied move.
    pub fn cached_moves(&self, side: PlayerSide) -> &[ValidMove] {
        &self.player(side).valid_moves
    }

    /// Encode the current position into its board key.
    fn encode_state(&self) -> String {
        let size = self.board_size();
        let mut key = String::with_capacity(size * (size + 1));
        for (row_idx, row) in self.board.iter().enumerate() {
            for cell in row {
                match cell {
                    Some(id) => {
                        let piece = &self.pieces[*id];
                        key.push(piece_char(piece.color, piece.side));
                    }
                    None => key.push('o'),
                }
            }
            if row_idx < size - 1 {
                key.push('/');
            }
        }
        key.push(turn_char(self.current_turn));
        key
    }

    /// Validate and apply a move for the side to move.
    ///
    /// On success the moved piece has flipped sides, the turn has toggled,
    /// the new position is recorded in the history, the opponent's move
    /// cache has been refreshed, and terminal conditions have been checked
    /// in order: goal occupation, opponent stalemate, threefold repetition.
    pub fn apply_move(&mut self, mv: &BaseMove) -> EngineResult<()> {
        if self.game_ended {
            return Err(EngineError::GameEnded);
        }

        let mover = self.current_turn;
        let opponent = mover.opponent();
        let size = self.board_size();

        let from = parse_square(&mv.from.to_uppercase(), size)
            .map_err(|_| EngineError::InvalidMoveFormat)?;
        let to =
            parse_square(&mv.to.to_uppercase(), size).map_err(|_| EngineError::InvalidMoveFormat)?;

        let piece_id = match self.board[from.row][from.col] {
            Some(id) if self.pieces[id].color == mover => id,
            _ => return Err(EngineError::IllegalMove),
        };

        let cached = &self.player(mover).valid_moves;
        if !cached.iter().any(|m| m.from == from && m.to == to) {
            return Err(EngineError::IllegalMove);
        }

        let mut record = MoveRecord {
            from,
            to,
            moved_piece: piece_id,
            captured_piece: None,
            turn: self.current_turn,
            game_ended: self.game_ended,
            winner: self.winner,
            white_valid_moves: self.white.valid_moves.clone(),
            black_valid_moves: self.black.valid_moves.clone(),
        };

        // Move generation only yields occupied destinations at a goal
        // square, so an occupant here is always an enemy piece being
        // captured.
        if let Some(captured_id) = self.board[to.row][to.col] {
            self.pieces[captured_id].captured = true;
            record.captured_piece = Some(captured_id);
        }

        self.move_records.push(record);

        self.board[to.row][to.col] = Some(piece_id);
        self.board[from.row][from.col] = None;
        let piece = &mut self.pieces[piece_id];
        piece.pos = to;
        piece.side = piece.side.flipped();
        self.current_turn = opponent;

        let key = self.encode_state();
        self.board_history.push(key.clone());

        // A mover leaving an enemy piece on their own goal loses.
        let mover_goal = self.goal(mover);
        if self
            .piece_at(mover_goal)
            .is_some_and(|piece| piece.color != mover)
        {
            self.game_ended = true;
            self.winner = Some(opponent);
            return Ok(());
        }

        let opponent_moves = generate_moves(self, opponent);
        let opponent_stuck = opponent_moves.is_empty();
        self.player_mut(opponent).valid_moves = opponent_moves;
        if opponent_stuck {
            self.game_ended = true;
            self.winner = Some(mover);
            return Ok(());
        }

        let count = self.position_counts.entry(key).or_insert(0);
        *count += 1;
        if *count == 3 {
            // Threefold repetition: draw, no winner.
            self.game_ended = true;
        }

        Ok(())
    }

    /// Pop the last move record and restore the prior state exactly. A
    /// strict inverse of [`apply_move`](Self::apply_move); a no-op when no
    /// move has been applied.
    pub fn undo_last_move(&mut self) {
        let Some(record) = self.move_records.pop() else {
            return;
        };

        self.board[record.from.row][record.from.col] = Some(record.moved_piece);
        self.board[record.to.row][record.to.col] = record.captured_piece;

        let piece = &mut self.pieces[record.moved_piece];
        piece.pos = record.from;
        piece.side = piece.side.flipped();

        if let Some(captured_id) = record.captured_piece {
            self.pieces[captured_id].captured = false;
        }

        self.current_turn = record.turn;
        self.game_ended = record.game_ended;
        self.winner = record.winner;

        if let Some(key) = self.board_history.pop() {
            if let Some(count) = self.position_counts.get_mut(&key) {
                if *count > 1 {
                    *count -= 1;
                } else {
                    self.position_counts.remove(&key);
                }
            }
        }

        // Caches come from the snapshot, not a regeneration.
        self.white.valid_moves = record.white_valid_moves;
        self.black.valid_moves = record.black_valid_moves;
    }

    /// The numbered move history in `FROM-TO` notation.
    pub fn move_history(&self) -> Vec<MoveHistoryEntry> {
        let size = self.board_size();
        self.move_records
            .iter()
            .enumerate()
            .map(|(i, record)| MoveHistoryEntry {
                move_number: i + 1,
                player: self.pieces[record.moved_piece].color,
                notation: format!(
                    "{}-{}",
                    format_square(record.from, size),
                    format_square(record.to, size)
                ),
            })
            .collect()
    }

    /// ASCII diagram of the current position, for debug logging.
    pub fn render_board(&self) -> String {
        let size = self.board_size();
        let key = self.board_string();
        let (cells, turn) = key.split_at(key.len().saturating_sub(1));

        let mut out = String::new();
        out.push_str(&format!(
            "Current Turn: {}\n",
            if turn == "1" { "White" } else { "Black" }
        ));
        for (i, row) in cells.split('/').enumerate() {
            out.push_str(&format!("{}| ", size - i));
            for (j, c) in row.chars().enumerate() {
                if j > 0 {
                    out.push(' ');
                }
                out.push(c);
            }
            out.push('\n');
        }
        out.push_str(&format!(" +{}\n  ", "-".repeat(size * 2 + 1)));
        for i in 0..size {
            out.push(' ');
            out.push((b'A' + i as u8) as char);
        }
        out.push('\n');
        out
    }

    /// Build an arbitrary position. Test-only: skips the normal setup and
    /// regenerates the mover's cache the way `new` does.
    #[cfg(test)]
    pub(crate) fn with_position(
        kind: FlipFlopKind,
        placements: &[(PlayerSide, PieceSide, Square)],
        turn: PlayerSide,
    ) -> FlipFlop {
        let size = kind.board_size();
        let mut game = FlipFlop {
            kind,
            pieces: Vec::new(),
            board: vec![vec![None; size]; size],
            white: PlayerState {
                color: PlayerSide::White,
                goal: Square::new(size - 1, size / 2),
                pieces: Vec::new(),
                valid_moves: Vec::new(),
            },
            black: PlayerState {
                color: PlayerSide::Black,
                goal: Square::new(0, size / 2),
                pieces: Vec::new(),
                valid_moves: Vec::new(),
            },
            current_turn: turn,
            game_ended: false,
            winner: None,
            position_counts: HashMap::new(),
            board_history: Vec::new(),
            move_records: Vec::new(),
        };

        for &(color, side, pos) in placements {
            game.add_piece(color, pos);
            let id = game.pieces.len() - 1;
            game.pieces[id].side = side;
        }

        game.white.valid_moves = generate_moves(&game, PlayerSide::White);
        game.black.valid_moves = generate_moves(&game, PlayerSide::Black);

        let initial = game.encode_state();
        game.position_counts.insert(initial.clone(), 1);
        game.board_history.push(initial);

        game
    }
}

use std::str::FromStr;

use chess::{Board, BoardStatus, ChessMove, Color, Piece};
use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::san::find_san_move;

/// Score used for mate evaluations when a single number is needed.
pub const MATE_SCORE: i32 = 100_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameMetadata {
    pub white: String,
    pub black: String,
    pub result: String, // "1-0", "0-1", "1/2-1/2", "*"
    pub site: Option<String>,
    pub termination: Option<String>,
    pub date: Option<String>,
    pub event: Option<String>,
}

impl GameMetadata {
    /// Link to a specific ply of this game (`https://lichess.org/abcd1234#21`).
    pub fn link(&self, ply: usize) -> String {
        format!("{}#{}", self.site.as_deref().unwrap_or("?"), ply)
    }
}

/// Engine evaluation, white-relative, of the position after a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Score {
    Cp(i32),
    Mate(i32),
}

impl Score {
    /// Re-sign so that positive favours `color`.
    pub fn pov(self, color: Color) -> Score {
        match color {
            Color::White => self,
            Color::Black => match self {
                Score::Cp(cp) => Score::Cp(cp.saturating_neg()),
                Score::Mate(n) => Score::Mate(n.saturating_neg()),
            },
        }
    }

    /// Collapse to centipawns, mapping mates onto `MATE_SCORE`.
    pub fn centipawns(self) -> i32 {
        match self {
            Score::Cp(cp) => cp,
            Score::Mate(n) => mate_centipawns(n),
        }
    }

    /// Shorthand for `pov(color).centipawns()`.
    pub fn pov_cp(self, color: Color) -> i32 {
        self.pov(color).centipawns()
    }
}

/// Mate in `n` on the centipawn scale: `MATE_SCORE - n` when mating,
/// `-MATE_SCORE - n` when mated. Distances are capped at half of
/// `MATE_SCORE` so a mate always outweighs any centipawn evaluation.
pub fn mate_centipawns(n: i32) -> i32 {
    let distance = n.unsigned_abs().min(MATE_SCORE as u32 / 2) as i32;
    if n > 0 {
        MATE_SCORE - distance
    } else {
        distance - MATE_SCORE
    }
}

/// Ply number of the position described by a FEN, counted from the initial
/// position: `2 * (fullmove - 1)`, plus one when Black is to move.
pub fn fen_ply(fen: &str) -> usize {
    let mut fields = fen.split_whitespace().skip(1);
    let black_to_move = fields.next() == Some("b");
    let fullmove: usize = fields.nth(3).and_then(|f| f.parse().ok()).unwrap_or(1);
    2 * fullmove.saturating_sub(1) + usize::from(black_to_move)
}

/// One SAN token from the movetext with the evaluation annotated after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMove {
    pub san: String,
    pub eval: Option<Score>,
}

/// A game as read from PGN, before the moves are replayed.
#[derive(Debug, Clone)]
pub struct GameRecord {
    pub metadata: GameMetadata,
    /// Starting FEN when the game was set up from a position.
    pub start_fen: Option<String>,
    pub moves: Vec<RecordedMove>,
}

/// One half-move of the mainline.
#[derive(Debug, Clone)]
pub struct Ply {
    /// Ply number counted from the initial position, so a game set up from
    /// a FEN at move 8 with White to move starts at ply 15
    pub index: usize,
    pub chess_move: ChessMove,
    pub san: String,
    pub board_before: Board,
    pub board_after: Board,
    /// Kind of piece that moved (before promotion)
    pub moved: Piece,
    pub captured: Option<Piece>,
    pub is_en_passant: bool,
    pub is_castling: bool,
    pub eval: Option<Score>,
}

impl Ply {
    fn new(index: usize, board_before: Board, chess_move: ChessMove, san: String, eval: Option<Score>) -> Self {
        let src = chess_move.get_source();
        let dest = chess_move.get_dest();
        let moved = board_before.piece_on(src).unwrap_or(Piece::Pawn);

        let is_en_passant = moved == Piece::Pawn
            && src.get_file() != dest.get_file()
            && board_before.piece_on(dest).is_none();
        let captured = if is_en_passant {
            Some(Piece::Pawn)
        } else {
            board_before.piece_on(dest)
        };
        let is_castling = moved == Piece::King
            && (src.get_file().to_index() as i32 - dest.get_file().to_index() as i32).abs() > 1;

        Self {
            index,
            chess_move,
            san,
            board_after: board_before.make_move_new(chess_move),
            board_before,
            moved,
            captured,
            is_en_passant,
            is_castling,
            eval,
        }
    }

    /// Side that played this ply.
    pub fn mover(&self) -> Color {
        self.board_before.side_to_move()
    }

    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }

    /// Piece standing on the destination after the move (the promoted piece on promotion).
    pub fn piece_after(&self) -> Piece {
        self.chess_move.get_promotion().unwrap_or(self.moved)
    }

    /// Move in UCI notation (`e7e8q`).
    pub fn uci(&self) -> String {
        self.chess_move.to_string()
    }

    /// Move-number movetext: `12. Nxf7` for White, `12... Nxf7` for Black.
    pub fn movetext(&self) -> String {
        let move_number = (self.index - 1) / 2 + 1;
        match self.mover() {
            Color::White => format!("{}. {}", move_number, self.san),
            Color::Black => format!("{}... {}", move_number, self.san),
        }
    }
}

/// A fully replayed mainline.
#[derive(Debug, Clone)]
pub struct Game {
    pub metadata: GameMetadata,
    pub start: Board,
    /// Ply number of the starting position (0 for the initial position)
    pub start_ply: usize,
    pub plies: Vec<Ply>,
}

impl Game {
    /// Replay a parsed record into plies; fails on the first unplayable move.
    pub fn replay(record: GameRecord) -> Result<Game, GameError> {
        let (start, start_ply) = match record.start_fen.as_deref() {
            Some(fen) => {
                let board = Board::from_str(fen).map_err(|e| GameError::InvalidPosition(format!("{fen}: {e}")))?;
                (board, fen_ply(fen))
            }
            None => (Board::default(), 0),
        };

        if record.moves.is_empty() {
            return Err(GameError::EmptyGame);
        }

        let mut board = start;
        let mut plies = Vec::with_capacity(record.moves.len());
        for (i, recorded) in record.moves.into_iter().enumerate() {
            let index = start_ply + i + 1;
            let chess_move = find_san_move(&board, &recorded.san).map_err(|reason| GameError::InvalidMove {
                ply: index,
                san: recorded.san.clone(),
                reason,
            })?;
            let ply = Ply::new(index, board, chess_move, recorded.san, recorded.eval);
            board = ply.board_after;
            plies.push(ply);
        }

        Ok(Game {
            metadata: record.metadata,
            start,
            start_ply,
            plies,
        })
    }

    /// Ply by its number.
    pub fn ply(&self, index: usize) -> Option<&Ply> {
        index
            .checked_sub(self.start_ply + 1)
            .and_then(|i| self.plies.get(i))
    }

    /// Number of the first recorded ply.
    pub fn first_ply(&self) -> usize {
        self.start_ply + 1
    }

    pub fn last_ply(&self) -> usize {
        self.start_ply + self.plies.len()
    }

    pub fn final_board(&self) -> &Board {
        self.plies.last().map(|p| &p.board_after).unwrap_or(&self.start)
    }

    pub fn ended_in_checkmate(&self) -> bool {
        self.final_board().status() == BoardStatus::Checkmate
    }

    pub fn link(&self, ply: usize) -> String {
        self.metadata.link(ply)
    }
}

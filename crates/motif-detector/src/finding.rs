//! Finding records handed to the report writer.

use chess::{Board, Piece, Square};
use serde::{Deserialize, Serialize};

use curator_core::game_data::{Game, Ply};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatePattern {
    BackRank,
    Hook,
    Anastasia,
    Arabian,
    Smothered,
    KnightMate,
    BishopMate,
    PawnMate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotifKind {
    AbsolutePin,
    Fork,
    Skewer,
    TrappedPieceCapture,
    SacrificeCandidate,
    GreekGiftCandidate,
    MatePattern(MatePattern),
}

/// A square and the piece standing on it, e.g. `{ "square": "a8", "piece": "r" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub square: String,
    pub piece: Option<String>,
}

impl Evidence {
    pub fn on(board: &Board, square: Square) -> Self {
        let piece = board.piece_on(square).map(|p| {
            let symbol = piece_symbol(p);
            match board.color_on(square) {
                Some(chess::Color::Black) => symbol.to_ascii_lowercase().to_string(),
                _ => symbol.to_string(),
            }
        });
        Self {
            square: square.to_string(),
            piece,
        }
    }
}

fn piece_symbol(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'P',
        Piece::Knight => 'N',
        Piece::Bishop => 'B',
        Piece::Rook => 'R',
        Piece::Queen => 'Q',
        Piece::King => 'K',
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotifFinding {
    pub kind: MotifKind,
    pub ply: usize,
    pub link: String,
    pub white: String,
    pub black: String,
    /// Move-number movetext of the ply, e.g. `21... Qxa8`
    pub movetext: Option<String>,
    pub uci: Option<String>,
    /// Position the finding is about, in FEN
    pub fen: Option<String>,
    pub evidence: Vec<Evidence>,
}

impl MotifFinding {
    /// Finding anchored on `ply`, linked at `link_ply`.
    pub fn at(kind: MotifKind, game: &Game, ply: &Ply, link_ply: usize) -> Self {
        Self {
            kind,
            ply: ply.index,
            link: game.link(link_ply),
            white: game.metadata.white.clone(),
            black: game.metadata.black.clone(),
            movetext: Some(ply.movetext()),
            uci: Some(ply.uci()),
            fen: Some(ply.board_before.to_string()),
            evidence: Vec::new(),
        }
    }

    pub fn with_evidence(mut self, board: &Board, squares: impl IntoIterator<Item = Square>) -> Self {
        self.evidence.extend(squares.into_iter().map(|sq| Evidence::on(board, sq)));
        self
    }
}

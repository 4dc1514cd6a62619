/// Attack-based detectors: fork, trapped_piece_capture

use chess::Piece;
use curator_core::game_data::Ply;

use crate::board_utils::{attacked_opponent_squares, attackers, contains, is_hanging, is_trapped, king_value};
use crate::error::MotifError;

/// Fork: the moved piece attacks two or more non-pawn pieces that are either
/// worth more than it or hanging without being able to take it back.
pub fn fork(ply: &Ply) -> bool {
    let board = &ply.board_after;
    let to_sq = ply.chess_move.get_dest();
    let moved = ply.piece_after();
    if moved == Piece::King {
        return false;
    }

    let mover = ply.mover();
    let recapturers = attackers(board, !mover, to_sq);

    let forked = attacked_opponent_squares(board, to_sq, mover)
        .into_iter()
        .filter(|&(piece, _)| piece != Piece::Pawn)
        .filter(|&(piece, square)| {
            king_value(piece) > king_value(moved)
                || (is_hanging(board, !mover, square) && !contains(recapturers, square))
        })
        .count();

    forked > 1
}

/// Was the piece taken by `capture` trapped before `prev` was played?
///
/// When `prev` moved the piece onto the capture square, its origin is
/// examined instead.
pub fn trapped_piece_capture(prev: &Ply, capture: &Ply) -> Result<bool, MotifError> {
    let mut square = capture.chess_move.get_dest();
    match capture.captured {
        Some(piece) if piece != Piece::Pawn => {}
        _ => return Ok(false),
    }
    if prev.chess_move.get_dest() == square {
        square = prev.chess_move.get_source();
    }
    is_trapped(&prev.board_before, square)
}

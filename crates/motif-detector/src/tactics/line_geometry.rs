/// Line-geometry detectors: skewer

use curator_core::game_data::Ply;

use crate::board_utils::{contains, is_checkmate, is_in_bad_spot, is_ray_piece, king_value};
use crate::error::MotifError;

/// Skewer: a ray piece captures along the line the opponent's more valuable
/// piece just vacated with `prev`.
pub fn skewer(prev: &Ply, capture: &Ply) -> Result<bool, MotifError> {
    let to_sq = capture.chess_move.get_dest();
    let captured = match capture.board_before.piece_on(to_sq) {
        Some(piece) => piece,
        None => return Ok(false),
    };
    if !is_ray_piece(capture.piece_after()) || is_checkmate(&capture.board_after) {
        return Ok(false);
    }

    let between = chess::between(capture.chess_move.get_source(), to_sq);
    if prev.chess_move.get_dest() == to_sq || !contains(between, prev.chess_move.get_source()) {
        return Ok(false);
    }

    Ok(king_value(prev.piece_after()) > king_value(captured) && is_in_bad_spot(&prev.board_after, to_sq)?)
}

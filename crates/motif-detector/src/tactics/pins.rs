/// Absolute-pin detector

use curator_core::game_data::Ply;

use crate::board_utils::is_pinned;

/// Was the piece taken by `capture` pinned to its king two plies earlier,
/// i.e. before `prev` (the owner's last move) was played?
pub fn captured_piece_was_abs_pinned(prev: &Ply, capture: &Ply) -> bool {
    let owner = capture.board_after.side_to_move();
    is_pinned(&prev.board_before, owner, capture.chess_move.get_dest())
}

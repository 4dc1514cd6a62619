/// Board utility functions for tactical analysis: attack queries, material,
/// and defense/entrapment analysis.

use chess::{BitBoard, Board, BoardStatus, ChessMove, Color, MoveGen, Piece, Square, EMPTY};

use crate::error::MotifError;

// Piece values for material calculation
pub const PAWN_VALUE: i32 = 1;
pub const KNIGHT_VALUE: i32 = 3;
pub const BISHOP_VALUE: i32 = 3;
pub const ROOK_VALUE: i32 = 5;
pub const QUEEN_VALUE: i32 = 9;
pub const KING_VALUE: i32 = 99;

/// Piece value (no king)
pub fn piece_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => PAWN_VALUE,
        Piece::Knight => KNIGHT_VALUE,
        Piece::Bishop => BISHOP_VALUE,
        Piece::Rook => ROOK_VALUE,
        Piece::Queen => QUEEN_VALUE,
        Piece::King => 0,
    }
}

/// Piece value including king (for fork and skewer comparisons)
pub fn king_value(piece: Piece) -> i32 {
    match piece {
        Piece::King => KING_VALUE,
        other => piece_value(other),
    }
}

/// Is this a ray (sliding) piece type?
pub fn is_ray_piece(piece: Piece) -> bool {
    matches!(piece, Piece::Queen | Piece::Rook | Piece::Bishop)
}

/// Piece and colour on a square, or `InvalidQuery` if it is empty.
pub fn piece_at(board: &Board, square: Square) -> Result<(Piece, Color), MotifError> {
    match (board.piece_on(square), board.color_on(square)) {
        (Some(piece), Some(color)) => Ok((piece, color)),
        _ => Err(MotifError::InvalidQuery(format!("no piece on {square}"))),
    }
}

/// Squares attacked by the piece on `square` (empty if the square is empty).
pub fn attacks(board: &Board, square: Square) -> BitBoard {
    let (piece, color) = match (board.piece_on(square), board.color_on(square)) {
        (Some(p), Some(c)) => (p, c),
        _ => return EMPTY,
    };
    let occupied = *board.combined();

    match piece {
        Piece::Pawn => pawn_attacks(square, color),
        Piece::Knight => chess::get_knight_moves(square),
        Piece::King => chess::get_king_moves(square),
        Piece::Bishop => chess::get_bishop_moves(square, occupied),
        Piece::Rook => chess::get_rook_moves(square, occupied),
        Piece::Queen => chess::get_bishop_moves(square, occupied) | chess::get_rook_moves(square, occupied),
    }
}

/// Pawn capture squares (diagonals only, no pushes)
pub fn pawn_attacks(square: Square, color: Color) -> BitBoard {
    chess::get_pawn_attacks(square, color, !EMPTY)
}

/// A read-only view of a board with some pieces lifted off it.
///
/// Lifted squares count as empty for sliding attacks and their pieces never
/// attack. The underlying board is never touched.
#[derive(Clone, Copy)]
pub struct LiftedBoard<'a> {
    board: &'a Board,
    lifted: BitBoard,
}

impl<'a> LiftedBoard<'a> {
    pub fn new(board: &'a Board) -> Self {
        Self { board, lifted: EMPTY }
    }

    /// Same view with the piece on `square` removed as well.
    pub fn without(self, square: Square) -> Self {
        Self {
            board: self.board,
            lifted: self.lifted | BitBoard::from_square(square),
        }
    }

    /// All pieces of `color` attacking `square` in this view.
    pub fn attackers(&self, color: Color, square: Square) -> BitBoard {
        let board = self.board;
        let occupied = *board.combined() & !self.lifted;
        let ours = *board.color_combined(color) & !self.lifted;

        let pawns = pawn_attacks(square, !color) & *board.pieces(Piece::Pawn);
        let knights = chess::get_knight_moves(square) & *board.pieces(Piece::Knight);
        let kings = chess::get_king_moves(square) & *board.pieces(Piece::King);
        let diagonal = chess::get_bishop_moves(square, occupied)
            & (*board.pieces(Piece::Bishop) | *board.pieces(Piece::Queen));
        let straight = chess::get_rook_moves(square, occupied)
            & (*board.pieces(Piece::Rook) | *board.pieces(Piece::Queen));

        (pawns | knights | kings | diagonal | straight) & ours
    }
}

/// All pieces of `color` that attack `square`.
pub fn attackers(board: &Board, color: Color, square: Square) -> BitBoard {
    LiftedBoard::new(board).attackers(color, square)
}

/// Is the square (treated as occupied) the only piece between `color`'s king
/// and an enemy slider on the same line?
pub fn is_pinned(board: &Board, color: Color, square: Square) -> bool {
    let king = board.king_square(color);
    if king == square {
        return false;
    }

    let enemy = *board.color_combined(!color);
    let queens = *board.pieces(Piece::Queen);
    let snipers = (chess::get_bishop_rays(king) & (*board.pieces(Piece::Bishop) | queens) & enemy)
        | (chess::get_rook_rays(king) & (*board.pieces(Piece::Rook) | queens) & enemy);

    let target = BitBoard::from_square(square);
    let occupied = *board.combined() | target;
    snipers
        .into_iter()
        .any(|sniper| chess::between(sniper, king) & occupied == target)
}

/// Is the piece of `color` on `square` defended?
///
/// Counts direct defenders, and defenders that appear once a single enemy ray
/// attacker is lifted off the board (a defender x-raying through it).
pub fn is_defended(board: &Board, color: Color, square: Square) -> bool {
    let view = LiftedBoard::new(board);
    if view.attackers(color, square) != EMPTY {
        return true;
    }

    attackers(board, !color, square)
        .into_iter()
        .filter(|&sq| board.piece_on(sq).is_some_and(is_ray_piece))
        .any(|sq| view.without(sq).attackers(color, square) != EMPTY)
}

/// Is a piece hanging (not defended)?
pub fn is_hanging(board: &Board, color: Color, square: Square) -> bool {
    !is_defended(board, color, square)
}

/// Can the piece be taken by a strictly lower-value enemy piece (kings excluded)?
pub fn can_be_taken_by_lower_piece(board: &Board, piece: Piece, color: Color, square: Square) -> bool {
    attackers(board, !color, square).into_iter().any(|sq| {
        board
            .piece_on(sq)
            .is_some_and(|att| att != Piece::King && piece_value(att) < piece_value(piece))
    })
}

/// Attacked, and either hanging or takeable by a lower piece.
pub fn is_in_bad_spot(board: &Board, square: Square) -> Result<bool, MotifError> {
    let (piece, color) = piece_at(board, square)?;
    if attackers(board, !color, square) == EMPTY {
        return Ok(false);
    }
    Ok(is_hanging(board, color, square) || can_be_taken_by_lower_piece(board, piece, color, square))
}

/// Is the piece on `square` trapped: in a bad spot with every legal move
/// either failing to win equal material or landing on another bad spot.
///
/// Each escape is tried on a fresh board value; the input is never modified.
pub fn is_trapped(board: &Board, square: Square) -> Result<bool, MotifError> {
    if is_check(board) || is_pinned(board, board.side_to_move(), square) {
        return Ok(false);
    }
    let (piece, _) = piece_at(board, square)?;
    if matches!(piece, Piece::Pawn | Piece::King) {
        return Ok(false);
    }
    if !is_in_bad_spot(board, square)? {
        return Ok(false);
    }

    for escape in MoveGen::new_legal(board).filter(|m| m.get_source() == square) {
        if let Some(target) = board.piece_on(escape.get_dest()) {
            if piece_value(target) >= piece_value(piece) {
                return Ok(false);
            }
        }
        let after = apply(board, escape);
        if !is_in_bad_spot(&after, escape.get_dest())? {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Apply a legal move, returning the new position.
pub fn apply(board: &Board, chess_move: ChessMove) -> Board {
    board.make_move_new(chess_move)
}

pub fn is_check(board: &Board) -> bool {
    *board.checkers() != EMPTY
}

pub fn is_checkmate(board: &Board) -> bool {
    board.status() == BoardStatus::Checkmate
}

/// Count material for one side
pub fn material_count(board: &Board, color: Color) -> i32 {
    let color_bb = *board.color_combined(color);
    [Piece::Pawn, Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen]
        .into_iter()
        .map(|p| (*board.pieces(p) & color_bb).popcnt() as i32 * piece_value(p))
        .sum()
}

/// Material difference (positive = side has more)
pub fn material_diff(board: &Board, side: Color) -> i32 {
    material_count(board, side) - material_count(board, !side)
}

/// Number of non-pawn, non-king pieces of a side.
pub fn non_pawn_count(board: &Board, color: Color) -> u32 {
    let color_bb = *board.color_combined(color);
    let pieces = *board.pieces(Piece::Knight)
        | *board.pieces(Piece::Bishop)
        | *board.pieces(Piece::Rook)
        | *board.pieces(Piece::Queen);
    (pieces & color_bb).popcnt()
}

pub fn pawn_count(board: &Board, color: Color) -> u32 {
    (*board.pieces(Piece::Pawn) & *board.color_combined(color)).popcnt()
}

/// Opponent pieces attacked from a square, as (piece, square).
pub fn attacked_opponent_squares(board: &Board, from_square: Square, pov: Color) -> Vec<(Piece, Square)> {
    let opponents = *board.color_combined(!pov);
    (attacks(board, from_square) & opponents)
        .into_iter()
        .filter_map(|sq| board.piece_on(sq).map(|piece| (piece, sq)))
        .collect()
}

/// Distance between two squares (Chebyshev distance)
pub fn square_distance(s1: Square, s2: Square) -> u32 {
    let r1 = s1.get_rank().to_index() as i32;
    let r2 = s2.get_rank().to_index() as i32;
    let f1 = s1.get_file().to_index() as i32;
    let f2 = s2.get_file().to_index() as i32;
    (r1 - r2).unsigned_abs().max((f1 - f2).unsigned_abs())
}

pub fn contains(bb: BitBoard, square: Square) -> bool {
    bb & BitBoard::from_square(square) != EMPTY
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn board(fen: &str) -> Board {
        Board::from_str(fen).unwrap()
    }

    #[test]
    fn test_material_count_starting() {
        let board = Board::default();
        // 8 pawns + 2 knights + 2 bishops + 2 rooks + 1 queen = 8+6+6+10+9 = 39
        assert_eq!(material_count(&board, Color::White), 39);
        assert_eq!(material_count(&board, Color::Black), 39);
        assert_eq!(material_diff(&board, Color::White), 0);
    }

    #[test]
    fn test_material_diff_is_antisymmetric() {
        for fen in [
            "rn1qkb1r/1Q3ppp/p7/3ppb2/N2PnB2/4P3/PP3PPP/2R1KBNR b Kkq - 0 11",
            "8/2r2pp1/4p3/2Pnk3/7R/8/P3b1P1/4R1K1 b - - 2 42",
            "8/6k1/6p1/1p3pr1/6N1/6K1/5P1P/1R6 w - - 0 47",
        ] {
            let b = board(fen);
            assert_eq!(material_diff(&b, Color::White), -material_diff(&b, Color::Black));
        }
        let b = board("rn1qkb1r/1Q3ppp/p7/3ppb2/N2PnB2/4P3/PP3PPP/2R1KBNR b Kkq - 0 11");
        assert_eq!(material_diff(&b, Color::White), 3);
    }

    #[test]
    fn test_attacks_starting_position() {
        let board = Board::default();
        let atk = attacks(&board, Square::E2);
        assert!(contains(atk, Square::D3));
        assert!(contains(atk, Square::F3));
        assert_eq!(attacks(&board, Square::E4), EMPTY);
    }

    #[test]
    fn test_pawn_attacks() {
        let white_atk = pawn_attacks(Square::E4, Color::White);
        assert!(contains(white_atk, Square::D5));
        assert!(contains(white_atk, Square::F5));
        assert_eq!(white_atk.popcnt(), 2);
        assert_eq!(pawn_attacks(Square::A7, Color::Black).popcnt(), 1);
    }

    #[test]
    fn test_attackers_reverse_lookup() {
        let board = board("rnbqkbnr/pppppppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2");
        let white_attackers = attackers(&board, Color::White, Square::E5);
        assert!(contains(white_attackers, Square::F3));
        assert_eq!(white_attackers.popcnt(), 1);
    }

    #[test]
    fn test_square_distance() {
        assert_eq!(square_distance(Square::E1, Square::E4), 3);
        assert_eq!(square_distance(Square::A1, Square::H8), 7);
    }

    #[test]
    fn test_piece_at_empty_square_is_invalid_query() {
        let board = Board::default();
        assert!(matches!(piece_at(&board, Square::E4), Err(MotifError::InvalidQuery(_))));
        assert!(is_in_bad_spot(&board, Square::E4).is_err());
        assert!(is_trapped(&board, Square::E4).is_err());
    }

    #[test]
    fn test_ray_defense_through_attacker() {
        // Rook h6 defends c6 only once the black rook on d6 is lifted
        let b = board("6k1/8/2N1r2R/8/8/8/8/6K1 w - - 0 1");
        assert_eq!(attackers(&b, Color::White, Square::C6), EMPTY);
        assert!(is_defended(&b, Color::White, Square::C6));
        let b = board("6k1/8/2N1r3/8/8/8/8/6K1 w - - 0 1");
        assert!(is_hanging(&b, Color::White, Square::C6));
    }

    #[test]
    fn test_defended_is_complement_of_hanging() {
        let b = board("r2qkb1r/p3nppp/1pp1p3/3pP3/2b5/3Q1NP1/PP3PBP/RNB2RK1 w kq - 0 11");
        for sq in *b.combined() {
            let color = b.color_on(sq).unwrap();
            assert_eq!(is_defended(&b, color, sq), !is_hanging(&b, color, sq));
        }
    }

    #[test]
    fn test_is_pinned() {
        let b = board("8/2r2pp1/4p3/2Pnk3/7R/8/P3b1P1/4R1K1 b - - 2 42");
        assert!(is_pinned(&b, Color::Black, Square::E2));
        assert!(!is_pinned(&b, Color::Black, Square::D5));
        // The bishop on e2 already blocks the file
        assert!(!is_pinned(&b, Color::Black, Square::E3));
        // An empty square counts as the lone blocker when the line is open
        let b = board("4k3/8/8/8/8/8/8/4RK2 b - - 0 1");
        assert!(is_pinned(&b, Color::Black, Square::E5));
    }

    #[test]
    fn test_bad_spot_and_lower_piece() {
        // Rook f1 defended by the king but attacked by a bishop
        let b = board("r2qkb1r/p3nppp/1pp1p3/3pP3/2b5/4QNP1/PP3PBP/RNB2RK1 b kq - 1 11");
        assert!(is_defended(&b, Color::White, Square::F1));
        assert!(can_be_taken_by_lower_piece(&b, Piece::Rook, Color::White, Square::F1));
        assert!(is_in_bad_spot(&b, Square::F1).unwrap());
    }

    #[test]
    fn test_trapped_rook_in_corner() {
        let b = board("rn1qkb1r/1Q3ppp/p7/3ppb2/N2PnB2/4P3/PP3PPP/2R1KBNR b Kkq - 0 11");
        assert!(is_trapped(&b, Square::A8).unwrap());
        // Pawns and kings are never trapped
        assert!(!is_trapped(&b, Square::E5).unwrap());
        assert!(!is_trapped(&b, Square::E8).unwrap());
    }

    #[test]
    fn test_piece_with_safe_square_is_not_trapped() {
        // Knight on a5 attacked by a pawn but free to go to c4
        let b = board("4k3/8/1p6/N7/8/8/8/4K3 w - - 0 1");
        assert!(is_in_bad_spot(&b, Square::A5).unwrap());
        assert!(!is_trapped(&b, Square::A5).unwrap());
    }
}

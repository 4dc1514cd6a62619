/// Checkmate pattern detectors on a final, checkmated position:
/// back_rank_mate, hook_mate, anastasia_mate, arabian_mate, smothered_mate,
/// plus the piece that delivered mate when a single minor piece or pawn did.

use chess::{Board, Color, File, Piece, Rank, Square};

use crate::board_utils::{attackers, is_checkmate, square_distance};
use crate::finding::MatePattern;

/// Every named pattern the position matches, in declaration order.
pub fn classify_checkmate(board: &Board) -> Vec<MatePattern> {
    if !is_checkmate(board) {
        return Vec::new();
    }

    let checks: [(MatePattern, fn(&Board) -> bool); 5] = [
        (MatePattern::BackRank, back_rank_mate),
        (MatePattern::Hook, hook_mate),
        (MatePattern::Anastasia, anastasia_mate),
        (MatePattern::Arabian, arabian_mate),
        (MatePattern::Smothered, smothered_mate),
    ];
    let mut patterns: Vec<MatePattern> = checks
        .into_iter()
        .filter(|(_, matches)| matches(board))
        .map(|(pattern, _)| pattern)
        .collect();
    patterns.extend(mating_piece(board));
    patterns
}

/// The losing king, the winning colour and the first checking square.
fn mate_geometry(board: &Board) -> Option<(Square, Color, Square)> {
    let loser = board.side_to_move();
    let checker = board.checkers().into_iter().next()?;
    Some((board.king_square(loser), !loser, checker))
}

fn back_rank(color: Color) -> usize {
    match color {
        Color::White => 0,
        Color::Black => 7,
    }
}

/// Back rank: king on its own back rank, every square in front of it held by
/// its own unattacked pieces, and a checker on that rank.
pub fn back_rank_mate(board: &Board) -> bool {
    if !is_checkmate(board) {
        return false;
    }
    let loser = board.side_to_move();
    let pov = !loser;
    let king = board.king_square(loser);
    let rank = back_rank(loser);
    if king.get_rank().to_index() != rank {
        return false;
    }

    let front_rank = if loser == Color::White { rank + 1 } else { rank - 1 };
    let king_file = king.get_file().to_index();
    let files = king_file.saturating_sub(1)..=(king_file + 1).min(7);
    for file in files {
        let sq = Square::make_square(Rank::from_index(front_rank), File::from_index(file));
        let blocked_by_own = board.color_on(sq) == Some(loser);
        if !blocked_by_own || attackers(board, pov, sq).popcnt() > 0 {
            return false;
        }
    }

    board
        .checkers()
        .into_iter()
        .any(|checker| checker.get_rank().to_index() == rank)
}

/// Hook: rook next to the king, guarded by a knight next to the king, which
/// is in turn guarded by a pawn.
pub fn hook_mate(board: &Board) -> bool {
    if !is_checkmate(board) {
        return false;
    }
    let Some((king, pov, checker)) = mate_geometry(board) else {
        return false;
    };
    if board.piece_on(checker) != Some(Piece::Rook) || square_distance(checker, king) != 1 {
        return false;
    }

    attackers(board, pov, checker)
        .into_iter()
        .filter(|&sq| board.piece_on(sq) == Some(Piece::Knight) && square_distance(sq, king) == 1)
        .any(|knight| {
            attackers(board, pov, knight)
                .into_iter()
                .any(|sq| board.piece_on(sq) == Some(Piece::Pawn))
        })
}

/// Anastasia: king on an edge file off the back ranks, mated along that file
/// by a queen or rook, with a losing-side blocker beside it and the mating
/// knight two files further in.
pub fn anastasia_mate(board: &Board) -> bool {
    if !is_checkmate(board) {
        return false;
    }
    let Some((king, pov, checker)) = mate_geometry(board) else {
        return false;
    };
    let file = king.get_file().to_index();
    let rank = king.get_rank();
    if !matches!(file, 0 | 7) || matches!(rank.to_index(), 0 | 7) {
        return false;
    }
    if checker.get_file() != king.get_file()
        || !matches!(board.piece_on(checker), Some(Piece::Queen | Piece::Rook))
    {
        return false;
    }

    // Mirror so the analysis always walks inward from the edge
    let (blocker_file, knight_file) = if file == 0 { (1, 3) } else { (6, 4) };
    let blocker = Square::make_square(rank, File::from_index(blocker_file));
    let knight = Square::make_square(rank, File::from_index(knight_file));

    board.piece_on(blocker).is_some()
        && board.color_on(blocker) != Some(pov)
        && board.piece_on(knight) == Some(Piece::Knight)
        && board.color_on(knight) == Some(pov)
}

/// Arabian: cornered king, adjacent rook, rook guarded by a knight standing
/// two files and two ranks from the king.
pub fn arabian_mate(board: &Board) -> bool {
    if !is_checkmate(board) {
        return false;
    }
    let Some((king, pov, checker)) = mate_geometry(board) else {
        return false;
    };
    let cornered = matches!(king.get_file().to_index(), 0 | 7) && matches!(king.get_rank().to_index(), 0 | 7);
    if !cornered || board.piece_on(checker) != Some(Piece::Rook) || square_distance(checker, king) != 1 {
        return false;
    }

    attackers(board, pov, checker).into_iter().any(|sq| {
        let dr = (sq.get_rank().to_index() as i32 - king.get_rank().to_index() as i32).abs();
        let df = (sq.get_file().to_index() as i32 - king.get_file().to_index() as i32).abs();
        board.piece_on(sq) == Some(Piece::Knight) && dr == 2 && df == 2
    })
}

/// Smothered: knight check with every square around the king filled by the
/// king's own pieces.
pub fn smothered_mate(board: &Board) -> bool {
    let loser = board.side_to_move();
    let king = board.king_square(loser);

    let knight_check = board
        .checkers()
        .into_iter()
        .any(|sq| board.piece_on(sq) == Some(Piece::Knight));
    if !knight_check {
        return false;
    }

    chess::get_king_moves(king)
        .into_iter()
        .all(|sq| board.color_on(sq) == Some(loser))
}

/// Knight, bishop or pawn mates given by a single checker.
pub fn mating_piece(board: &Board) -> Option<MatePattern> {
    if !is_checkmate(board) || board.checkers().popcnt() != 1 {
        return None;
    }
    let checker = board.checkers().into_iter().next()?;
    match board.piece_on(checker)? {
        Piece::Knight => Some(MatePattern::KnightMate),
        Piece::Bishop => Some(MatePattern::BishopMate),
        Piece::Pawn => Some(MatePattern::PawnMate),
        Piece::Rook | Piece::Queen | Piece::King => None,
    }
}

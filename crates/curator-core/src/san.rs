//! SAN move resolution against a `chess::Board`.

use chess::{Board, ChessMove, File, MoveGen, Piece, Rank, Square};

/// Resolve a SAN token (`Nbd7`, `exd6`, `e8=Q+`, `O-O-O`) to the legal move it names.
///
/// Returns a short reason on failure; callers attach the ply.
pub fn find_san_move(board: &Board, san: &str) -> Result<ChessMove, String> {
    let clean = san.trim_end_matches(|c: char| matches!(c, '+' | '#' | '!' | '?'));

    let legal_moves: Vec<ChessMove> = MoveGen::new_legal(board).collect();

    if clean == "O-O" || clean == "0-0" {
        return find_castle(board, &legal_moves, true)
            .ok_or_else(|| "no kingside castling move".to_string());
    }
    if clean == "O-O-O" || clean == "0-0-0" {
        return find_castle(board, &legal_moves, false)
            .ok_or_else(|| "no queenside castling move".to_string());
    }

    let bytes = clean.as_bytes();
    if bytes.is_empty() {
        return Err("empty SAN".to_string());
    }

    let (piece, rest) = if bytes[0].is_ascii_uppercase() {
        let p = match bytes[0] {
            b'K' => Piece::King,
            b'Q' => Piece::Queen,
            b'R' => Piece::Rook,
            b'B' => Piece::Bishop,
            b'N' => Piece::Knight,
            other => return Err(format!("unknown piece '{}'", other as char)),
        };
        (p, &clean[1..])
    } else {
        (Piece::Pawn, clean)
    };

    let (rest, promotion) = match rest.find('=') {
        Some(eq_pos) => {
            let promo = match rest.as_bytes().get(eq_pos + 1) {
                Some(b'Q') => Piece::Queen,
                Some(b'R') => Piece::Rook,
                Some(b'B') => Piece::Bishop,
                Some(b'N') => Piece::Knight,
                _ => return Err("bad promotion piece".to_string()),
            };
            (&rest[..eq_pos], Some(promo))
        }
        None => (rest, None),
    };

    let rest = rest.replace('x', "");
    let rest_bytes = rest.as_bytes();
    if rest_bytes.len() < 2 {
        return Err("SAN too short".to_string());
    }

    let dest = parse_square(&rest[rest.len() - 2..]).ok_or_else(|| "bad destination".to_string())?;
    let disambig = &rest_bytes[..rest_bytes.len() - 2];

    let candidates: Vec<ChessMove> = legal_moves
        .into_iter()
        .filter(|m| {
            m.get_dest() == dest
                && board.piece_on(m.get_source()) == Some(piece)
                && m.get_promotion() == promotion
        })
        .filter(|m| {
            let src = m.get_source();
            disambig.iter().all(|&b| match b {
                b'a'..=b'h' => src.get_file().to_index() == (b - b'a') as usize,
                b'1'..=b'8' => src.get_rank().to_index() == (b - b'1') as usize,
                _ => true,
            })
        })
        .collect();

    match candidates.as_slice() {
        [m] => Ok(*m),
        [] => Err("no legal move matches".to_string()),
        many => Err(format!("ambiguous ({} candidates)", many.len())),
    }
}

fn find_castle(board: &Board, legal_moves: &[ChessMove], kingside: bool) -> Option<ChessMove> {
    legal_moves.iter().copied().find(|m| {
        if board.piece_on(m.get_source()) != Some(Piece::King) {
            return false;
        }
        let src = m.get_source().get_file().to_index() as i32;
        let dst = m.get_dest().get_file().to_index() as i32;
        if kingside {
            dst - src == 2
        } else {
            src - dst == 2
        }
    })
}

/// Parse an algebraic square name such as `e4`.
pub fn parse_square(name: &str) -> Option<Square> {
    let bytes = name.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let (file, rank) = (bytes[0], bytes[1]);
    if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
        return None;
    }
    Some(Square::make_square(
        Rank::from_index((rank - b'1') as usize),
        File::from_index((file - b'a') as usize),
    ))
}

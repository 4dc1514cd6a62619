/// Greek gift shapes: White's bishop takes the h6/h7 pawn and is taken back
/// at once by the king or a pawn. Soundness is not assessed.

use chess::{Color, Piece, Square};
use curator_core::game_data::{Game, Ply};

use crate::finding::{MotifFinding, MotifKind};

const TARGETS: [Square; 2] = [Square::H7, Square::H6];

pub fn greek_gifts(game: &Game) -> Vec<MotifFinding> {
    let last = game.last_ply();
    game.plies
        .windows(2)
        .filter(|pair| pair[0].index != 1 && pair[0].index + 2 <= last)
        .filter(|pair| is_greek_gift(&pair[0], &pair[1]))
        .map(|pair| {
            let sac = &pair[0];
            MotifFinding::at(MotifKind::GreekGiftCandidate, game, sac, sac.index)
                .with_evidence(&sac.board_before, [sac.chess_move.get_source(), sac.chess_move.get_dest()])
        })
        .collect()
}

fn is_greek_gift(sac: &Ply, reply: &Ply) -> bool {
    let dest = sac.chess_move.get_dest();
    let bishop_takes_pawn = sac.mover() == Color::White
        && sac.moved == Piece::Bishop
        && sac.captured == Some(Piece::Pawn)
        && TARGETS.contains(&dest);
    if !bishop_takes_pawn {
        return false;
    }

    reply.chess_move.get_dest() == dest
        && reply.captured == Some(Piece::Bishop)
        && matches!(reply.moved, Piece::King | Piece::Pawn)
}

use curator_core::game_data::{Game, GameMetadata, GameRecord, Ply, RecordedMove, Score};

/// Replay SAN moves from a FEN into plies.
pub(crate) fn line(fen: &str, sans: &[&str]) -> Vec<Ply> {
    game(fen, sans, &[]).plies
}

/// Replay a game from a FEN with optional per-ply evaluations (white-relative centipawns).
pub(crate) fn game(fen: &str, sans: &[&str], evals: &[Option<i32>]) -> Game {
    let record = GameRecord {
        metadata: GameMetadata {
            white: "White".into(),
            black: "Black".into(),
            result: "*".into(),
            site: Some("https://lichess.org/testgame".into()),
            ..Default::default()
        },
        start_fen: Some(fen.to_string()),
        moves: sans
            .iter()
            .enumerate()
            .map(|(i, s)| RecordedMove {
                san: s.to_string(),
                eval: evals.get(i).copied().flatten().map(Score::Cp),
            })
            .collect(),
    };
    Game::replay(record).unwrap()
}

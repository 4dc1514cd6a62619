#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use curator_core::game_data::{Game, GameMetadata, GameRecord, Ply, RecordedMove, Score};
use motif_detector::classify::{classify_game, GameReport};
use motif_detector::oracle::{EngineOracle, MastersDatabase, OracleCache, OracleError};
use motif_detector::sacrifice::{Oracles, Thresholds};

pub const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Build a record from SAN moves with the same white-relative eval on every ply.
pub fn record(site: &str, fen: &str, sans: &[&str], eval_cp: Option<i32>) -> GameRecord {
    GameRecord {
        metadata: GameMetadata {
            white: "Alice".into(),
            black: "Bob".into(),
            result: "*".into(),
            site: Some(site.to_string()),
            ..Default::default()
        },
        start_fen: Some(fen.to_string()),
        moves: sans
            .iter()
            .map(|san| RecordedMove {
                san: san.to_string(),
                eval: eval_cp.map(Score::Cp),
            })
            .collect(),
    }
}

pub fn game(fen: &str, sans: &[&str], eval_cp: Option<i32>) -> Game {
    Game::replay(record("https://lichess.org/fixture1", fen, sans, eval_cp)).expect("fixture replays")
}

pub fn line(fen: &str, sans: &[&str]) -> Vec<Ply> {
    game(fen, sans, None).plies
}

/// Italian opening where White gives the c4 bishop on f7 for a pawn.
///
/// `tempo` adds six pawn moves before the shuffle so the bishop lands on
/// ply 201 instead of 195. The game is always 250 plies long.
pub fn late_bishop_sacrifice(tempo: bool) -> Vec<&'static str> {
    let mut sans = vec!["e4", "e5", "Nf3", "Nc6", "Bc4", "Nf6"];
    if tempo {
        sans.extend(["h3", "h6", "a3", "a6", "b3", "b6"]);
    }
    for _ in 0..47 {
        sans.extend(["Ng1", "Ng8", "Nf3", "Nf6"]);
    }
    sans.extend(["Bxf7+", "Kxf7", "d3", "d6", "O-O", "Be7"]);
    while sans.len() < 250 {
        sans.extend(["Re1", "Re8", "Rf1", "Rh8"]);
    }
    sans.truncate(250);
    sans
}

/// Same sacrifice early in the game: bishop on ply 7, game 16 plies long.
pub fn early_bishop_sacrifice() -> Vec<&'static str> {
    vec![
        "e4", "e5", "Nf3", "Nc6", "Bc4", "Nf6", "Bxf7+", "Kxf7", "d3", "d6", "O-O", "Be7", "h3", "h6", "a3", "a6",
    ]
}

/// Masters database returning a fixed count, counting calls.
#[derive(Default)]
pub struct FakeMasters {
    pub count: u32,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakeMasters {
    pub fn with_count(count: u32) -> Self {
        Self { count, ..Default::default() }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MastersDatabase for FakeMasters {
    async fn lookup(&self, _fen: &str) -> Result<u32, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Give concurrent callers a chance to pile up on the same key
        tokio::time::sleep(Duration::from_millis(5)).await;
        if self.fail {
            return Err(OracleError::Unavailable("HTTP 429".into()));
        }
        Ok(self.count)
    }
}

/// Engine oracle with a fixed verdict, counting calls.
#[derive(Default)]
pub struct FakeEngine {
    pub only_move: bool,
    pub calls: AtomicUsize,
}

impl FakeEngine {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EngineOracle for FakeEngine {
    async fn is_uniquely_nonlosing(
        &self,
        _fen: &str,
        _played: &str,
        _lines: u32,
        _think_time: Duration,
    ) -> Result<bool, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.only_move)
    }
}

pub async fn classify(game: &Game, masters: &FakeMasters, engine: &FakeEngine, cache: &OracleCache) -> GameReport {
    let oracles = Oracles { masters, engine, cache };
    classify_game(game, oracles, &Thresholds::default())
        .await
        .expect("classification succeeds")
}

//! Batch classification over many games.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use curator_core::error::GameError;
use curator_core::game_data::Game;
use curator_core::pgn::{extract_header, parse_pgn, split_games};
use motif_detector::classify::{classify_game, GameReport};
use motif_detector::error::MotifError;
use motif_detector::oracle::{EngineOracle, MastersDatabase, OracleCache};
use motif_detector::sacrifice::{Oracles, Thresholds};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::report::CuratorReport;

/// One game of the input, replayed or not.
pub struct GameInput {
    pub index: usize,
    pub site: Option<String>,
    pub game: Result<Game, GameError>,
}

/// The PGN file itself, or every `*.pgn` in a directory (sorted).
pub fn pgn_files(path: &Path) -> Result<Vec<PathBuf>, WorkerError> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let pattern = format!("{}/*.pgn", path.display());
    let mut files: Vec<PathBuf> = glob::glob(&pattern)?.filter_map(|p| p.ok()).collect();
    files.sort();
    if files.is_empty() {
        return Err(WorkerError::Config("No PGN files found in PGN_PATH"));
    }
    Ok(files)
}

/// Split PGN texts into games, keep those the config selects, and replay them.
pub fn read_games(texts: impl IntoIterator<Item = String>, config: &WorkerConfig) -> Vec<GameInput> {
    texts
        .into_iter()
        .flat_map(|text| split_games(&text))
        .filter(|pgn| config.selects(extract_header(pgn, "Site").as_deref()))
        .take(config.max_games.unwrap_or(usize::MAX))
        .enumerate()
        .map(|(index, pgn)| GameInput {
            index,
            site: extract_header(&pgn, "Site"),
            game: parse_pgn(&pgn).and_then(Game::replay),
        })
        .collect()
}

pub fn load_games(config: &WorkerConfig) -> Result<Vec<GameInput>, WorkerError> {
    let mut texts = Vec::new();
    for file in pgn_files(&config.pgn_path)? {
        info!(file = %file.display(), "Reading PGN");
        texts.push(std::fs::read_to_string(&file)?);
    }
    Ok(read_games(texts, config))
}

/// Classify every game with at most `num_workers` in flight.
pub async fn run<M, E>(
    games: Vec<GameInput>,
    masters: Arc<M>,
    engine: Arc<E>,
    cache: Arc<OracleCache>,
    thresholds: Thresholds,
    num_workers: usize,
) -> Result<CuratorReport, WorkerError>
where
    M: MastersDatabase + 'static,
    E: EngineOracle + 'static,
{
    let semaphore = Arc::new(Semaphore::new(num_workers.max(1)));
    let thresholds = Arc::new(thresholds);
    let mut report = CuratorReport::default();
    let mut inputs = Vec::with_capacity(games.len());
    let mut handles = Vec::with_capacity(games.len());

    for input in games {
        let game = match input.game {
            Ok(game) => game,
            Err(e) => {
                warn!(game = input.index, site = ?input.site, error = %e, "Skipping unreadable game");
                report.add_failure(input.index, input.site, e.to_string());
                continue;
            }
        };

        let permit = semaphore.clone().acquire_owned().await.map_err(|_| WorkerError::Config("worker pool closed"))?;
        let (masters, engine, cache, thresholds) = (masters.clone(), engine.clone(), cache.clone(), thresholds.clone());

        inputs.push((input.index, input.site));
        handles.push(tokio::spawn(async move {
            let _permit = permit; // Hold until done
            let oracles = Oracles {
                masters: &*masters,
                engine: &*engine,
                cache: &*cache,
            };
            classify_game(&game, oracles, &thresholds).await
        }));
    }

    let mut outcomes: Vec<(usize, Option<String>, Result<GameReport, String>)> = Vec::with_capacity(inputs.len());
    for ((index, site), joined) in inputs.into_iter().zip(futures::future::join_all(handles).await) {
        let result = match joined {
            Ok(classified) => classified.map_err(|e: MotifError| e.to_string()),
            Err(e) => Err(format!("classification task failed: {e}")),
        };
        outcomes.push((index, site, result));
    }
    outcomes.sort_by_key(|(index, _, _)| *index);

    for (index, site, result) in outcomes {
        match result {
            Ok(game_report) => report.add_game(game_report),
            Err(message) => {
                error!(game = index, site = ?site, error = %message, "Classification failed");
                report.add_failure(index, site, message);
            }
        }
    }
    report.errors.sort_by_key(|failure| failure.game);

    info!(
        games = report.games_checked,
        candidates = report.candidates.len(),
        greek_gifts = report.greek_gifts.len(),
        mates = report.mates.len(),
        unverified = report.unverified.len(),
        errors = report.errors.len(),
        cached_positions = cache.masters_len().await,
        "Run complete"
    );
    Ok(report)
}

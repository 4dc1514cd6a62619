//! Worker configuration from environment variables and command-line flags

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use motif_detector::sacrifice::Thresholds;

use crate::engine_oracle::EngineLimits;
use crate::error::WorkerError;

/// Flags that override or narrow the environment configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// `--games id1,id2`: only games whose Site ends with one of these ids
    pub games: Option<Vec<String>>,
    /// `--pgn path`: overrides PGN_PATH
    pub pgn: Option<PathBuf>,
}

impl CliArgs {
    pub fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let args: Vec<String> = args.into_iter().collect();
        let mut cli = CliArgs::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--games" => {
                    cli.games = args.get(i + 1).map(|ids| {
                        ids.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    });
                    i += 2;
                }
                "--pgn" => {
                    cli.pgn = args.get(i + 1).map(PathBuf::from);
                    i += 2;
                }
                _ => i += 1,
            }
        }
        cli
    }
}

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// PGN file, or a directory of `*.pgn` files
    pub pgn_path: PathBuf,

    /// Where the JSON report is written
    pub output_path: PathBuf,

    /// Path to Stockfish binary
    pub stockfish_path: String,

    pub engine_think_ms: u64,
    pub engine_lines: u32,

    /// Slack on top of the think time before a search counts as hung
    pub engine_grace_ms: u64,
    pub engine_retries: u32,
    pub engine_backoff_ms: u64,

    /// Masters opening explorer endpoint
    pub explorer_url: String,
    pub explorer_pause_ms: u64,
    pub explorer_backoff_ms: u64,
    pub explorer_max_retries: u32,

    pub material_adv_threshold: i32,
    pub winning_eval_threshold: i32,
    pub masters_min_games: u32,

    /// Games classified concurrently (also the number of engine processes)
    pub num_workers: usize,
    pub max_games: Option<usize>,
    pub game_ids: Option<Vec<String>>,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    pub fn load(cli: &CliArgs) -> Result<Self, WorkerError> {
        Self::from_lookup(|key| env::var(key).ok(), cli)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>, cli: &CliArgs) -> Result<Self, WorkerError> {
        let pgn_path = cli
            .pgn
            .clone()
            .or_else(|| lookup("PGN_PATH").map(PathBuf::from))
            .ok_or(WorkerError::Config("PGN_PATH not set (or pass --pgn)"))?;

        let output_path = lookup("OUTPUT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("curator-report.json"));

        let stockfish_path = lookup("STOCKFISH_PATH").unwrap_or_else(|| "/usr/local/bin/stockfish".to_string());

        let explorer_url =
            lookup("EXPLORER_URL").unwrap_or_else(|| "https://explorer.lichess.ovh/master".to_string());

        let num_workers = parsed(&lookup, "NUM_WORKERS").filter(|&n: &usize| n > 0).unwrap_or_else(num_cpus::get);

        let config = Self {
            pgn_path,
            output_path,
            stockfish_path,
            engine_think_ms: parsed(&lookup, "ENGINE_THINK_MS").unwrap_or(3000),
            engine_lines: parsed(&lookup, "ENGINE_LINES").unwrap_or(5),
            engine_grace_ms: parsed(&lookup, "ENGINE_GRACE_MS").unwrap_or(10_000),
            engine_retries: parsed(&lookup, "ENGINE_RETRIES").unwrap_or(2),
            engine_backoff_ms: parsed(&lookup, "ENGINE_BACKOFF_MS").unwrap_or(1000),
            explorer_url,
            explorer_pause_ms: parsed(&lookup, "EXPLORER_PAUSE_MS").unwrap_or(500),
            explorer_backoff_ms: parsed(&lookup, "EXPLORER_BACKOFF_MS").unwrap_or(10_000),
            explorer_max_retries: parsed(&lookup, "EXPLORER_MAX_RETRIES").unwrap_or(5),
            material_adv_threshold: parsed(&lookup, "MATERIAL_ADV_THRESHOLD").unwrap_or(2),
            winning_eval_threshold: parsed(&lookup, "WINNING_EVAL_THRESHOLD").unwrap_or(300),
            masters_min_games: parsed(&lookup, "MASTERS_MIN_GAMES").unwrap_or(3),
            num_workers,
            max_games: parsed(&lookup, "MAX_GAMES"),
            game_ids: cli.games.clone(),
        };

        if config.engine_lines == 0 {
            return Err(WorkerError::Config("ENGINE_LINES must be at least 1"));
        }
        Ok(config)
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            material_adv_threshold: self.material_adv_threshold,
            winning_eval_threshold: self.winning_eval_threshold,
            masters_min_games: self.masters_min_games,
            engine_lines: self.engine_lines,
            think_time: Duration::from_millis(self.engine_think_ms),
        }
    }

    pub fn engine_limits(&self) -> EngineLimits {
        EngineLimits {
            grace: Duration::from_millis(self.engine_grace_ms),
            retries: self.engine_retries,
            backoff: Duration::from_millis(self.engine_backoff_ms),
        }
    }

    /// Does the `--games` filter (if any) select a game with this Site?
    pub fn selects(&self, site: Option<&str>) -> bool {
        match (&self.game_ids, site) {
            (None, _) => true,
            (Some(ids), Some(site)) => ids.iter().any(|id| site.ends_with(id.as_str())),
            (Some(_), None) => false,
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

//! Worker error types

use curator_core::error::GameError;
use motif_detector::error::MotifError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stockfish error: {0}")]
    Stockfish(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Game error: {0}")]
    Game(#[from] GameError),

    #[error("Classification error: {0}")]
    Motif(#[from] MotifError),

    #[error("Bad PGN path pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

//! Game loading errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Invalid move at ply {ply}: {san} ({reason})")]
    InvalidMove {
        ply: usize,
        san: String,
        reason: String,
    },

    #[error("Game has no moves")]
    EmptyGame,
}

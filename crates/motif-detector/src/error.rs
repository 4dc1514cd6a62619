//! Classifier error types

use thiserror::Error;

use crate::oracle::OracleError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MotifError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Missing evaluation at ply {0}")]
    MissingEvaluation(usize),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),
}

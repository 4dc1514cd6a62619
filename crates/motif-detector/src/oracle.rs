//! External oracles consulted by the sacrifice classifier, and the run-owned
//! cache in front of them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

/// Evaluation at or below which a move counts as losing for the mover.
pub const LOSING_THRESHOLD: i32 = -300;
/// Margin by which another move must trail the played move to be "worse".
pub const WORSE_MARGIN: i32 = 300;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Masters database unavailable: {0}")]
    Unavailable(String),

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),
}

/// Number of master games that reached a position.
pub trait MastersDatabase: Send + Sync {
    fn lookup(&self, fen: &str) -> impl Future<Output = Result<u32, OracleError>> + Send;
}

/// Engine verdict on whether the played move was the only one that does not lose.
pub trait EngineOracle: Send + Sync {
    fn is_uniquely_nonlosing(
        &self,
        fen: &str,
        played: &str,
        lines: u32,
        think_time: Duration,
    ) -> impl Future<Output = Result<bool, OracleError>> + Send;
}

/// One engine candidate line: first move in UCI and its score for the mover
/// (mates folded onto the 100000 scale).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLine {
    pub uci: String,
    pub score: i32,
}

/// Is `played` the only non-losing move among `lines` (best first)?
///
/// Another line is non-losing unless it scores at or below
/// `LOSING_THRESHOLD` or trails the played move by more than `WORSE_MARGIN`.
pub fn uniquely_nonlosing(lines: &[EngineLine], played: &str, played_score: i32) -> bool {
    let Some(top) = lines.first() else {
        return true;
    };
    let played_cpl = top.score - played_score;

    !lines.iter().any(|line| {
        let move_cpl = top.score - line.score;
        let losing = line.score <= LOSING_THRESHOLD;
        let worse_than_played = move_cpl - played_cpl > WORSE_MARGIN;
        line.uci != played && !losing && !worse_than_played
    })
}

/// Caches oracle answers for the lifetime of one run.
///
/// Each key gets one cell; concurrent callers for the same key wait on a
/// single in-flight call. Failed calls leave the cell empty so a later
/// caller retries.
#[derive(Default)]
pub struct OracleCache {
    masters: Mutex<HashMap<String, Arc<OnceCell<u32>>>>,
    verdicts: Mutex<HashMap<(String, String), Arc<OnceCell<bool>>>>,
}

impl OracleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn masters_count<M: MastersDatabase>(&self, oracle: &M, fen: &str) -> Result<u32, OracleError> {
        let cell = self.masters.lock().await.entry(fen.to_string()).or_default().clone();
        if let Some(count) = cell.get() {
            debug!(fen, count, "masters cache hit");
        }
        cell.get_or_try_init(|| oracle.lookup(fen)).await.copied()
    }

    pub async fn nonlosing_verdict<E: EngineOracle>(
        &self,
        oracle: &E,
        fen: &str,
        played: &str,
        lines: u32,
        think_time: Duration,
    ) -> Result<bool, OracleError> {
        let key = (fen.to_string(), played.to_string());
        let cell = self.verdicts.lock().await.entry(key).or_default().clone();
        cell.get_or_try_init(|| oracle.is_uniquely_nonlosing(fen, played, lines, think_time))
            .await
            .copied()
    }

    /// Number of positions with a cached masters count.
    pub async fn masters_len(&self) -> usize {
        let cells: Vec<_> = self.masters.lock().await.values().cloned().collect();
        cells.iter().filter(|c| c.initialized()).count()
    }
}

//! Engine oracle backed by a pool of Stockfish processes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use motif_detector::oracle::{uniquely_nonlosing, EngineLine, EngineOracle, OracleError};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::WorkerError;
use crate::stockfish::{EngineCommand, PvLine, StockfishEngine};

/// Deadlines and retry budget for engine searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    /// Slack on top of the think time before a search counts as hung
    pub grace: Duration,
    /// Extra attempts after a failed search
    pub retries: u32,
    /// Pause before the first retry, doubled for each further one
    pub backoff: Duration,
}

pub struct EnginePool {
    command: EngineCommand,
    engines: Vec<Arc<Mutex<StockfishEngine>>>,
    next: AtomicUsize,
    limits: EngineLimits,
}

impl EnginePool {
    /// Spawn `size` engines (at least one).
    pub async fn spawn(command: EngineCommand, size: usize, limits: EngineLimits) -> Result<Self, WorkerError> {
        let mut engines = Vec::with_capacity(size.max(1));
        for i in 0..size.max(1) {
            let engine = StockfishEngine::new(&command).await?;
            info!(engine_id = i, "Stockfish engine ready");
            engines.push(Arc::new(Mutex::new(engine)));
        }
        Ok(Self {
            command,
            engines,
            next: AtomicUsize::new(0),
            limits,
        })
    }

    /// Next engine, round-robin.
    fn checkout(&self) -> Arc<Mutex<StockfishEngine>> {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.engines.len();
        self.engines[i].clone()
    }

    /// One bounded search. A search that fails or overruns leaves the engine
    /// drained or replaced before this returns.
    async fn search(
        &self,
        engine: &mut StockfishEngine,
        fen: &str,
        think_time: Duration,
        lines: u32,
        searchmoves: Option<&str>,
    ) -> Result<Vec<EngineLine>, OracleError> {
        let deadline = think_time + self.limits.grace;
        let movetime_ms = think_time.as_millis() as u64;
        let failure = match timeout(deadline, engine.analyse(fen, movetime_ms, lines, searchmoves)).await {
            Ok(Ok(pv_lines)) => return Ok(engine_lines(&pv_lines)),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("search exceeded {deadline:?}"),
        };

        self.recover(engine, deadline).await;
        Err(OracleError::EngineUnavailable(failure))
    }

    /// Stop and drain the engine, or restart it when it does not answer in time.
    async fn recover(&self, engine: &mut StockfishEngine, deadline: Duration) {
        match timeout(deadline, engine.stop()).await {
            Ok(Ok(())) => debug!("Engine drained after failed search"),
            Ok(Err(e)) => {
                warn!(error = %e, "Engine lost, restarting");
                self.restart(engine).await;
            }
            Err(_) => {
                warn!("Engine did not stop, restarting");
                self.restart(engine).await;
            }
        }
    }

    async fn restart(&self, engine: &mut StockfishEngine) {
        match StockfishEngine::new(&self.command).await {
            // The old process is killed when dropped
            Ok(fresh) => *engine = fresh,
            Err(e) => error!(error = %e, "Engine restart failed"),
        }
    }

    async fn verdict(
        &self,
        engine: &mut StockfishEngine,
        fen: &str,
        played: &str,
        lines: u32,
        think_time: Duration,
    ) -> Result<bool, OracleError> {
        let candidates = self.search(engine, fen, think_time, lines, None).await?;
        let Some(top) = candidates.first() else {
            return Err(OracleError::EngineUnavailable(format!("no lines for {fen}")));
        };

        let played_score = if top.uci == played {
            top.score
        } else {
            // Score the played move on its own
            let restricted = self.search(engine, fen, think_time, 1, Some(played)).await?;
            restricted
                .first()
                .map(|line| line.score)
                .ok_or_else(|| OracleError::EngineUnavailable(format!("no line for {played}")))?
        };

        let verdict = uniquely_nonlosing(&candidates, played, played_score);
        debug!(fen, played, played_score, verdict, "Engine verdict");
        Ok(verdict)
    }

    pub async fn quit(&self) {
        info!("Shutting down Stockfish engines");
        for engine in &self.engines {
            engine.lock().await.quit().await;
        }
    }
}

fn engine_lines(pv_lines: &[PvLine]) -> Vec<EngineLine> {
    pv_lines
        .iter()
        .filter_map(|line| {
            Some(EngineLine {
                uci: line.first_move()?.to_string(),
                score: line.score()?,
            })
        })
        .collect()
}

impl EngineOracle for EnginePool {
    async fn is_uniquely_nonlosing(
        &self,
        fen: &str,
        played: &str,
        lines: u32,
        think_time: Duration,
    ) -> Result<bool, OracleError> {
        let engine = self.checkout();
        let mut engine = engine.lock().await;
        let mut wait = self.limits.backoff;
        let mut attempt = 0;

        loop {
            match self.verdict(&mut engine, fen, played, lines, think_time).await {
                Ok(verdict) => return Ok(verdict),
                Err(e) if attempt >= self.limits.retries => return Err(e),
                Err(e) => {
                    attempt += 1;
                    warn!(attempt, wait_ms = wait.as_millis() as u64, error = %e, "Engine search failed, retrying");
                    tokio::time::sleep(wait).await;
                    wait *= 2;
                }
            }
        }
    }
}

use std::time::Duration;

use motif_detector::oracle::{MastersDatabase, OracleError};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::WorkerConfig;
use crate::error::WorkerError;

/// Totals from the masters opening explorer for one position.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct ExplorerTotals {
    pub white: u32,
    pub draws: u32,
    pub black: u32,
}

impl ExplorerTotals {
    pub fn games(&self) -> u32 {
        self.white + self.draws + self.black
    }
}

/// Masters database client for the Lichess opening explorer.
pub struct ExplorerClient {
    client: Client,
    url: String,
    pause: Duration,
    backoff: Duration,
    max_retries: u32,
}

impl ExplorerClient {
    pub fn new(config: &WorkerConfig) -> Result<Self, WorkerError> {
        let client = Client::builder()
            .user_agent("ChessCurator/1.0")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            url: config.explorer_url.clone(),
            pause: Duration::from_millis(config.explorer_pause_ms),
            backoff: Duration::from_millis(config.explorer_backoff_ms),
            max_retries: config.explorer_max_retries,
        })
    }

    /// Fetch totals for `fen`. Rate limiting, server errors and transport
    /// failures are retried with a doubling wait, at most `max_retries` times.
    async fn fetch_totals(&self, fen: &str) -> Result<ExplorerTotals, OracleError> {
        let params = [("fen", fen), ("topGames", "0"), ("moves", "30")];
        let mut wait = self.backoff;
        let mut attempt = 0;

        loop {
            let failure = match self.client.get(&self.url).query(&params).send().await {
                Err(e) => format!("Request error: {e}"),
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => "HTTP 429 rate limited".to_string(),
                Ok(resp) if resp.status().is_server_error() => format!("HTTP {}", resp.status()),
                Ok(resp) if !resp.status().is_success() => {
                    return Err(OracleError::Unavailable(format!("HTTP {}", resp.status())));
                }
                Ok(resp) => {
                    let totals: ExplorerTotals = resp
                        .json()
                        .await
                        .map_err(|e| OracleError::Unavailable(format!("Body read error: {e}")))?;
                    debug!(fen, games = totals.games(), "Explorer lookup");

                    // Rate limit
                    tokio::time::sleep(self.pause).await;
                    return Ok(totals);
                }
            };

            if attempt == self.max_retries {
                return Err(OracleError::Unavailable(format!(
                    "{failure} (gave up after {} retries)",
                    self.max_retries
                )));
            }
            attempt += 1;
            warn!(attempt, wait_ms = wait.as_millis() as u64, error = %failure, "Explorer request failed, backing off");
            tokio::time::sleep(wait).await;
            wait *= 2;
        }
    }
}

impl MastersDatabase for ExplorerClient {
    async fn lookup(&self, fen: &str) -> Result<u32, OracleError> {
        self.fetch_totals(fen).await.map(|t| t.games())
    }
}

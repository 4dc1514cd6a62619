//! Chess curator worker
//!
//! Classifies every game of a PGN file (or directory of PGN files) and writes
//! the findings as a JSON report.

use std::sync::Arc;

use curator_worker::config::{CliArgs, WorkerConfig};
use curator_worker::engine_oracle::EnginePool;
use curator_worker::stockfish::EngineCommand;
use curator_worker::explorer::ExplorerClient;
use curator_worker::runner::{load_games, run};
use motif_detector::oracle::OracleCache;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let cli = CliArgs::parse(std::env::args());
    let config = WorkerConfig::load(&cli)?;
    info!(
        pgn_path = %config.pgn_path.display(),
        stockfish_path = %config.stockfish_path,
        num_workers = config.num_workers,
        "Worker config loaded"
    );

    let games = load_games(&config)?;
    info!(games = games.len(), "Games loaded");

    let masters = Arc::new(ExplorerClient::new(&config)?);
    let command = EngineCommand::new(config.stockfish_path.clone());
    let engines = Arc::new(EnginePool::spawn(command, config.num_workers, config.engine_limits()).await?);
    let cache = Arc::new(OracleCache::new());

    let report = run(games, masters, engines.clone(), cache, config.thresholds(), config.num_workers).await?;

    report.write(&config.output_path)?;
    info!(output = %config.output_path.display(), "Report written");

    engines.quit().await;
    Ok(())
}

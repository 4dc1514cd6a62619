pub mod config;
pub mod engine_oracle;
pub mod error;
pub mod explorer;
pub mod report;
pub mod runner;
pub mod stockfish;

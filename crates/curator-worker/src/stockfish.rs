//! Stockfish engine wrapper using UCI protocol (async I/O)

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use curator_core::game_data::mate_centipawns;
use tracing::debug;

use crate::error::WorkerError;

/// A single PV line from multi-PV analysis
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PvLine {
    /// Principal variation moves
    pub pv: Vec<String>,
    /// Centipawn score, side to move
    pub cp: Option<i32>,
    /// Mate in N, side to move
    pub mate: Option<i32>,
}

impl PvLine {
    pub fn first_move(&self) -> Option<&str> {
        self.pv.first().map(String::as_str)
    }

    /// Score on the centipawn scale, mates folded onto `MATE_SCORE`.
    pub fn score(&self) -> Option<i32> {
        self.mate.map(mate_centipawns).or(self.cp)
    }
}

/// How to launch an engine process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl EngineCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Stockfish engine instance
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StockfishEngine {
    /// Spawn a new Stockfish process and initialize UCI
    pub async fn new(command: &EngineCommand) -> Result<Self, WorkerError> {
        let mut process = Command::new(&command.program)
            .args(&command.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WorkerError::Stockfish(format!("Failed to spawn Stockfish: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| WorkerError::Stockfish("Stockfish stdin unavailable".into()))?;
        let stdout = process
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| WorkerError::Stockfish("Stockfish stdout unavailable".into()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout,
        };

        // Initialize UCI
        engine.send("uci").await?;
        engine.wait_for("uciok").await?;

        // Configure for analysis
        engine.send("setoption name Threads value 1").await?;
        engine.send("setoption name Hash value 256").await?;
        engine.send("setoption name UCI_AnalyseMode value true").await?;
        engine.send("isready").await?;
        engine.wait_for("readyok").await?;

        Ok(engine)
    }

    /// Send a command to Stockfish
    async fn send(&mut self, cmd: &str) -> Result<(), WorkerError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| WorkerError::Stockfish(format!("Failed to write to Stockfish: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| WorkerError::Stockfish(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    async fn read_line(&mut self, line: &mut String) -> Result<(), WorkerError> {
        line.clear();
        let n = self
            .stdout
            .read_line(line)
            .await
            .map_err(|e| WorkerError::Stockfish(format!("Failed to read from Stockfish: {e}")))?;
        if n == 0 {
            return Err(WorkerError::Stockfish("Stockfish closed its output".into()));
        }
        Ok(())
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), WorkerError> {
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();
            debug!(line = trimmed, "SF >");
            if trimmed == expected {
                return Ok(());
            }
        }
    }

    /// Search a position for `movetime_ms` with `multipv` lines, optionally
    /// restricted to `searchmoves`. Lines come back best first.
    pub async fn analyse(
        &mut self,
        fen: &str,
        movetime_ms: u64,
        multipv: u32,
        searchmoves: Option<&str>,
    ) -> Result<Vec<PvLine>, WorkerError> {
        self.send("ucinewgame").await?;
        self.send(&format!("setoption name MultiPV value {multipv}")).await?;
        self.send(&format!("position fen {fen}")).await?;
        match searchmoves {
            Some(moves) => self.send(&format!("go movetime {movetime_ms} searchmoves {moves}")).await?,
            None => self.send(&format!("go movetime {movetime_ms}")).await?,
        }

        let mut lines = vec![PvLine::default(); multipv.max(1) as usize];
        let mut line = String::new();

        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();

            if trimmed.starts_with("info") && trimmed.contains(" pv ") {
                // Parse multipv index (1-based)
                let pv_idx = parse_multipv_index(trimmed).unwrap_or(1).saturating_sub(1) as usize;
                if let Some(entry) = lines.get_mut(pv_idx) {
                    entry.cp = parse_cp(trimmed);
                    entry.mate = parse_mate(trimmed);
                    entry.pv = parse_pv(trimmed);
                }
            } else if trimmed.starts_with("bestmove") {
                debug!(line = trimmed, "SF >");
                break;
            }
        }

        // Fewer legal moves than requested lines leaves trailing entries empty
        lines.retain(|l| !l.pv.is_empty());
        Ok(lines)
    }

    /// Abort a search left running and wait until the engine is idle again.
    ///
    /// Output of the aborted search is read up to its `bestmove` and thrown
    /// away, so the next search starts on a clean stream.
    pub async fn stop(&mut self) -> Result<(), WorkerError> {
        self.send("stop").await?;
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            if line.trim_start().starts_with("bestmove") {
                debug!(line = line.trim(), "SF > (discarded)");
                break;
            }
        }
        self.send("isready").await?;
        self.wait_for("readyok").await
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }
}

/// Parse centipawn score from info line
fn parse_cp(line: &str) -> Option<i32> {
    value_after(line, "cp")
}

/// Parse mate score from info line
fn parse_mate(line: &str) -> Option<i32> {
    value_after(line, "mate")
}

/// Parse multipv index from info line
fn parse_multipv_index(line: &str) -> Option<u32> {
    value_after(line, "multipv")
}

fn value_after<T: std::str::FromStr>(line: &str, keyword: &str) -> Option<T> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    parts
        .iter()
        .position(|part| *part == keyword)
        .and_then(|i| parts.get(i + 1))
        .and_then(|v| v.parse().ok())
}

/// Parse PV moves from info line
fn parse_pv(line: &str) -> Vec<String> {
    line.split_whitespace()
        .skip_while(|part| *part != "pv")
        .skip(1)
        .take_while(|part| !part.starts_with("bmc") && *part != "string")
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cp() {
        let line = "info depth 20 seldepth 25 multipv 1 score cp 35 nodes 100000 pv e2e4";
        assert_eq!(parse_cp(line), Some(35));
        assert_eq!(parse_multipv_index(line), Some(1));
    }

    #[test]
    fn test_parse_mate() {
        let line = "info depth 20 score mate 3 nodes 100000 pv e2e4";
        assert_eq!(parse_mate(line), Some(3));
        assert_eq!(parse_cp(line), None);
    }

    #[test]
    fn test_parse_pv() {
        let line = "info depth 20 score cp 35 pv e2e4 e7e5 g1f3";
        let pv = parse_pv(line);
        assert_eq!(pv, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn test_pv_line_score() {
        let mated = PvLine { pv: vec!["h2h3".into()], cp: None, mate: Some(-2) };
        assert_eq!(mated.score(), Some(-99_998));
        let mating = PvLine { pv: vec!["d1h5".into()], cp: None, mate: Some(3) };
        assert_eq!(mating.score(), Some(99_997));
        let level = PvLine { pv: vec!["e2e4".into()], cp: Some(-12), mate: None };
        assert_eq!(level.score(), Some(-12));
        assert_eq!(level.first_move(), Some("e2e4"));
    }
}

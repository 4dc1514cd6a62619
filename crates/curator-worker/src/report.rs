//! JSON report for a whole run

use std::path::Path;

use motif_detector::classify::GameReport;
use motif_detector::finding::{MotifFinding, MotifKind};
use motif_detector::sacrifice::{RejectionBuckets, UnverifiedCandidate};
use serde::Serialize;

use crate::error::WorkerError;

/// A game that could not be classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameFailure {
    /// Position of the game in the input, 0-based
    pub game: usize,
    pub link: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CuratorReport {
    pub games_checked: usize,
    pub candidates: Vec<MotifFinding>,
    pub greek_gifts: Vec<MotifFinding>,
    pub mates: Vec<MotifFinding>,
    /// Pins, traps, skewers and forks behind rejected candidates
    pub tactics: Vec<MotifFinding>,
    pub rejections: RejectionBuckets,
    pub unverified: Vec<UnverifiedCandidate>,
    pub missing_evaluations: Vec<String>,
    pub errors: Vec<GameFailure>,
}

impl CuratorReport {
    pub fn add_game(&mut self, report: GameReport) {
        self.games_checked += 1;
        for finding in report.findings {
            let bucket = match finding.kind {
                MotifKind::SacrificeCandidate => &mut self.candidates,
                MotifKind::GreekGiftCandidate => &mut self.greek_gifts,
                MotifKind::MatePattern(_) => &mut self.mates,
                MotifKind::AbsolutePin | MotifKind::Fork | MotifKind::Skewer | MotifKind::TrappedPieceCapture => {
                    &mut self.tactics
                }
            };
            bucket.push(finding);
        }
        self.rejections.extend(report.rejections);
        self.unverified.extend(report.unverified);
        self.missing_evaluations.extend(report.missing_evaluations);
    }

    pub fn add_failure(&mut self, game: usize, link: Option<String>, message: String) {
        self.errors.push(GameFailure { game, link, message });
    }

    pub fn to_json(&self) -> Result<String, WorkerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), WorkerError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

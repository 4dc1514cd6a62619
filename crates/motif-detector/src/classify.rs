//! Per-game classification entry point.

use tracing::{debug, info};

use curator_core::game_data::Game;

use crate::error::MotifError;
use crate::finding::{MotifFinding, MotifKind};
use crate::greek_gift::greek_gifts;
use crate::mate_patterns::classify_checkmate;
use crate::oracle::{EngineOracle, MastersDatabase};
use crate::sacrifice::{classify_sacrifices, Oracles, RejectionBuckets, Thresholds, UnverifiedCandidate};

/// Everything found in one game.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameReport {
    /// Findings ordered by ply, then kind
    pub findings: Vec<MotifFinding>,
    pub rejections: RejectionBuckets,
    pub unverified: Vec<UnverifiedCandidate>,
    pub missing_evaluations: Vec<String>,
}

impl GameReport {
    pub fn of_kind(&self, kind: MotifKind) -> impl Iterator<Item = &MotifFinding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }
}

pub async fn classify_game<M, E>(
    game: &Game,
    oracles: Oracles<'_, M, E>,
    thresholds: &Thresholds,
) -> Result<GameReport, MotifError>
where
    M: MastersDatabase,
    E: EngineOracle,
{
    let sacrifices = classify_sacrifices(game, oracles, thresholds).await?;

    let mut findings = sacrifices.candidates;
    findings.extend(sacrifices.tactics);
    findings.extend(greek_gifts(game));
    findings.extend(mate_findings(game));
    findings.sort_by(|a, b| a.ply.cmp(&b.ply).then(a.kind.cmp(&b.kind)));

    info!(
        site = game.metadata.site.as_deref().unwrap_or("?"),
        findings = findings.len(),
        rejected = sacrifices.rejections.total(),
        unverified = sacrifices.unverified.len(),
        "game classified"
    );

    Ok(GameReport {
        findings,
        rejections: sacrifices.rejections,
        unverified: sacrifices.unverified,
        missing_evaluations: sacrifices.missing_evaluations,
    })
}

/// One finding per pattern matched by the final position, if it is mate.
fn mate_findings(game: &Game) -> Vec<MotifFinding> {
    let Some(last) = game.plies.last() else {
        return Vec::new();
    };
    if !game.ended_in_checkmate() {
        return Vec::new();
    }

    let board = &last.board_after;
    let king = board.king_square(board.side_to_move());
    let patterns = classify_checkmate(board);
    debug!(link = %game.link(last.index), ?patterns, "checkmate");

    patterns
        .into_iter()
        .map(|pattern| {
            let evidence = std::iter::once(king).chain(*board.checkers());
            MotifFinding::at(MotifKind::MatePattern(pattern), game, last, last.index).with_evidence(board, evidence)
        })
        .collect()
}

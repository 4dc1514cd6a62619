//! Sacrifice candidate classifier.
//!
//! A candidate is a move whose piece the opponent captures on the next ply,
//! leaving the mover down material for the following six plies while the
//! evaluation drops by no more than the material given up. Candidates that
//! survive the material window pass through tactical and oracle filters;
//! every rejection by a filter is recorded in its own bucket.

use std::time::Duration;

use chess::{Color, Piece};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use curator_core::game_data::{Game, Ply};

use crate::board_utils::{is_check, material_diff, non_pawn_count, pawn_count};
use crate::error::MotifError;
use crate::finding::{MotifFinding, MotifKind};
use crate::oracle::{EngineOracle, MastersDatabase, OracleCache};
use crate::tactics::attacks::{fork, trapped_piece_capture};
use crate::tactics::line_geometry::skewer;
use crate::tactics::pins::captured_piece_was_abs_pinned;

/// Replies before this ply are never inspected.
pub const FIRST_INSPECTED_PLY: usize = 7;
/// Plies needed after the capturing reply to close the window.
pub const WINDOW_PLIES: usize = 6;
/// Server evaluations stop here, so later plies are never inspected.
pub const EVAL_HORIZON_PLY: usize = 200;

/// Checkpoints after the capturing reply: two, four and six plies after the candidate.
const CHECKPOINTS: [usize; 3] = [1, 3, 5];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thresholds {
    /// Pawn units ahead at which a side is "already winning on material".
    pub material_adv_threshold: i32,
    /// Centipawns beyond which the position is already decided.
    pub winning_eval_threshold: i32,
    /// Master games at which a position counts as known theory.
    pub masters_min_games: u32,
    pub engine_lines: u32,
    pub think_time: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            material_adv_threshold: 2,
            winning_eval_threshold: 300,
            masters_min_games: 3,
            engine_lines: 5,
            think_time: Duration::from_secs(3),
        }
    }
}

/// Links of candidates discarded by each filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionBuckets {
    pub abs_pinned: Vec<String>,
    pub trapped: Vec<String>,
    pub skewers: Vec<String>,
    pub forks: Vec<String>,
    pub theory: Vec<String>,
    pub nonlosing: Vec<String>,
}

impl RejectionBuckets {
    pub fn extend(&mut self, other: RejectionBuckets) {
        self.abs_pinned.extend(other.abs_pinned);
        self.trapped.extend(other.trapped);
        self.skewers.extend(other.skewers);
        self.forks.extend(other.forks);
        self.theory.extend(other.theory);
        self.nonlosing.extend(other.nonlosing);
    }

    pub fn total(&self) -> usize {
        self.abs_pinned.len()
            + self.trapped.len()
            + self.skewers.len()
            + self.forks.len()
            + self.theory.len()
            + self.nonlosing.len()
    }
}

/// A candidate an oracle could not rule on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnverifiedCandidate {
    pub link: String,
    pub movetext: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SacrificeReport {
    pub candidates: Vec<MotifFinding>,
    /// Pins, traps, skewers and forks found while filtering candidates
    pub tactics: Vec<MotifFinding>,
    pub rejections: RejectionBuckets,
    pub unverified: Vec<UnverifiedCandidate>,
    /// Links of plies whose missing evaluation stopped a window
    pub missing_evaluations: Vec<String>,
}

/// Oracles and the run-owned cache in front of them.
pub struct Oracles<'a, M, E> {
    pub masters: &'a M,
    pub engine: &'a E,
    pub cache: &'a OracleCache,
}

impl<M, E> Clone for Oracles<'_, M, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M, E> Copy for Oracles<'_, M, E> {}

/// Plies `n` of the capturing reply that get inspected in a game whose
/// recorded plies run from `first_ply` to `last_ply`. The candidate and the
/// move before it must be recorded too.
pub fn scan_range(first_ply: usize, last_ply: usize) -> impl Iterator<Item = usize> {
    (FIRST_INSPECTED_PLY.max(first_ply + 2)..).take_while(move |&n| n + WINDOW_PLIES <= last_ply && n < EVAL_HORIZON_PLY)
}

/// Screen every ply of `game` for sacrifice candidates.
///
/// Missing evaluations and oracle failures only affect the candidate at
/// hand; any other error aborts the game.
pub async fn classify_sacrifices<M, E>(
    game: &Game,
    oracles: Oracles<'_, M, E>,
    thresholds: &Thresholds,
) -> Result<SacrificeReport, MotifError>
where
    M: MastersDatabase,
    E: EngineOracle,
{
    let mut report = SacrificeReport::default();

    for n in scan_range(game.first_ply(), game.last_ply()) {
        match inspect_reply(game, n, oracles, thresholds, &mut report).await {
            Ok(()) => {}
            Err(MotifError::MissingEvaluation(ply)) => {
                debug!(link = %game.link(ply), "no evaluation, window skipped");
                report.missing_evaluations.push(game.link(ply));
            }
            Err(MotifError::Oracle(e)) => {
                let movetext = game.ply(n - 1).map(Ply::movetext).unwrap_or_default();
                warn!(link = %game.link(n - 1), error = %e, "candidate left unverified");
                report.unverified.push(UnverifiedCandidate {
                    link: game.link(n - 1),
                    movetext,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

/// Inspect the candidate played at ply `n - 1` and captured at ply `n`.
async fn inspect_reply<M, E>(
    game: &Game,
    n: usize,
    oracles: Oracles<'_, M, E>,
    thresholds: &Thresholds,
    report: &mut SacrificeReport,
) -> Result<(), MotifError>
where
    M: MastersDatabase,
    E: EngineOracle,
{
    let (Some(precan), Some(can), Some(capture)) = (game.ply(n - 2), game.ply(n - 1), game.ply(n)) else {
        return Ok(());
    };
    let side = can.mover();

    if !eligible(can, capture, side) {
        return Ok(());
    }
    let decided = eval_for(can, side)?.saturating_abs() > thresholds.winning_eval_threshold;
    if decided || material_diff(&can.board_before, side) >= thresholds.material_adv_threshold {
        return Ok(());
    }
    if !material_stays_down(game, n, precan, side)? {
        return Ok(());
    }

    let target = capture.chess_move.get_dest();

    if captured_piece_was_abs_pinned(can, capture) {
        report.rejections.abs_pinned.push(game.link(n - 1));
        report.tactics.push(
            MotifFinding::at(MotifKind::AbsolutePin, game, capture, n - 1).with_evidence(&capture.board_before, [target]),
        );
        return Ok(());
    }

    if trapped_piece_capture(can, capture)? {
        report.rejections.trapped.push(game.link(n - 2));
        report.tactics.push(
            MotifFinding::at(MotifKind::TrappedPieceCapture, game, capture, n - 2)
                .with_evidence(&capture.board_before, [target]),
        );
        return Ok(());
    }

    if skewer(can, capture)? {
        report.rejections.skewers.push(game.link(n - 1));
        report.tactics.push(
            MotifFinding::at(MotifKind::Skewer, game, capture, n - 1)
                .with_evidence(&can.board_before, [can.chess_move.get_source(), target]),
        );
        return Ok(());
    }

    if fork(precan) {
        report.rejections.forks.push(game.link(n - 2));
        report.tactics.push(
            MotifFinding::at(MotifKind::Fork, game, precan, n - 2)
                .with_evidence(&precan.board_after, [precan.chess_move.get_dest()]),
        );
        return Ok(());
    }

    let masters = oracles
        .cache
        .masters_count(oracles.masters, &capture.board_before.to_string())
        .await?;
    if masters >= thresholds.masters_min_games {
        debug!(link = %game.link(n - 1), masters, "candidate is known theory");
        report.rejections.theory.push(game.link(n - 1));
        return Ok(());
    }

    let only_move = oracles
        .cache
        .nonlosing_verdict(
            oracles.engine,
            &can.board_before.to_string(),
            &can.uci(),
            thresholds.engine_lines,
            thresholds.think_time,
        )
        .await?;
    if only_move {
        report.rejections.nonlosing.push(game.link(n - 1));
        return Ok(());
    }

    info!(link = %game.link(n - 1), movetext = %can.movetext(), "sacrifice candidate");
    report.candidates.push(
        MotifFinding::at(MotifKind::SacrificeCandidate, game, can, n - 1)
            .with_evidence(&can.board_after, [can.chess_move.get_dest()]),
    );
    Ok(())
}

/// Structural early rejects that need no evaluation.
fn eligible(can: &Ply, capture: &Ply, side: Color) -> bool {
    if !capture.is_capture() || capture.is_en_passant || capture.captured == Some(Piece::Pawn) {
        return false;
    }
    if is_check(&can.board_before) {
        return false;
    }
    if can.chess_move.get_promotion().is_some() || can.is_castling {
        return false;
    }

    // Losing the last piece with few pawns left is a forced trade, not a sacrifice
    let board = &capture.board_before;
    !(non_pawn_count(board, side) == 1 && pawn_count(board, side) < 4)
}

/// Does `side` stay down material, without the evaluation falling further
/// than the material, at every checkpoint?
fn material_stays_down(game: &Game, n: usize, precan: &Ply, side: Color) -> Result<bool, MotifError> {
    let precan_eval = eval_for(precan, side)?;
    let precan_diff = material_diff(&precan.board_after, side);

    for offset in CHECKPOINTS {
        let Some(checkpoint) = game.ply(n + offset) else {
            return Ok(false);
        };
        let balance = material_diff(&checkpoint.board_after, side);
        let cpl = eval_for(checkpoint, side)?.saturating_sub(precan_eval);
        let material_delta = (balance - precan_diff) * 100;

        if material_delta >= 0 || cpl.saturating_neg() > -material_delta || balance >= 0 {
            return Ok(false);
        }
    }
    Ok(true)
}

fn eval_for(ply: &Ply, side: Color) -> Result<i32, MotifError> {
    ply.eval
        .map(|score| score.pov_cp(side))
        .ok_or(MotifError::MissingEvaluation(ply.index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleError;
    use crate::test_support::{game, line};

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    // Bishop thrown on f7 at ply 7, taken at ply 8, White a piece for a pawn down after
    const FRIED: [&str; 16] = [
        "e4", "e5", "Nf3", "Nc6", "Bc4", "Nf6", "Bxf7+", "Kxf7", "d3", "d6", "O-O", "Be7", "h3", "h6", "a3", "a6",
    ];

    struct FixedMasters(u32);

    impl MastersDatabase for FixedMasters {
        async fn lookup(&self, _fen: &str) -> Result<u32, OracleError> {
            Ok(self.0)
        }
    }

    struct FixedEngine(Result<bool, OracleError>);

    impl EngineOracle for FixedEngine {
        async fn is_uniquely_nonlosing(
            &self,
            _fen: &str,
            _played: &str,
            _lines: u32,
            _think_time: Duration,
        ) -> Result<bool, OracleError> {
            self.0.clone()
        }
    }

    async fn screen(g: &Game, masters: u32, engine: Result<bool, OracleError>) -> SacrificeReport {
        let cache = OracleCache::new();
        let (masters, engine) = (FixedMasters(masters), FixedEngine(engine));
        let oracles = Oracles { masters: &masters, engine: &engine, cache: &cache };
        classify_sacrifices(g, oracles, &Thresholds::default()).await.unwrap()
    }

    async fn run(evals: &[Option<i32>], masters: u32, engine: Result<bool, OracleError>) -> SacrificeReport {
        screen(&game(START, &FRIED, evals), masters, engine).await
    }

    /// Screen a level game with oracles that would accept any candidate.
    async fn screen_level(fen: &str, sans: &[&str]) -> SacrificeReport {
        screen(&game(fen, sans, &vec![Some(0); sans.len()]), 0, Ok(false)).await
    }

    /// Is the reply at `plies[1]` to `plies[0]` eligible at all?
    fn eligible_pair(fen: &str, sans: &[&str]) -> bool {
        let plies = line(fen, sans);
        let (can, capture) = (&plies[plies.len() - 2], &plies[plies.len() - 1]);
        eligible(can, capture, can.mover())
    }

    fn level(n: usize) -> Vec<Option<i32>> {
        vec![Some(20); n]
    }

    #[test]
    fn test_scan_range_bounds() {
        let range: Vec<usize> = scan_range(1, 16).collect();
        assert_eq!(range, vec![7, 8, 9, 10]);
        assert_eq!(scan_range(1, 12).count(), 0);
        // Set up at move 40: the first reply with two recorded plies before it
        let range: Vec<usize> = scan_range(79, 90).collect();
        assert_eq!(range, vec![81, 82, 83, 84]);
        assert_eq!(scan_range(150, 260).last(), Some(199));
    }

    #[test]
    fn test_eval_horizon() {
        // Candidate at ply 195 is replied to at 196; one at 201 at 202
        assert!(scan_range(1, 250).any(|n| n == 196));
        assert!(!scan_range(1, 250).any(|n| n == 202));
        assert_eq!(scan_range(1, 250).last(), Some(199));
    }

    #[tokio::test]
    async fn test_compensated_bishop_sacrifice_is_a_candidate() {
        let report = run(&level(16), 0, Ok(false)).await;
        assert_eq!(report.candidates.len(), 1);
        let candidate = &report.candidates[0];
        assert_eq!(candidate.ply, 7);
        assert_eq!(candidate.link, "https://lichess.org/testgame#7");
        assert_eq!(candidate.movetext.as_deref(), Some("4. Bxf7+"));
        assert_eq!(candidate.uci.as_deref(), Some("c4f7"));
        assert_eq!(report.rejections.total(), 0);
    }

    #[tokio::test]
    async fn test_uncompensated_loss_is_not_a_sacrifice() {
        let mut evals = level(16);
        evals[8] = Some(-400);
        let report = run(&evals, 0, Ok(false)).await;
        assert!(report.candidates.is_empty());
        assert_eq!(report.rejections, RejectionBuckets::default());
    }

    #[tokio::test]
    async fn test_decided_position_is_skipped() {
        let mut evals = level(16);
        evals[6] = Some(450);
        let report = run(&evals, 0, Ok(false)).await;
        assert!(report.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_theory_and_only_move_buckets() {
        let report = run(&level(16), 12, Ok(false)).await;
        assert_eq!(report.rejections.theory, vec!["https://lichess.org/testgame#7"]);

        let report = run(&level(16), 0, Ok(true)).await;
        assert_eq!(report.rejections.nonlosing, vec!["https://lichess.org/testgame#7"]);
        assert!(report.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_engine_failure_leaves_candidate_unverified() {
        let report = run(&level(16), 0, Err(OracleError::EngineUnavailable("timeout".into()))).await;
        assert!(report.candidates.is_empty());
        assert_eq!(report.unverified.len(), 1);
        assert_eq!(report.unverified[0].movetext, "4. Bxf7+");
    }

    #[tokio::test]
    async fn test_missing_evaluation_skips_the_window() {
        let mut evals = level(16);
        evals[10] = None;
        let report = run(&evals, 0, Ok(false)).await;
        assert!(report.candidates.is_empty());
        assert_eq!(report.missing_evaluations, vec!["https://lichess.org/testgame#11"]);
    }

    #[test]
    fn test_piece_for_pawn_capture_is_eligible() {
        assert!(eligible_pair(START, &FRIED[..8]));
    }

    #[test]
    fn test_pawn_captures_are_not_sacrifices() {
        assert!(!eligible_pair(START, &["e4", "d5", "exd5"]));

        let plies = line(START, &["e4", "Nf6", "e5", "d5", "exd6"]);
        assert!(plies[4].is_en_passant);
        assert!(!eligible(&plies[3], &plies[4], Color::Black));
    }

    #[test]
    fn test_interposing_while_in_check_is_not_a_sacrifice() {
        assert!(!eligible_pair("4k3/8/2n5/8/8/8/8/4R1K1 b - - 0 1", &["Ne7", "Rxe7+"]));
    }

    #[test]
    fn test_promotion_and_castling_are_not_sacrifices() {
        assert!(!eligible_pair("k7/4P3/8/8/8/8/4r3/7K w - - 0 1", &["e8=Q+", "Rxe8"]));

        let plies = line("r3k3/8/8/8/8/8/8/N3K2R w K - 0 1", &["O-O", "Rxa1"]);
        assert!(plies[0].is_castling);
        assert!(!eligible(&plies[0], &plies[1], Color::White));
    }

    #[test]
    fn test_last_piece_with_few_pawns_is_not_a_sacrifice() {
        assert!(!eligible_pair("4k3/8/8/8/8/8/r4PP1/N3K3 w - - 0 1", &["g3", "Rxa1+"]));
        // Four pawns left behind make it a real choice again
        assert!(eligible_pair("4k3/8/8/8/8/4PP2/r5PP/N3K3 w - - 0 1", &["g3", "Rxa1+"]));
    }

    #[tokio::test]
    async fn test_side_already_ahead_on_material_is_skipped() {
        // Black is missing the b-pawn: White is one pawn up before Bxf7+
        let one_up = "rnbqkbnr/p1pppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let report = screen(&game(one_up, &FRIED, &level(16)), 0, Ok(false)).await;
        assert_eq!(report.candidates.len(), 1);

        // Two pawns up reaches the threshold
        let two_up = "rnbqkbnr/p2ppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let report = screen(&game(two_up, &FRIED, &level(16)), 0, Ok(false)).await;
        assert!(report.candidates.is_empty());
        assert_eq!(report.rejections.total(), 0);
        assert!(report.missing_evaluations.is_empty());
    }

    // The fixtures below start at move 20 with Black to move: the move before
    // the candidate is ply 40, the candidate ply 41 and the capturing reply ply 42.

    #[tokio::test]
    async fn test_capture_of_pinned_piece_is_rejected() {
        // Nb2 is pinned to Ka1 by Be5; White shuffles the rook and a3 takes it
        let report = screen_level(
            "3r2k1/8/8/4b3/8/p7/1N6/K6R b - - 0 20",
            &["Kf7", "Rh4", "axb2+", "Ka2", "Rd7", "Rh3", "Rd8", "Rh4", "Rd7"],
        )
        .await;

        assert_eq!(report.rejections.abs_pinned, vec!["https://lichess.org/testgame#41"]);
        assert_eq!(report.rejections.total(), 1);
        assert!(report.candidates.is_empty());
        assert_eq!(report.tactics.len(), 1);
        assert_eq!(report.tactics[0].kind, MotifKind::AbsolutePin);
        assert_eq!(report.tactics[0].ply, 42);
    }

    #[tokio::test]
    async fn test_capture_of_trapped_piece_is_rejected() {
        // Na8 has only b6 and c7, both covered; Rh8 collects it
        let report = screen_level(
            "N6r/p2k4/8/7b/8/8/8/4R1K1 b - - 0 20",
            &["Bg6", "Re2", "Rxa8", "Re1", "Rb8", "Re2", "Ra8", "Re1", "Rb8"],
        )
        .await;

        assert_eq!(report.rejections.trapped, vec!["https://lichess.org/testgame#40"]);
        assert_eq!(report.rejections.total(), 1);
        assert!(report.candidates.is_empty());
        assert_eq!(report.tactics[0].kind, MotifKind::TrappedPieceCapture);
        assert_eq!(report.tactics[0].ply, 42);
    }

    #[tokio::test]
    async fn test_skewered_rook_is_rejected() {
        // Bb2 hits Qd4 with Rf6 behind it on the long diagonal
        let report = screen_level(
            "rr4k1/8/5R2/8/3Q4/b7/8/6K1 b - - 0 20",
            &["Bb2", "Qd1", "Bxf6", "Qd2", "Kh7", "Qd1", "Kg8", "Qd2", "Kh7"],
        )
        .await;

        assert_eq!(report.rejections.skewers, vec!["https://lichess.org/testgame#41"]);
        assert_eq!(report.rejections.total(), 1);
        assert!(report.candidates.is_empty());
        assert_eq!(report.tactics[0].kind, MotifKind::Skewer);
        assert_eq!(report.tactics[0].ply, 42);
    }

    #[tokio::test]
    async fn test_forked_pieces_are_rejected() {
        // Nc2 forks Ra1 and Qe3; the queen leaves and the rook falls
        let report = screen_level(
            "7k/1rr5/8/8/1n6/4Q3/8/R5K1 b - - 0 20",
            &["Nc2", "Qd3", "Nxa1", "Qd2", "Kg8", "Qd3", "Kh8", "Qd2", "Kg8"],
        )
        .await;

        assert_eq!(report.rejections.forks, vec!["https://lichess.org/testgame#40"]);
        assert_eq!(report.rejections.total(), 1);
        assert!(report.candidates.is_empty());
        assert_eq!(report.tactics[0].kind, MotifKind::Fork);
        assert_eq!(report.tactics[0].ply, 40);
    }
}

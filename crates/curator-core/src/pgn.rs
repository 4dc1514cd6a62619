//! Lightweight regex-based PGN parsing.
//!
//! Keeps the mainline SAN tokens together with the `[%eval ...]` annotation
//! that follows each move. Side variations are dropped.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::GameError;
use crate::game_data::{GameMetadata, GameRecord, RecordedMove, Score};

const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).expect("valid regex"))
}

fn variation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^()]*\)").expect("valid regex"))
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\{([^}]*)\}|(O-O-O|O-O|[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=[QRBN])?)[+#]?",
        )
        .expect("valid regex")
    })
}

fn eval_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[%eval\s+(#)?(-?\d+(?:\.\d+)?)").expect("valid regex"))
}

/// Split a multi-game PGN file and parse each game.
pub fn parse_pgn_file(text: &str) -> Vec<Result<GameRecord, GameError>> {
    split_games(text).iter().map(|g| parse_pgn(g)).collect()
}

/// Split PGN text into one chunk per game. A header line that follows
/// movetext starts a new game.
pub fn split_games(text: &str) -> Vec<String> {
    let mut games = Vec::new();
    let mut current = String::new();
    let mut seen_movetext = false;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') && !trimmed.starts_with("[%") && seen_movetext {
            games.push(std::mem::take(&mut current));
            seen_movetext = false;
        }
        if !trimmed.is_empty() && !trimmed.starts_with('[') {
            seen_movetext = true;
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        games.push(current);
    }
    games
}

/// Parse a single game's PGN text.
pub fn parse_pgn(pgn: &str) -> Result<GameRecord, GameError> {
    let mut metadata = GameMetadata {
        white: "Unknown".to_string(),
        black: "Unknown".to_string(),
        result: "*".to_string(),
        ..Default::default()
    };
    let mut setup = None;
    let mut fen = None;

    let (headers, movetext) = split_headers(pgn);

    for cap in header_re().captures_iter(headers) {
        let value = cap[2].to_string();
        match &cap[1] {
            "White" => metadata.white = value,
            "Black" => metadata.black = value,
            "Result" => metadata.result = value,
            "Site" => metadata.site = Some(value),
            "Termination" => metadata.termination = Some(value),
            "Date" => metadata.date = Some(value),
            "Event" => metadata.event = Some(value),
            "SetUp" => setup = Some(value),
            "FEN" => fen = Some(value),
            _ => {}
        }
    }

    let start_fen = match (setup.as_deref(), fen) {
        (Some("1"), Some(f)) if f != STANDARD_START_FEN => Some(f),
        (None, Some(f)) if f != STANDARD_START_FEN => Some(f),
        _ => None,
    };

    let moves = extract_moves(movetext);
    if moves.is_empty() {
        return Err(GameError::EmptyGame);
    }

    Ok(GameRecord {
        metadata,
        start_fen,
        moves,
    })
}

/// Headers are the leading block of `[Tag "value"]` lines.
fn split_headers(pgn: &str) -> (&str, &str) {
    let mut offset = 0;
    for line in pgn.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() || (trimmed.starts_with('[') && !trimmed.starts_with("[%")) {
            offset += line.len();
        } else {
            break;
        }
    }
    pgn.split_at(offset)
}

/// Extract SAN moves paired with the evaluation from the comment after each.
fn extract_moves(movetext: &str) -> Vec<RecordedMove> {
    // Innermost variations first so nested ones collapse
    let mut text = movetext.to_string();
    loop {
        let stripped = variation_re().replace_all(&text, "").into_owned();
        if stripped == text {
            break;
        }
        text = stripped;
    }

    let mut moves: Vec<RecordedMove> = Vec::new();
    for cap in token_re().captures_iter(&text) {
        if let Some(comment) = cap.get(1) {
            if let (Some(last), Some(score)) = (moves.last_mut(), parse_eval(comment.as_str())) {
                last.eval = Some(score);
            }
        } else if let Some(san) = cap.get(2) {
            moves.push(RecordedMove {
                san: san.as_str().to_string(),
                eval: None,
            });
        }
    }
    moves
}

/// Parse `[%eval 0.35]` or `[%eval #-3]` from a comment body.
pub fn parse_eval(comment: &str) -> Option<Score> {
    let cap = eval_re().captures(comment)?;
    let value = cap.get(2)?.as_str();
    if cap.get(1).is_some() {
        value.parse().ok().map(Score::Mate)
    } else {
        let pawns: f64 = value.parse().ok()?;
        Some(Score::Cp((pawns * 100.0).round() as i32))
    }
}

/// Extract a string value from a PGN header.
pub fn extract_header(pgn: &str, header_name: &str) -> Option<String> {
    let pattern = format!(r#"\[{}\s+"([^"]*)"\]"#, regex::escape(header_name));
    let re = Regex::new(&pattern).ok()?;
    let value = re.captures(pgn)?.get(1)?.as_str().to_string();
    if value.is_empty() { None } else { Some(value) }
}

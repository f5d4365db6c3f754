//! Offline SGF replay.

use anyhow::{Context, Result};
use goban_core::sgf::{self, GameRecord};
use goban_core::Engine;
use goban_types::{Point, Stone};
use std::collections::HashSet;
use std::fmt::Write;
use std::path::Path;

/// Run the replay command.
pub async fn run(file: &Path, at: Option<usize>, dead: Option<&str>, komi: Option<f64>) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let record = sgf::parse(&text).with_context(|| format!("Invalid SGF in {}", file.display()))?;
    let dead = parse_dead(dead.unwrap_or(""))?;
    print!("{}", render(&record, at, &dead, komi));
    Ok(())
}

/// Parse `aa,bb` into points. Empty entries are ignored.
pub fn parse_dead(list: &str) -> Result<HashSet<Point>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|coord| Point::from_coord(coord).with_context(|| format!("Invalid coordinate '{}'", coord)))
        .collect()
}

/// Describe the position after `at` moves (clamped; default the end).
pub fn render(record: &GameRecord, at: Option<usize>, dead: &HashSet<Point>, komi: Option<f64>) -> String {
    let mut engine: Engine = record.to_engine();
    if let Some(at) = at {
        engine.seek(at);
    }

    let mut out = String::new();
    let name = |n: &Option<String>| n.clone().unwrap_or_else(|| "?".to_string());
    let _ = writeln!(
        out,
        "{} (B) vs {} (W), {}x{}",
        name(&record.black_name),
        name(&record.white_name),
        engine.size(),
        engine.size()
    );
    if let Some(result) = &record.result {
        let _ = writeln!(out, "Result: {}", result);
    }
    let _ = writeln!(out, "Move {}/{}", engine.cursor(), engine.len());
    if let Some(last) = engine.last_move() {
        let coord = match last.point {
            Some(p) => p.to_coord().unwrap_or_else(|| "??".to_string()),
            None => "pass".to_string(),
        };
        let _ = writeln!(out, "Last: {} {}", last.color, coord);
    }
    let _ = writeln!(out);
    let _ = write!(out, "{}", engine.board());
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Captures: B {}  W {}",
        engine.captures(Stone::Black),
        engine.captures(Stone::White)
    );
    let _ = writeln!(out, "To move: {}", engine.turn());

    let komi = komi.or(record.komi).unwrap_or(0.0);
    let score = engine.score(dead, komi);
    let _ = writeln!(out, "Score: B {} W {} (komi {})", score.black, score.white, komi);
    match score.leader() {
        Some((color, margin)) => {
            let _ = writeln!(out, "Leader: {}+{}", color, margin);
        }
        None => {
            let _ = writeln!(out, "Leader: jigo");
        }
    }
    out
}

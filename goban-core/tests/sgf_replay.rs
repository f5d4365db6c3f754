//! Offline replay of recorded games through the rules engine.

use goban_core::sgf::{self, SgfError};
use goban_core::Engine;
use goban_types::{Point, Stone};

/// Two handicap stones, white to move first. Black captures the white
/// corner stone on move 4, then passes.
const HANDICAP_GAME: &str = "(;GM[1]FF[4]SZ[9]HA[2]KM[0.5]
    PB[Alice]PW[Bob]RE[B+3.5]
    AB[cc][gg]
    ;W[aa];B[ba];W[ee];B[ab]
    (;W[ff];B[])
    (;W[hh]))";

fn p(row: i32, col: i32) -> Point {
    Point::new(row, col)
}

#[test]
fn handicap_fixture_replays_to_expected_position() {
    let record = sgf::parse(HANDICAP_GAME).unwrap();
    assert_eq!(record.setup.size, 9);
    assert_eq!(record.setup.to_move, Stone::White);
    assert_eq!(record.handicap, 2);
    assert_eq!(record.komi, Some(0.5));
    assert_eq!(record.black_name.as_deref(), Some("Alice"));
    assert_eq!(record.result.as_deref(), Some("B+3.5"));
    assert_eq!(record.moves.len(), 6);

    let engine = record.to_engine();
    let board = engine.board();
    assert_eq!(board.count(Stone::Black), 4);
    assert_eq!(board.count(Stone::White), 2);
    assert_eq!(board.get(p(0, 0)), None);
    assert_eq!(engine.captures(Stone::Black), 1);
    assert_eq!(engine.captures(Stone::White), 0);
    assert!(engine.last_move().map(|m| m.is_pass()).unwrap_or(false));
    assert_eq!(engine.turn(), Stone::White);
}

#[test]
fn seeking_back_restores_captured_stone() {
    let record = sgf::parse(HANDICAP_GAME).unwrap();
    let mut engine = record.to_engine();

    engine.seek(3);
    assert_eq!(engine.board().get(p(0, 0)), Some(Stone::White));
    assert_eq!(engine.board().count(Stone::Black), 3);
    assert_eq!(engine.captures(Stone::Black), 0);

    engine.seek(engine.len());
    let mut direct = Engine::new(9);
    direct.load(record.setup.clone(), record.moves.clone());
    assert_eq!(engine.board(), direct.board());
    assert_eq!(engine.captures(Stone::Black), direct.captures(Stone::Black));
}

#[test]
fn branching_after_seek_truncates_future() {
    let record = sgf::parse(HANDICAP_GAME).unwrap();
    let mut engine = record.to_engine();
    engine.seek(2);
    engine.play(Some(p(4, 0)));
    assert_eq!(engine.len(), 3);
    assert_eq!(engine.board().get(p(4, 0)), Some(Stone::White));
}

#[test]
fn malformed_files_fail_with_typed_errors() {
    assert!(matches!(sgf::parse("   "), Err(SgfError::Empty)));
    assert!(matches!(sgf::parse(";B[aa]"), Err(SgfError::MissingOpenParen)));
    assert!(matches!(sgf::parse("(;B[aa]"), Err(SgfError::Unbalanced)));
    assert!(matches!(sgf::parse("(;SZ[huge])"), Err(SgfError::InvalidSize(_))));
}

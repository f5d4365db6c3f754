//! Deterministic Go rules engine.
//!
//! The engine owns a [`Setup`], an append-only move history with a cursor,
//! and the [`Board`] that replaying `history[..cursor]` over the setup
//! produces. Moves are applied with raw-replay fidelity: illegal moves are
//! recorded rather than rejected, so the history stays aligned with the
//! server's move numbering.
//!
//! ```text
//! setup ──apply──▶ board@1 ──apply──▶ board@2 ── ... ──▶ board@cursor
//!   ▲                                                         │
//!   └──────────── seek(k < cursor): rebuild and replay ───────┘
//! ```

use std::collections::{BTreeSet, HashSet};

use goban_types::{MoveRecord, Point, Stone};

use crate::board::Board;

/// Starting position of a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setup {
    /// Board side length.
    pub size: usize,
    /// Black setup (handicap) stones.
    pub black: Vec<Point>,
    /// White setup stones.
    pub white: Vec<Point>,
    /// Color to move first.
    pub to_move: Stone,
}

impl Setup {
    /// An empty board of `size` with black to move.
    pub fn empty(size: usize) -> Self {
        Self {
            size,
            black: Vec::new(),
            white: Vec::new(),
            to_move: Stone::Black,
        }
    }

    fn board(&self) -> Board {
        let mut board = Board::new(self.size);
        for p in &self.black {
            board.set(*p, Some(Stone::Black));
        }
        for p in &self.white {
            board.set(*p, Some(Stone::White));
        }
        board
    }
}

/// What happened when a move was applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Opponent stones removed by this move.
    pub captured: usize,
    /// The placed group had no liberties and was removed.
    pub suicide: bool,
    /// The move did not touch the grid (pass, off-board or occupied).
    pub no_op: bool,
}

/// Area ownership after dead-stone removal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Territory {
    /// Empty points surrounded only by black.
    pub black: BTreeSet<Point>,
    /// Empty points surrounded only by white.
    pub white: BTreeSet<Point>,
    /// Empty points bordering both colors, or neither.
    pub neutral: BTreeSet<Point>,
}

/// Final count per color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// Black's territory plus prisoners.
    pub black: f64,
    /// White's territory plus prisoners plus komi.
    pub white: f64,
}

impl Score {
    /// The leading color and margin, or `None` for jigo.
    pub fn leader(&self) -> Option<(Stone, f64)> {
        let diff = self.black - self.white;
        if diff > 0.0 {
            Some((Stone::Black, diff))
        } else if diff < 0.0 {
            Some((Stone::White, -diff))
        } else {
            None
        }
    }
}

/// Rules engine: board, history and capture counters.
#[derive(Debug, Clone)]
pub struct Engine {
    setup: Setup,
    history: Vec<MoveRecord>,
    cursor: usize,
    board: Board,
    captures: [usize; 2],
}

impl Engine {
    /// An empty engine on a `size`×`size` board.
    pub fn new(size: usize) -> Self {
        Self::with_setup(Setup::empty(size))
    }

    /// An engine positioned at the start of `setup`.
    pub fn with_setup(setup: Setup) -> Self {
        let board = setup.board();
        Self {
            setup,
            history: Vec::new(),
            cursor: 0,
            board,
            captures: [0, 0],
        }
    }

    /// Discard all history and restart from `setup`.
    pub fn reset(&mut self, setup: Setup) {
        *self = Self::with_setup(setup);
    }

    /// Load a full history and move the cursor to its end.
    pub fn load(&mut self, setup: Setup, moves: Vec<MoveRecord>) {
        self.reset(setup);
        self.history = moves;
        self.seek(self.history.len());
    }

    /// Apply `color` at `point` (`None` = pass) at the cursor.
    ///
    /// If the cursor is behind the end of history, the future is discarded
    /// first.
    pub fn apply(&mut self, color: Stone, point: Option<Point>) -> MoveOutcome {
        self.history.truncate(self.cursor);
        let record = MoveRecord { color, point };
        self.history.push(record);
        self.cursor += 1;
        place(&mut self.board, &mut self.captures, record)
    }

    /// Apply a move for whoever's turn it is.
    pub fn play(&mut self, point: Option<Point>) -> MoveOutcome {
        self.apply(self.turn(), point)
    }

    /// Move the cursor to `target` (clamped to the history length).
    ///
    /// Going forward applies only the missing moves; going back rebuilds
    /// from the setup. Both paths give the same board for the same index.
    pub fn seek(&mut self, target: usize) {
        let target = target.min(self.history.len());
        if target < self.cursor {
            self.board = self.setup.board();
            self.captures = [0, 0];
            self.cursor = 0;
        }
        while self.cursor < target {
            let record = self.history[self.cursor];
            place(&mut self.board, &mut self.captures, record);
            self.cursor += 1;
        }
    }

    /// Whether placing `color` at `point` would leave the placed group with
    /// no liberties after opponent captures are removed.
    pub fn is_suicide(&self, color: Stone, point: Point) -> bool {
        if !self.board.is_empty_at(point) {
            return false;
        }
        let mut board = self.board.clone();
        let mut captures = self.captures;
        let outcome = place(&mut board, &mut captures, MoveRecord::play(color, point));
        outcome.suicide
    }

    /// Territory after removing `dead` stones from a working copy.
    ///
    /// An empty region belongs to a color only if every stone bordering any
    /// of its points is that color.
    pub fn territory(&self, dead: &HashSet<Point>) -> Territory {
        let mut board = self.board.clone();
        board.remove_all(dead);

        let mut territory = Territory::default();
        let mut seen = HashSet::new();
        for p in board.points() {
            if seen.contains(&p) || !board.is_empty_at(p) {
                continue;
            }
            let (region, borders) = board.empty_region(p);
            seen.extend(region.iter().copied());
            let target = match (borders.contains(&Stone::Black), borders.contains(&Stone::White)) {
                (true, false) => &mut territory.black,
                (false, true) => &mut territory.white,
                _ => &mut territory.neutral,
            };
            target.extend(region);
        }
        territory
    }

    /// Territory plus prisoners (captures and dead opponent stones), with
    /// `komi` added for white.
    pub fn score(&self, dead: &HashSet<Point>, komi: f64) -> Score {
        let territory = self.territory(dead);
        let dead_of = |color: Stone| dead.iter().filter(|p| self.board.get(**p) == Some(color)).count();

        let black = territory.black.len() + self.captures(Stone::Black) + dead_of(Stone::White);
        let white = territory.white.len() + self.captures(Stone::White) + dead_of(Stone::Black);
        Score {
            black: black as f64,
            white: white as f64 + komi,
        }
    }

    /// Color to move: the opponent of the last applied move, or the setup's
    /// first player when nothing has been applied.
    pub fn turn(&self) -> Stone {
        self.last_move()
            .map(|m| m.color.opponent())
            .unwrap_or(self.setup.to_move)
    }

    /// The most recently applied move.
    pub fn last_move(&self) -> Option<MoveRecord> {
        self.cursor.checked_sub(1).map(|i| self.history[i])
    }

    /// Stones captured *by* `color` up to the cursor.
    pub fn captures(&self, color: Stone) -> usize {
        self.captures[color.index()]
    }

    /// Current board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Board side length.
    pub fn size(&self) -> usize {
        self.board.size()
    }

    /// Starting position.
    pub fn setup(&self) -> &Setup {
        &self.setup
    }

    /// Full history, including moves past the cursor.
    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    /// Number of applied moves.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Total recorded moves.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether no moves are recorded.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// Play one record on `board`, crediting captures.
fn place(board: &mut Board, captures: &mut [usize; 2], record: MoveRecord) -> MoveOutcome {
    let point = match record.point {
        Some(p) if board.is_empty_at(p) => p,
        _ => {
            return MoveOutcome {
                no_op: true,
                ..MoveOutcome::default()
            }
        }
    };

    let color = record.color;
    board.set(point, Some(color));

    let mut captured = 0;
    let opponents: Vec<Point> = board
        .neighbors(point)
        .filter(|n| board.get(*n) == Some(color.opponent()))
        .collect();
    for n in opponents {
        // An earlier neighbor's capture may already have cleared this one.
        if board.get(n) != Some(color.opponent()) {
            continue;
        }
        let (group, liberties) = board.group(n);
        if liberties.is_empty() {
            captured += group.len();
            board.remove_all(&group);
        }
    }
    captures[color.index()] += captured;

    let mut suicide = false;
    if captured == 0 {
        let (group, liberties) = board.group(point);
        if liberties.is_empty() {
            suicide = true;
            captures[color.opponent().index()] += group.len();
            board.remove_all(&group);
        }
    }

    MoveOutcome {
        captured,
        suicide,
        no_op: false,
    }
}

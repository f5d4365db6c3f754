//! Board snapshot: a square grid of optional stones.
//!
//! The board knows adjacency, groups and liberties. It knows nothing about
//! turns or history; see [`crate::engine`] for that.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use goban_types::{Point, Stone};

/// Smallest supported board.
pub const MIN_SIZE: usize = 1;
/// Largest supported board (the two-letter coordinate alphabet).
pub const MAX_SIZE: usize = 52;

/// An N×N grid. At most one stone per cell; every stored coordinate lies in
/// `[0, N)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Board {
    size: usize,
    cells: Vec<Option<Stone>>,
}

impl Board {
    /// An empty board. `size` is clamped to `[MIN_SIZE, MAX_SIZE]`.
    pub fn new(size: usize) -> Self {
        let size = size.clamp(MIN_SIZE, MAX_SIZE);
        Self {
            size,
            cells: vec![None; size * size],
        }
    }

    /// Side length.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether `p` is on the board.
    pub fn contains(&self, p: Point) -> bool {
        p.in_bounds(self.size)
    }

    /// The stone at `p`, or `None` if empty or off the board.
    pub fn get(&self, p: Point) -> Option<Stone> {
        self.index(p).and_then(|i| self.cells[i])
    }

    /// Whether `p` is on the board and empty.
    pub fn is_empty_at(&self, p: Point) -> bool {
        self.index(p).map(|i| self.cells[i].is_none()).unwrap_or(false)
    }

    /// Set or clear a cell. Off-board points are ignored.
    pub(crate) fn set(&mut self, p: Point, stone: Option<Stone>) {
        if let Some(i) = self.index(p) {
            self.cells[i] = stone;
        }
    }

    /// Clear every listed point.
    pub(crate) fn remove_all<'a>(&mut self, points: impl IntoIterator<Item = &'a Point>) {
        for p in points {
            self.set(*p, None);
        }
    }

    /// On-board orthogonal neighbors of `p`.
    pub fn neighbors(&self, p: Point) -> impl Iterator<Item = Point> + '_ {
        [(-1, 0), (1, 0), (0, -1), (0, 1)]
            .into_iter()
            .map(move |(dr, dc)| Point::new(p.row + dr, p.col + dc))
            .filter(move |n| self.contains(*n))
    }

    /// The group containing `p` and its liberties.
    ///
    /// Returns empty sets if `p` is empty or off the board.
    pub fn group(&self, p: Point) -> (BTreeSet<Point>, BTreeSet<Point>) {
        let mut stones = BTreeSet::new();
        let mut liberties = BTreeSet::new();
        let color = match self.get(p) {
            Some(c) => c,
            None => return (stones, liberties),
        };

        let mut stack = vec![p];
        stones.insert(p);
        while let Some(cur) = stack.pop() {
            for n in self.neighbors(cur) {
                match self.get(n) {
                    None => {
                        liberties.insert(n);
                    }
                    Some(c) if c == color && stones.insert(n) => stack.push(n),
                    Some(_) => {}
                }
            }
        }
        (stones, liberties)
    }

    /// Number of liberties of the group at `p`.
    pub fn liberty_count(&self, p: Point) -> usize {
        self.group(p).1.len()
    }

    /// Maximal connected empty region containing `p`, plus the colors
    /// of every stone bordering it.
    pub(crate) fn empty_region(&self, p: Point) -> (BTreeSet<Point>, HashSet<Stone>) {
        let mut region = BTreeSet::new();
        let mut borders = HashSet::new();
        if !self.is_empty_at(p) {
            return (region, borders);
        }

        let mut stack = vec![p];
        region.insert(p);
        while let Some(cur) = stack.pop() {
            for n in self.neighbors(cur) {
                match self.get(n) {
                    Some(c) => {
                        borders.insert(c);
                    }
                    None if region.insert(n) => stack.push(n),
                    None => {}
                }
            }
        }
        (region, borders)
    }

    /// Every on-board point, row-major.
    pub fn points(&self) -> impl Iterator<Item = Point> {
        let size = self.size as i32;
        (0..size).flat_map(move |row| (0..size).map(move |col| Point::new(row, col)))
    }

    /// Every occupied point with its stone.
    pub fn stones(&self) -> impl Iterator<Item = (Point, Stone)> + '_ {
        self.points().filter_map(move |p| self.get(p).map(|s| (p, s)))
    }

    /// Number of stones of `color` on the board.
    pub fn count(&self, color: Stone) -> usize {
        self.cells.iter().filter(|c| **c == Some(color)).count()
    }

    fn index(&self, p: Point) -> Option<usize> {
        if self.contains(p) {
            Some(p.row as usize * self.size + p.col as usize)
        } else {
            None
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.size {
            let line: String = (0..self.size)
                .map(|col| match self.get(Point::new(row as i32, col as i32)) {
                    Some(Stone::Black) => 'X',
                    Some(Stone::White) => 'O',
                    None => '.',
                })
                .collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

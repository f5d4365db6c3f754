//! Stones, board points and move records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token sent in place of a coordinate when a player passes.
pub const PASS_TOKEN: &str = "..";

/// A stone color. Also used as "the player of that color".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stone {
    /// Black plays first in an even game.
    Black,
    /// White receives komi.
    White,
}

impl Stone {
    /// The other color.
    pub fn opponent(self) -> Self {
        match self {
            Stone::Black => Stone::White,
            Stone::White => Stone::Black,
        }
    }

    /// Stable index for per-color arrays (black = 0, white = 1).
    pub fn index(self) -> usize {
        match self {
            Stone::Black => 0,
            Stone::White => 1,
        }
    }

    /// Parse a color name as servers and game records spell it.
    ///
    /// Accepts `black`/`white` and the single letters `b`/`w`, any case.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "black" | "b" => Some(Stone::Black),
            "white" | "w" => Some(Stone::White),
            _ => None,
        }
    }
}

impl fmt::Display for Stone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stone::Black => write!(f, "black"),
            Stone::White => write!(f, "white"),
        }
    }
}

/// A board intersection.
///
/// Coordinates are signed so that out-of-range points found in real game
/// records can be represented; the rules engine ignores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    /// Zero-based row (top to bottom).
    pub row: i32,
    /// Zero-based column (left to right).
    pub col: i32,
}

impl Point {
    /// Create a point from row and column.
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Whether the point lies on a `size`×`size` board.
    pub fn in_bounds(&self, size: usize) -> bool {
        let size = size as i64;
        (0..size).contains(&(self.row as i64)) && (0..size).contains(&(self.col as i64))
    }

    /// Decode the two-letter lowercase encoding (column letter, then row letter).
    ///
    /// `"ab"` is column 0, row 1. Returns `None` for anything that is not
    /// exactly two lowercase ASCII letters.
    pub fn from_coord(coord: &str) -> Option<Self> {
        let bytes = coord.as_bytes();
        if bytes.len() != 2 || !bytes.iter().all(u8::is_ascii_lowercase) {
            return None;
        }
        Some(Self {
            col: i32::from(bytes[0] - b'a'),
            row: i32::from(bytes[1] - b'a'),
        })
    }

    /// Encode as two lowercase letters, or `None` if the point cannot be
    /// expressed in that alphabet.
    pub fn to_coord(&self) -> Option<String> {
        let letter = |v: i32| -> Option<char> {
            u8::try_from(v)
                .ok()
                .filter(|v| *v < 26)
                .map(|v| char::from(b'a' + v))
        };
        Some([letter(self.col)?, letter(self.row)?].iter().collect())
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_coord() {
            Some(coord) => write!(f, "{}", coord),
            None => write!(f, "({}, {})", self.row, self.col),
        }
    }
}

/// One entry of a move history: who played, and where (`None` = pass).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveRecord {
    /// The color that made the move.
    pub color: Stone,
    /// The intersection played, or `None` for a pass.
    pub point: Option<Point>,
}

impl MoveRecord {
    /// A stone placement.
    pub fn play(color: Stone, point: Point) -> Self {
        Self {
            color,
            point: Some(point),
        }
    }

    /// A pass.
    pub fn pass(color: Stone) -> Self {
        Self { color, point: None }
    }

    /// Whether this record is a pass.
    pub fn is_pass(&self) -> bool {
        self.point.is_none()
    }
}

/// Wire token for a move: the two-letter coordinate, or [`PASS_TOKEN`].
pub fn move_token(point: Option<Point>) -> String {
    point
        .and_then(|p| p.to_coord())
        .unwrap_or_else(|| PASS_TOKEN.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opponent_flips() {
        assert_eq!(Stone::Black.opponent(), Stone::White);
        assert_eq!(Stone::White.opponent(), Stone::Black);
        assert_eq!(Stone::Black.opponent().opponent(), Stone::Black);
    }

    #[test]
    fn parse_accepts_common_spellings() {
        assert_eq!(Stone::parse("Black"), Some(Stone::Black));
        assert_eq!(Stone::parse(" w "), Some(Stone::White));
        assert_eq!(Stone::parse("red"), None);
    }

    #[test]
    fn coord_maps_column_then_row() {
        assert_eq!(Point::from_coord("ab"), Some(Point::new(1, 0)));
        assert_eq!(Point::from_coord("dp"), Some(Point::new(15, 3)));
        assert_eq!(Point::new(15, 3).to_coord().as_deref(), Some("dp"));
    }

    #[test]
    fn coord_rejects_garbage() {
        assert_eq!(Point::from_coord(""), None);
        assert_eq!(Point::from_coord("a"), None);
        assert_eq!(Point::from_coord("AB"), None);
        assert_eq!(Point::from_coord("abc"), None);
        assert_eq!(Point::new(-1, 0).to_coord(), None);
    }

    #[test]
    fn bounds_check() {
        assert!(Point::new(0, 0).in_bounds(9));
        assert!(Point::new(8, 8).in_bounds(9));
        assert!(!Point::new(9, 0).in_bounds(9));
        assert!(!Point::new(0, -1).in_bounds(9));
    }

    #[test]
    fn pass_token_for_missing_point() {
        assert_eq!(move_token(None), PASS_TOKEN);
        assert_eq!(move_token(Some(Point::new(2, 3))), "dc");
    }
}

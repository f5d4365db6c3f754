//! SGF ingestion for offline replay.
//!
//! Only the main line is read: at every branch point the first variation is
//! followed and the rest are skipped. Unknown properties are ignored.

use goban_types::{MoveRecord, Point, Stone};
use thiserror::Error;
use tracing::debug;

use crate::board::MAX_SIZE;
use crate::engine::{Engine, Setup};

/// Default board size when `SZ` is absent.
pub const DEFAULT_SIZE: usize = 19;

/// Errors raised while parsing a game record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SgfError {
    /// Nothing but whitespace.
    #[error("empty game record")]
    Empty,

    /// The record does not start with `(`.
    #[error("game record must start with '('")]
    MissingOpenParen,

    /// A `[` value that never closes.
    #[error("unterminated property value starting at offset {0}")]
    UnterminatedValue(usize),

    /// Parentheses do not balance.
    #[error("unbalanced parentheses")]
    Unbalanced,

    /// `SZ` is not a usable board size.
    #[error("invalid board size: {0}")]
    InvalidSize(String),
}

/// A parsed game record, main line only.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRecord {
    /// Setup position, including stones added before the first move.
    pub setup: Setup,
    /// Main-line moves with their explicit colors.
    pub moves: Vec<MoveRecord>,
    /// Komi (`KM`).
    pub komi: Option<f64>,
    /// Handicap (`HA`).
    pub handicap: u32,
    /// Black player's name (`PB`).
    pub black_name: Option<String>,
    /// White player's name (`PW`).
    pub white_name: Option<String>,
    /// Result (`RE`).
    pub result: Option<String>,
}

impl GameRecord {
    /// Build an engine positioned at the end of the main line.
    pub fn to_engine(&self) -> Engine {
        let mut engine = Engine::new(self.setup.size);
        engine.load(self.setup.clone(), self.moves.clone());
        engine
    }
}

/// Parse an SGF document and return its first game's main line.
pub fn parse(text: &str) -> Result<GameRecord, SgfError> {
    let nodes = Parser::new(text).main_line()?;
    interpret(&nodes)
}

type Property = (String, Vec<String>);
type Node = Vec<Property>;

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().map(char::is_whitespace).unwrap_or(false) {
            self.bump();
        }
    }

    fn main_line(mut self) -> Result<Vec<Node>, SgfError> {
        self.skip_ws();
        match self.peek() {
            None => return Err(SgfError::Empty),
            Some('(') => {}
            Some(_) => return Err(SgfError::MissingOpenParen),
        }
        let mut nodes = Vec::new();
        self.tree(&mut nodes, true)?;

        // Further games in a collection are ignored, but a stray closer
        // means the first one was malformed.
        self.skip_ws();
        if self.peek() == Some(')') {
            return Err(SgfError::Unbalanced);
        }
        Ok(nodes)
    }

    /// Parse one `( ... )` tree. Nodes are collected only while `keep` is
    /// true, and only the first child tree inherits `keep`.
    fn tree(&mut self, out: &mut Vec<Node>, keep: bool) -> Result<(), SgfError> {
        self.bump(); // '('
        let mut first_child = true;
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Err(SgfError::Unbalanced),
                Some(')') => {
                    self.bump();
                    return Ok(());
                }
                Some('(') => {
                    self.tree(out, keep && first_child)?;
                    first_child = false;
                }
                Some(';') => {
                    self.bump();
                    let node = self.node()?;
                    // Nodes after a variation belong to no line; skip them.
                    if keep && first_child {
                        out.push(node);
                    }
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn node(&mut self) -> Result<Node, SgfError> {
        let mut props = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(c) if c.is_ascii_alphabetic() => {
                    let ident = self.ident();
                    let values = self.values()?;
                    if !ident.is_empty() && !values.is_empty() {
                        props.push((ident, values));
                    }
                }
                Some(';') | Some('(') | Some(')') | None => return Ok(props),
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    /// Property identifier; lowercase letters (FF[3] style) are dropped.
    fn ident(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.peek().filter(char::is_ascii_alphabetic) {
            if c.is_ascii_uppercase() {
                ident.push(c);
            }
            self.bump();
        }
        ident
    }

    fn values(&mut self) -> Result<Vec<String>, SgfError> {
        let mut values = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() != Some('[') {
                return Ok(values);
            }
            let start = self.pos;
            self.bump();
            let mut value = String::new();
            loop {
                match self.bump() {
                    None => return Err(SgfError::UnterminatedValue(start)),
                    Some(']') => break,
                    Some('\\') => match self.bump() {
                        None => return Err(SgfError::UnterminatedValue(start)),
                        // Soft line break.
                        Some('\n') => {}
                        Some(c) => value.push(c),
                    },
                    Some(c) => value.push(c),
                }
            }
            values.push(value);
        }
    }
}

fn interpret(nodes: &[Node]) -> Result<GameRecord, SgfError> {
    let size = match find(nodes, "SZ") {
        Some(raw) => parse_size(raw)?,
        None => DEFAULT_SIZE,
    };

    let mut setup = Setup::empty(size);
    let mut explicit_first: Option<Stone> = None;
    let mut record = GameRecord {
        setup: Setup::empty(size),
        moves: Vec::new(),
        komi: None,
        handicap: 0,
        black_name: None,
        white_name: None,
        result: None,
    };

    for node in nodes {
        for (key, values) in node {
            let in_setup = record.moves.is_empty();
            match key.as_str() {
                "AB" | "AW" | "AE" if !in_setup => {
                    debug!(key = %key, "setup property after first move ignored");
                }
                "AB" => add_setup(&mut setup, Some(Stone::Black), values),
                "AW" => add_setup(&mut setup, Some(Stone::White), values),
                "AE" => add_setup(&mut setup, None, values),
                "PL" if in_setup => {
                    explicit_first = values.first().and_then(|v| Stone::parse(v));
                }
                "B" | "W" => {
                    let color = if key == "B" { Stone::Black } else { Stone::White };
                    let raw = values.first().map(String::as_str).unwrap_or("");
                    match decode_move(raw, size) {
                        Some(point) => record.moves.push(MoveRecord { color, point }),
                        None => debug!(value = %raw, "malformed move coordinate ignored"),
                    }
                }
                "KM" => record.komi = values.first().and_then(|v| v.trim().parse().ok()),
                "HA" => record.handicap = values.first().and_then(|v| v.trim().parse().ok()).unwrap_or(0),
                "PB" => record.black_name = values.first().cloned(),
                "PW" => record.white_name = values.first().cloned(),
                "RE" => record.result = values.first().cloned(),
                _ => {}
            }
        }
    }

    setup.to_move = explicit_first.unwrap_or(if record.handicap >= 2 {
        Stone::White
    } else {
        Stone::Black
    });
    record.setup = setup;
    Ok(record)
}

fn find<'a>(nodes: &'a [Node], key: &str) -> Option<&'a str> {
    nodes
        .iter()
        .flatten()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| v.first())
        .map(String::as_str)
}

/// `"19"` or `"19:13"`; only the width is used.
fn parse_size(raw: &str) -> Result<usize, SgfError> {
    let width = raw.split(':').next().unwrap_or("").trim();
    match width.parse::<usize>() {
        Ok(n) if (1..=MAX_SIZE).contains(&n) => Ok(n),
        _ => Err(SgfError::InvalidSize(raw.to_string())),
    }
}

/// Decode a move value: `Some(None)` is a pass, `None` is malformed.
fn decode_move(raw: &str, size: usize) -> Option<Option<Point>> {
    let raw = raw.trim();
    if raw.is_empty() || (raw == "tt" && size <= 19) {
        return Some(None);
    }
    Point::from_coord(raw).map(Some)
}

/// Apply a setup property; `color = None` clears (AE). Values may be single
/// points or `aa:cc` rectangles.
fn add_setup(setup: &mut Setup, color: Option<Stone>, values: &[String]) {
    for value in values {
        for p in expand_points(value) {
            setup.black.retain(|q| *q != p);
            setup.white.retain(|q| *q != p);
            match color {
                Some(Stone::Black) => setup.black.push(p),
                Some(Stone::White) => setup.white.push(p),
                None => {}
            }
        }
    }
}

fn expand_points(value: &str) -> Vec<Point> {
    let mut parts = value.split(':');
    let first = parts.next().and_then(Point::from_coord);
    let second = parts.next().and_then(Point::from_coord);
    match (first, second) {
        (Some(a), Some(b)) => {
            let rows = a.row.min(b.row)..=a.row.max(b.row);
            rows.flat_map(|row| (a.col.min(b.col)..=a.col.max(b.col)).map(move |col| Point::new(row, col)))
                .collect()
        }
        (Some(a), None) => vec![a],
        _ => Vec::new(),
    }
}

//! Inbound payloads.
//!
//! Every event payload is decoded exactly once, at the transport boundary,
//! into one of the types below. Decoders go through [`crate::coerce`] so a
//! field may arrive as an integer, a numeric string or a decimal; anything
//! past this module sees only strong types.

use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use tracing::debug;

use crate::coerce::{self, field_bool, field_str, field_u64};
use crate::error::WireError;
use crate::{ChallengeId, GameId, PlayerId, Point, Stone};

/// Lifecycle phase reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GamePhase {
    /// Stones are being played.
    Play,
    /// Both players passed; dead stones are being marked.
    StoneRemoval,
    /// The game has ended.
    Finished,
    /// Any phase name this client does not know.
    Other(String),
}

impl GamePhase {
    /// Parse a phase name. Never fails; unknown names map to [`GamePhase::Other`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().replace('_', " ").as_str() {
            "play" => GamePhase::Play,
            "stone removal" => GamePhase::StoneRemoval,
            "finished" => GamePhase::Finished,
            other => GamePhase::Other(other.to_string()),
        }
    }

    /// Play or scoring: the phases that count as evidence of a live game.
    pub fn is_active(&self) -> bool {
        matches!(self, GamePhase::Play | GamePhase::StoneRemoval)
    }
}

/// A player reference: id plus optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerInfo {
    /// Account id.
    pub id: PlayerId,
    /// Display name, when the payload carried one.
    pub username: Option<String>,
}

impl PlayerInfo {
    /// Decode from `{id, username}` or a bare id.
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(id) = PlayerId::from_json(value) {
            return Some(Self { id, username: None });
        }
        let id = value.get("id").and_then(PlayerId::from_json)?;
        Some(Self {
            id,
            username: field_str(value, "username").map(str::to_string),
        })
    }
}

// ===========================================================================
// Coordinates
// ===========================================================================

/// Decode one move entry into coordinate-or-pass.
///
/// Accepted shapes:
/// - `[x, y, ...]` where `x` is the column and `y` the row; a negative
///   component means pass;
/// - `{ "x": .., "y": .. }` with the same meaning;
/// - a two-letter coordinate string, or `""` / `".."` for pass.
pub fn decode_move(value: &Value) -> Result<Option<Point>, WireError> {
    match value {
        Value::Array(items) => {
            let x = items.first().and_then(coerce::as_i64);
            let y = items.get(1).and_then(coerce::as_i64);
            xy_to_point(x, y)
        }
        Value::Object(_) => xy_to_point(coerce::field_i64(value, "x"), coerce::field_i64(value, "y")),
        Value::String(s) => decode_coord_token(s),
        other => Err(WireError::invalid("move", format!("unexpected entry {}", other))),
    }
}

fn xy_to_point(x: Option<i64>, y: Option<i64>) -> Result<Option<Point>, WireError> {
    let (x, y) = match (x, y) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(WireError::invalid("move", "missing x/y component")),
    };
    if x < 0 || y < 0 {
        return Ok(None);
    }
    let col = i32::try_from(x).map_err(|_| WireError::invalid("move", "x out of range"))?;
    let row = i32::try_from(y).map_err(|_| WireError::invalid("move", "y out of range"))?;
    Ok(Some(Point::new(row, col)))
}

fn decode_coord_token(token: &str) -> Result<Option<Point>, WireError> {
    match token.trim() {
        "" | ".." => Ok(None),
        coord => Point::from_coord(coord)
            .map(Some)
            .ok_or_else(|| WireError::invalid("move", format!("bad coordinate {:?}", coord))),
    }
}

/// Decode a move list: either an array of entries (see [`decode_move`]) or a
/// string of concatenated two-letter coordinates.
pub fn decode_move_list(value: &Value) -> Result<Vec<Option<Point>>, WireError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items.iter().map(decode_move).collect(),
        Value::String(s) => split_coords(s, "moves")?
            .into_iter()
            .map(decode_coord_token)
            .collect(),
        _ => Err(WireError::invalid("moves", "expected array or string")),
    }
}

/// Decode a setup string such as `"ddpp"` into stone positions.
fn decode_setup(value: Option<&Value>, field: &'static str) -> Result<Vec<Point>, WireError> {
    let text = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::String(s)) => s,
        Some(Value::Array(items)) => {
            return items
                .iter()
                .filter_map(|item| decode_move(item).transpose())
                .collect();
        }
        Some(_) => return Err(WireError::invalid(field, "expected coordinate string")),
    };
    split_coords(text, field)?
        .into_iter()
        .map(|c| Point::from_coord(c).ok_or_else(|| WireError::invalid(field, format!("bad coordinate {:?}", c))))
        .collect()
}

fn split_coords<'a>(text: &'a str, field: &'static str) -> Result<Vec<&'a str>, WireError> {
    let text = text.trim();
    if !text.is_ascii() || text.len() % 2 != 0 {
        return Err(WireError::invalid(field, "odd length"));
    }
    Ok((0..text.len()).step_by(2).map(|i| &text[i..i + 2]).collect())
}

// ===========================================================================
// Game data
// ===========================================================================

/// Full authoritative snapshot of one game (`game/<id>/gamedata`, or the
/// one-shot state fetch).
#[derive(Debug, Clone, PartialEq)]
pub struct GameData {
    /// Game this snapshot describes; absent on some legacy payloads.
    pub game_id: Option<GameId>,
    /// Board width.
    pub width: usize,
    /// Board height (the engine assumes square boards and uses the width).
    pub height: usize,
    /// Moves in order; `None` is a pass.
    pub moves: Vec<Option<Point>>,
    /// Setup stones for black.
    pub initial_black: Vec<Point>,
    /// Setup stones for white.
    pub initial_white: Vec<Point>,
    /// Color to move before the first entry of `moves`.
    pub initial_player: Stone,
    /// Authoritative revision counter, when present.
    pub state_version: Option<u64>,
    /// Black player.
    pub black: Option<PlayerInfo>,
    /// White player.
    pub white: Option<PlayerInfo>,
    /// Current phase.
    pub phase: Option<GamePhase>,
    /// Result text (e.g. `"Resignation"`, `"3.5 points"`) once finished.
    pub outcome: Option<String>,
    /// Winning player's id once finished.
    pub winner: Option<PlayerId>,
    /// Komi, when reported.
    pub komi: Option<f64>,
    /// Time system of the game.
    pub time_control: Option<TimeControl>,
    /// Clock snapshot embedded in the game data.
    pub clock: Option<ClockSnapshot>,
}

impl GameData {
    /// Decode a snapshot payload. A single malformed move entry makes the
    /// whole payload an error.
    pub fn from_value(value: &Value) -> Result<Self, WireError> {
        if !value.is_object() {
            return Err(WireError::invalid("gamedata", "expected object"));
        }

        let width = field_u64(value, "width").unwrap_or(19) as usize;
        let height = field_u64(value, "height").map(|h| h as usize).unwrap_or(width);
        if width == 0 {
            return Err(WireError::invalid("width", "must be positive"));
        }

        let moves = decode_move_list(value.get("moves").unwrap_or(&Value::Null))?;

        let setup = value.get("initial_state");
        let initial_black = decode_setup(setup.and_then(|s| s.get("black")), "initial_state.black")?;
        let initial_white = decode_setup(setup.and_then(|s| s.get("white")), "initial_state.white")?;

        let initial_player = match field_str(value, "initial_player") {
            Some(name) => Stone::parse(name)
                .ok_or_else(|| WireError::invalid("initial_player", name.to_string()))?,
            None => Stone::Black,
        };

        let players = value.get("players");
        let black = players
            .and_then(|p| p.get("black"))
            .and_then(PlayerInfo::from_value)
            .or_else(|| value.get("black_player_id").and_then(PlayerInfo::from_value));
        let white = players
            .and_then(|p| p.get("white"))
            .and_then(PlayerInfo::from_value)
            .or_else(|| value.get("white_player_id").and_then(PlayerInfo::from_value));

        let game_id = value
            .get("game_id")
            .or_else(|| value.get("id"))
            .and_then(GameId::from_json);

        let clock = match value.get("clock") {
            Some(c) if c.is_object() => Some(ClockSnapshot::from_value(c)?),
            _ => None,
        };

        Ok(Self {
            game_id,
            width,
            height,
            moves,
            initial_black,
            initial_white,
            initial_player,
            state_version: field_u64(value, "state_version"),
            black,
            white,
            phase: field_str(value, "phase").map(GamePhase::parse),
            outcome: field_str(value, "outcome").map(str::to_string),
            winner: value.get("winner").and_then(PlayerId::from_json),
            komi: value.get("komi").and_then(coerce::as_f64),
            time_control: lenient_time_control(value.get("time_control")),
            clock,
        })
    }

    /// Whether the snapshot itself says the game is over.
    pub fn is_finished(&self) -> bool {
        self.phase == Some(GamePhase::Finished) || self.outcome.is_some()
    }

    /// The color `player` plays in this game, if any.
    pub fn color_of(&self, player: PlayerId) -> Option<Stone> {
        if self.black.as_ref().map(|p| p.id) == Some(player) {
            Some(Stone::Black)
        } else if self.white.as_ref().map(|p| p.id) == Some(player) {
            Some(Stone::White)
        } else {
            None
        }
    }
}

/// Incremental move delivery (`game/<id>/move`).
#[derive(Debug, Clone, PartialEq)]
pub struct MoveEvent {
    /// Game the move belongs to.
    pub game_id: Option<GameId>,
    /// One-based number of this move in the game.
    pub move_number: u64,
    /// Coordinate, or `None` for a pass.
    pub point: Option<Point>,
    /// Player who made the move, when reported.
    pub player_id: Option<PlayerId>,
}

impl MoveEvent {
    /// Decode a move payload.
    pub fn from_value(value: &Value) -> Result<Self, WireError> {
        let move_number = field_u64(value, "move_number").ok_or(WireError::MissingField("move_number"))?;
        let raw = value.get("move").ok_or(WireError::MissingField("move"))?;
        Ok(Self {
            game_id: value.get("game_id").and_then(GameId::from_json),
            move_number,
            point: decode_move(raw)?,
            player_id: value.get("player_id").and_then(PlayerId::from_json),
        })
    }
}

// ===========================================================================
// Clock
// ===========================================================================

/// Remaining time for one color, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlayerTime {
    /// Main (thinking) time left.
    pub main_ms: u64,
    /// Overtime periods left.
    pub periods: u32,
    /// Time left in the current period.
    pub period_ms: u64,
    /// Stones still to play in the current period (canadian).
    pub stones_left: Option<u32>,
}

impl PlayerTime {
    /// Decode from a bare number of seconds or a
    /// `{thinking_time, periods, period_time | block_time, moves_left}` object.
    pub fn from_value(value: &Value) -> Result<Self, WireError> {
        if let Some(ms) = coerce::secs_to_ms(value) {
            return Ok(Self {
                main_ms: ms,
                ..Self::default()
            });
        }
        if !value.is_object() {
            return Err(WireError::invalid("clock", "expected seconds or object"));
        }
        let secs = |key: &str| value.get(key).and_then(coerce::secs_to_ms);
        Ok(Self {
            main_ms: secs("thinking_time").unwrap_or(0),
            periods: field_u64(value, "periods").unwrap_or(0) as u32,
            period_ms: secs("period_time").or_else(|| secs("block_time")).unwrap_or(0),
            stones_left: field_u64(value, "moves_left")
                .or_else(|| field_u64(value, "stones_left"))
                .map(|s| s as u32),
        })
    }
}

/// Periodic clock snapshot (`game/<id>/clock`).
#[derive(Debug, Clone, PartialEq)]
pub struct ClockSnapshot {
    /// Game the snapshot belongs to.
    pub game_id: Option<GameId>,
    /// The color whose clock is running. `None` when the payload does not
    /// say, in which case nothing ticks.
    pub current: Option<Stone>,
    /// Black's remaining time.
    pub black: PlayerTime,
    /// White's remaining time.
    pub white: PlayerTime,
    /// Server timestamp of the snapshot, when present.
    pub server_now_ms: Option<u64>,
    /// Whether the server has paused the game.
    pub paused: bool,
}

impl ClockSnapshot {
    /// Decode a clock payload. `current_player` may be a color name or a
    /// player id matched against `black_player_id` / `white_player_id`.
    pub fn from_value(value: &Value) -> Result<Self, WireError> {
        let black = PlayerTime::from_value(value.get("black_time").ok_or(WireError::MissingField("black_time"))?)?;
        let white = PlayerTime::from_value(value.get("white_time").ok_or(WireError::MissingField("white_time"))?)?;

        let current = value.get("current_player").and_then(|cp| {
            if let Some(name) = cp.as_str().and_then(Stone::parse) {
                return Some(name);
            }
            let id = PlayerId::from_json(cp)?;
            if value.get("black_player_id").and_then(PlayerId::from_json) == Some(id) {
                Some(Stone::Black)
            } else if value.get("white_player_id").and_then(PlayerId::from_json) == Some(id) {
                Some(Stone::White)
            } else {
                None
            }
        });

        let paused = value
            .get("paused_since")
            .map(|p| !p.is_null())
            .unwrap_or(false)
            || field_bool(value, "paused").unwrap_or(false);

        Ok(Self {
            game_id: value.get("game_id").and_then(GameId::from_json),
            current,
            black,
            white,
            server_now_ms: field_u64(value, "now"),
            paused,
        })
    }

    /// Remaining time for `color`.
    pub fn time_of(&self, color: Stone) -> &PlayerTime {
        match color {
            Stone::Black => &self.black,
            Stone::White => &self.white,
        }
    }
}

/// A game's time system, all durations in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeControl {
    /// Main time, then `periods` reloading periods of `period_ms`.
    Byoyomi {
        /// Main time.
        main_ms: u64,
        /// Length of one period.
        period_ms: u64,
        /// Number of periods.
        periods: u32,
    },
    /// Increment added per move, optionally capped.
    Fischer {
        /// Starting time.
        initial_ms: u64,
        /// Time added after each move.
        increment_ms: u64,
        /// Upper bound on accumulated time.
        max_ms: Option<u64>,
    },
    /// Main time, then one period that must cover `stones` moves.
    Canadian {
        /// Main time.
        main_ms: u64,
        /// Length of one period.
        period_ms: u64,
        /// Stones to play per period.
        stones: u32,
    },
    /// Fixed time for every move.
    Simple {
        /// Time per move.
        per_move_ms: u64,
    },
    /// One total budget.
    Absolute {
        /// Total time.
        total_ms: u64,
    },
    /// Untimed.
    None,
}

/// A time control that is absent, not an object, or of an unknown system
/// decodes as `None`; the rest of the payload is still usable.
fn lenient_time_control(value: Option<&Value>) -> Option<TimeControl> {
    let value = value.filter(|tc| tc.is_object())?;
    match TimeControl::from_value(value) {
        Ok(tc) => Some(tc),
        Err(e) => {
            debug!(error = %e, "time control ignored");
            None
        }
    }
}

impl TimeControl {
    /// Decode from `{system | time_control, ...}` with durations in seconds.
    pub fn from_value(value: &Value) -> Result<Self, WireError> {
        let system = field_str(value, "system")
            .or_else(|| field_str(value, "time_control"))
            .ok_or(WireError::MissingField("system"))?;
        let secs = |key: &str| value.get(key).and_then(coerce::secs_to_ms).unwrap_or(0);
        let count = |key: &str| field_u64(value, key).unwrap_or(0) as u32;

        let tc = match system.to_ascii_lowercase().as_str() {
            "byoyomi" => TimeControl::Byoyomi {
                main_ms: secs("main_time"),
                period_ms: secs("period_time"),
                periods: count("periods"),
            },
            "fischer" => TimeControl::Fischer {
                initial_ms: secs("initial_time"),
                increment_ms: secs("time_increment"),
                max_ms: value.get("max_time").and_then(coerce::secs_to_ms),
            },
            "canadian" => TimeControl::Canadian {
                main_ms: secs("main_time"),
                period_ms: secs("period_time"),
                stones: count("stones_per_period"),
            },
            "simple" => TimeControl::Simple {
                per_move_ms: secs("per_move"),
            },
            "absolute" => TimeControl::Absolute {
                total_ms: secs("total_time"),
            },
            "none" => TimeControl::None,
            other => return Err(WireError::invalid("system", other.to_string())),
        };
        Ok(tc)
    }

    /// Encode with durations in seconds, as the server expects.
    pub fn to_json(&self) -> Value {
        let s = |ms: u64| ms as f64 / 1000.0;
        match *self {
            TimeControl::Byoyomi { main_ms, period_ms, periods } => json!({
                "system": "byoyomi", "main_time": s(main_ms),
                "period_time": s(period_ms), "periods": periods,
            }),
            TimeControl::Fischer { initial_ms, increment_ms, max_ms } => json!({
                "system": "fischer", "initial_time": s(initial_ms),
                "time_increment": s(increment_ms),
                "max_time": max_ms.map(s),
            }),
            TimeControl::Canadian { main_ms, period_ms, stones } => json!({
                "system": "canadian", "main_time": s(main_ms),
                "period_time": s(period_ms), "stones_per_period": stones,
            }),
            TimeControl::Simple { per_move_ms } => json!({
                "system": "simple", "per_move": s(per_move_ms),
            }),
            TimeControl::Absolute { total_ms } => json!({
                "system": "absolute", "total_time": s(total_ms),
            }),
            TimeControl::None => json!({ "system": "none" }),
        }
    }
}

impl Serialize for TimeControl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

// ===========================================================================
// Undo / phase / chat
// ===========================================================================

/// Undo notification (`undo_requested`, `undo_accepted`, ...). The payload
/// is either a bare move number or `{move_number}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoNotice {
    /// Move the undo refers to, when reported.
    pub move_number: Option<u64>,
}

impl UndoNotice {
    /// Decode; never fails, since the move number is advisory.
    pub fn from_value(value: &Value) -> Self {
        Self {
            move_number: coerce::as_u64(value).or_else(|| field_u64(value, "move_number")),
        }
    }
}

/// Phase change (`game/<id>/phase`). Payload is a bare phase name or
/// `{phase, outcome?, winner?}`.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseChange {
    /// New phase.
    pub phase: GamePhase,
    /// Result text, when the game just ended.
    pub outcome: Option<String>,
    /// Winner, when the game just ended.
    pub winner: Option<PlayerId>,
}

impl PhaseChange {
    /// Decode a phase payload.
    pub fn from_value(value: &Value) -> Result<Self, WireError> {
        if let Some(name) = value.as_str() {
            return Ok(Self {
                phase: GamePhase::parse(name),
                outcome: None,
                winner: None,
            });
        }
        let phase = field_str(value, "phase").ok_or(WireError::MissingField("phase"))?;
        Ok(Self {
            phase: GamePhase::parse(phase),
            outcome: field_str(value, "outcome").map(str::to_string),
            winner: value.get("winner").and_then(PlayerId::from_json),
        })
    }
}

/// One chat line (`game/<id>/chat`). The line may be wrapped in `{line: ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatLine {
    /// Author's name.
    pub username: String,
    /// Author's id.
    pub player_id: Option<PlayerId>,
    /// Message text.
    pub body: String,
    /// Channel (`main`, `spectator`, ...).
    pub channel: Option<String>,
    /// Move number the line was posted at.
    pub move_number: Option<u64>,
}

impl ChatLine {
    /// Decode a chat payload.
    pub fn from_value(value: &Value) -> Result<Self, WireError> {
        let line = value.get("line").filter(|l| l.is_object()).unwrap_or(value);
        let body = match line.get("body") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => return Err(WireError::MissingField("body")),
            Some(other) => other.to_string(),
        };
        Ok(Self {
            username: field_str(line, "username").unwrap_or("").to_string(),
            player_id: line.get("player_id").and_then(PlayerId::from_json),
            body,
            channel: field_str(value, "channel")
                .or_else(|| field_str(line, "channel"))
                .map(str::to_string),
            move_number: field_u64(line, "move_number"),
        })
    }
}

// ===========================================================================
// Lobby
// ===========================================================================

/// An open challenge in the lobby.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Challenge {
    /// Challenge id.
    pub id: ChallengeId,
    /// Game already created for this challenge, if any.
    pub game_id: Option<GameId>,
    /// Who posted it.
    pub challenger: Option<PlayerInfo>,
    /// Board width.
    pub width: usize,
    /// Board height.
    pub height: usize,
    /// Ranked game.
    pub ranked: bool,
    /// Handicap stones.
    pub handicap: u32,
    /// Komi, when fixed.
    pub komi: Option<f64>,
    /// Time system.
    pub time_control: Option<TimeControl>,
    /// Rough seconds per move advertised by the challenge.
    pub time_per_move: Option<u64>,
}

/// One record of the lobby feed.
#[derive(Debug, Clone, PartialEq)]
pub enum SeekUpdate {
    /// Insert or replace a challenge.
    Upsert(Challenge),
    /// Remove a challenge.
    Delete(ChallengeId),
}

impl SeekUpdate {
    /// Decode one feed record. A truthy `delete` marker removes the id.
    pub fn from_value(value: &Value) -> Result<Self, WireError> {
        let id = value
            .get("challenge_id")
            .and_then(ChallengeId::from_json)
            .ok_or(WireError::MissingField("challenge_id"))?;
        if field_bool(value, "delete").unwrap_or(false) {
            return Ok(SeekUpdate::Delete(id));
        }

        let challenger = match (value.get("user_id").and_then(PlayerId::from_json), value.get("user")) {
            (Some(uid), _) => Some(PlayerInfo {
                id: uid,
                username: field_str(value, "username").map(str::to_string),
            }),
            (None, Some(user)) => PlayerInfo::from_value(user),
            (None, None) => None,
        };
        let width = field_u64(value, "width").unwrap_or(19) as usize;

        Ok(SeekUpdate::Upsert(Challenge {
            id,
            game_id: value.get("game_id").and_then(GameId::from_json),
            challenger,
            width,
            height: field_u64(value, "height").map(|h| h as usize).unwrap_or(width),
            ranked: field_bool(value, "ranked").unwrap_or(false),
            handicap: field_u64(value, "handicap").unwrap_or(0) as u32,
            komi: value.get("komi").and_then(coerce::as_f64),
            time_control: lenient_time_control(value.get("time_control_parameters")),
            time_per_move: field_u64(value, "time_per_move"),
        }))
    }

    /// The challenge id this record refers to.
    pub fn challenge_id(&self) -> ChallengeId {
        match self {
            SeekUpdate::Upsert(c) => c.id,
            SeekUpdate::Delete(id) => *id,
        }
    }
}

/// Decode a `seekgraph/global` payload: an array of records or one record.
///
/// Malformed records are skipped; their count is returned so the caller can
/// record a diagnostic.
pub fn decode_seek_feed(value: &Value) -> (Vec<SeekUpdate>, usize) {
    let records: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    let mut skipped = 0;
    let updates = records
        .into_iter()
        .filter_map(|r| match SeekUpdate::from_value(r) {
            Ok(u) => Some(u),
            Err(_) => {
                skipped += 1;
                None
            }
        })
        .collect();
    (updates, skipped)
}

/// The server's "this game is active" echo (`active_game`).
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveGameEcho {
    /// The game.
    pub game_id: GameId,
    /// Reported phase.
    pub phase: Option<GamePhase>,
    /// Black player.
    pub black: Option<PlayerInfo>,
    /// White player.
    pub white: Option<PlayerInfo>,
    /// Result text, if the game already ended.
    pub outcome: Option<String>,
    /// Game name.
    pub name: Option<String>,
}

impl ActiveGameEcho {
    /// Decode an echo payload.
    pub fn from_value(value: &Value) -> Result<Self, WireError> {
        let game_id = value
            .get("id")
            .or_else(|| value.get("game_id"))
            .and_then(GameId::from_json)
            .ok_or(WireError::MissingField("id"))?;
        Ok(Self {
            game_id,
            phase: field_str(value, "phase").map(GamePhase::parse),
            black: value.get("black").and_then(PlayerInfo::from_value),
            white: value.get("white").and_then(PlayerInfo::from_value),
            outcome: field_str(value, "outcome").map(str::to_string),
            name: field_str(value, "name").map(str::to_string),
        })
    }

    /// Any signal that the game is over.
    pub fn signals_finished(&self) -> bool {
        self.phase == Some(GamePhase::Finished) || self.outcome.is_some()
    }

    /// Whether `player` is one of the two players.
    pub fn involves(&self, player: PlayerId) -> bool {
        self.black.as_ref().map(|p| p.id) == Some(player) || self.white.as_ref().map(|p| p.id) == Some(player)
    }
}

// ===========================================================================
// Identity / latency / one-shot responses
// ===========================================================================

/// The user's identity as returned by the identity fetch.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    /// Account id.
    pub player_id: PlayerId,
    /// Display name.
    pub username: String,
    /// Opaque socket auth token.
    pub jwt: String,
}

impl Identity {
    /// Decode `{user: {id, username}, user_jwt}` or a flat `{id, username, jwt}`.
    pub fn from_value(value: &Value) -> Result<Self, WireError> {
        let user = value.get("user").filter(|u| u.is_object()).unwrap_or(value);
        let player_id = user
            .get("id")
            .and_then(PlayerId::from_json)
            .ok_or(WireError::MissingField("id"))?;
        let username = field_str(user, "username")
            .ok_or(WireError::MissingField("username"))?
            .to_string();
        let jwt = field_str(value, "user_jwt")
            .or_else(|| field_str(value, "jwt"))
            .ok_or(WireError::MissingField("jwt"))?
            .to_string();
        Ok(Self {
            player_id,
            username,
            jwt,
        })
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("player_id", &self.player_id)
            .field("username", &self.username)
            .field("jwt", &"[REDACTED]")
            .finish()
    }
}

/// Server heartbeat probe (`net/ping`). The nonce is opaque and echoed as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct NetPing {
    /// Value to echo back.
    pub nonce: Value,
}

impl NetPing {
    /// Decode; a payload without a nonce echoes `null`.
    pub fn from_value(value: &Value) -> Self {
        Self {
            nonce: value.get("nonce").cloned().unwrap_or(Value::Null),
        }
    }
}

/// Reply to our heartbeat (`net/pong`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetPong {
    /// Our timestamp from the ping, echoed back.
    pub client_ms: u64,
    /// Server time when it answered.
    pub server_ms: Option<u64>,
}

impl NetPong {
    /// Decode a pong payload.
    pub fn from_value(value: &Value) -> Result<Self, WireError> {
        Ok(Self {
            client_ms: field_u64(value, "client").ok_or(WireError::MissingField("client"))?,
            server_ms: field_u64(value, "server"),
        })
    }

    /// Round-trip latency relative to `now_ms`.
    pub fn latency_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.client_ms)
    }
}

/// Response to a challenge creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeCreated {
    /// The new challenge.
    pub challenge_id: ChallengeId,
    /// Game created alongside it, if the server already made one.
    pub game_id: Option<GameId>,
}

impl ChallengeCreated {
    /// Decode `{challenge, game}` or `{challenge_id, game_id}`.
    pub fn from_value(value: &Value) -> Result<Self, WireError> {
        let challenge_id = value
            .get("challenge")
            .or_else(|| value.get("challenge_id"))
            .and_then(ChallengeId::from_json)
            .ok_or(WireError::MissingField("challenge"))?;
        Ok(Self {
            challenge_id,
            game_id: value
                .get("game")
                .or_else(|| value.get("game_id"))
                .and_then(GameId::from_json),
        })
    }
}

//! Event dispatcher: text frame in, typed route out.
//!
//! | Event name                              | Route                          |
//! |-----------------------------------------|--------------------------------|
//! | `game/<id>/gamedata`                    | [`GameEvent::Data`]            |
//! | `game/<id>/move`                        | [`GameEvent::Move`]            |
//! | `game/<id>/clock`                       | [`GameEvent::Clock`]           |
//! | `game/<id>/undo_requested`              | [`GameEvent::UndoRequested`]   |
//! | `game/<id>/undo_accepted`               | [`GameEvent::UndoAccepted`]    |
//! | `game/<id>/undo_canceled` / `_rejected` | [`GameEvent::UndoCleared`]     |
//! | `game/<id>/phase`                       | [`GameEvent::Phase`]           |
//! | `game/<id>/chat`                        | [`GameEvent::Chat`]            |
//! | `seekgraph/global`                      | [`Routed::Lobby`]              |
//! | `active_game`                           | [`Routed::ActiveGame`]         |
//! | `net/ping`, `net/pong`                  | [`Routed::NetPing`], [`Routed::NetPong`] |
//!
//! Game-scoped events for any game other than the active one are dropped
//! here, before they can touch session state.

use goban_types::messages::{
    decode_seek_feed, ActiveGameEcho, ChatLine, ClockSnapshot, GameData, MoveEvent, NetPing,
    NetPong, PhaseChange, SeekUpdate, UndoNotice,
};
use goban_types::{Frame, GameId, OpenInfo, WireError};
use serde_json::Value;
use tracing::debug;

/// A decoded game-scoped event.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// Full snapshot.
    Data(GameData),
    /// Incremental move.
    Move(MoveEvent),
    /// Clock snapshot.
    Clock(ClockSnapshot),
    /// The opponent asks to take back a move.
    UndoRequested(UndoNotice),
    /// Our undo request was granted.
    UndoAccepted(UndoNotice),
    /// A pending undo was canceled or rejected.
    UndoCleared(UndoNotice),
    /// Phase change.
    Phase(PhaseChange),
    /// Chat line.
    Chat(ChatLine),
}

/// Control frames the connection layer cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    /// Server open frame.
    Open(OpenInfo),
    /// Namespace connect confirmed.
    NamespaceConfirmed,
    /// Namespace connect refused.
    NamespaceRefused(String),
    /// Namespace or transport closed by the server.
    Closed,
    /// Transport ping; answer with a pong carrying the same data.
    Ping(Option<String>),
    /// Transport pong.
    Pong,
}

/// Why a well-formed frame was not routed anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Game-scoped event for a game other than the active one.
    ForeignGame(GameId),
    /// Event name this client does not handle.
    Unknown,
}

/// Where a frame goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// Connection-level control frame.
    Control(Control),
    /// Event for the active game.
    Game(GameId, GameEvent),
    /// Lobby feed records.
    Lobby(Vec<SeekUpdate>),
    /// Active-game echo.
    ActiveGame(ActiveGameEcho),
    /// Server heartbeat probe.
    NetPing(NetPing),
    /// Reply to our heartbeat.
    NetPong(NetPong),
    /// Not routed.
    Dropped(DropReason),
}

/// Diagnostic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Frames routed somewhere.
    pub routed: u64,
    /// Frames or records that failed to decode.
    pub malformed: u64,
    /// Events dropped because they belong to another game.
    pub foreign_game: u64,
    /// Events with a name nobody handles.
    pub unknown: u64,
}

/// Stateless router plus counters.
#[derive(Debug, Default)]
pub struct Dispatcher {
    stats: DispatchStats,
}

impl Dispatcher {
    /// Create a dispatcher with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters so far.
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Decode and route one text frame.
    ///
    /// Malformed frames are counted and returned as errors; the caller logs
    /// and drops them.
    pub fn route(&mut self, text: &str, active: Option<GameId>) -> Result<Routed, WireError> {
        let result = Frame::parse(text).and_then(|frame| self.route_frame(frame, active));
        match &result {
            Ok(Routed::Dropped(DropReason::ForeignGame(_))) => self.stats.foreign_game += 1,
            Ok(Routed::Dropped(DropReason::Unknown)) => self.stats.unknown += 1,
            Ok(_) => self.stats.routed += 1,
            Err(_) => self.stats.malformed += 1,
        }
        result
    }

    fn route_frame(&mut self, frame: Frame, active: Option<GameId>) -> Result<Routed, WireError> {
        let event = match frame {
            Frame::Open(info) => return Ok(Routed::Control(Control::Open(info))),
            Frame::Connect(_) => return Ok(Routed::Control(Control::NamespaceConfirmed)),
            Frame::ConnectError(reason) => {
                let reason = reason
                    .as_ref()
                    .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_else(|| "connect refused".to_string());
                return Ok(Routed::Control(Control::NamespaceRefused(reason)));
            }
            Frame::Close | Frame::Disconnect => return Ok(Routed::Control(Control::Closed)),
            Frame::Ping(data) => return Ok(Routed::Control(Control::Ping(data))),
            Frame::Pong(_) => return Ok(Routed::Control(Control::Pong)),
            Frame::Event(event) => event,
        };

        let payload = &event.payload;
        if let Some(rest) = event.name.strip_prefix("game/") {
            return self.route_game(rest, payload, active);
        }

        match event.name.as_str() {
            "seekgraph/global" => {
                let (updates, skipped) = decode_seek_feed(payload);
                if skipped > 0 {
                    debug!(skipped, "malformed lobby records skipped");
                    self.stats.malformed += skipped as u64;
                }
                Ok(Routed::Lobby(updates))
            }
            "active_game" => Ok(Routed::ActiveGame(ActiveGameEcho::from_value(payload)?)),
            "net/ping" => Ok(Routed::NetPing(NetPing::from_value(payload))),
            "net/pong" => Ok(Routed::NetPong(NetPong::from_value(payload)?)),
            other => {
                debug!(event = other, "unhandled event");
                Ok(Routed::Dropped(DropReason::Unknown))
            }
        }
    }

    fn route_game(&mut self, rest: &str, payload: &Value, active: Option<GameId>) -> Result<Routed, WireError> {
        let (id, kind) = match rest.split_once('/') {
            Some((id, kind)) => (id, kind),
            None => return Ok(Routed::Dropped(DropReason::Unknown)),
        };
        let game_id: GameId = match id.parse() {
            Ok(g) => g,
            // Outbound-style names (`game/move`) echoed back carry no id.
            Err(_) => return Ok(Routed::Dropped(DropReason::Unknown)),
        };
        if active != Some(game_id) {
            debug!(game = %game_id, kind, "event for inactive game dropped");
            return Ok(Routed::Dropped(DropReason::ForeignGame(game_id)));
        }

        let event = match kind {
            "gamedata" => GameEvent::Data(GameData::from_value(payload)?),
            "move" => GameEvent::Move(MoveEvent::from_value(payload)?),
            "clock" => GameEvent::Clock(ClockSnapshot::from_value(payload)?),
            "undo_requested" => GameEvent::UndoRequested(UndoNotice::from_value(payload)),
            "undo_accepted" => GameEvent::UndoAccepted(UndoNotice::from_value(payload)),
            "undo_canceled" | "undo_rejected" => GameEvent::UndoCleared(UndoNotice::from_value(payload)),
            "phase" => GameEvent::Phase(PhaseChange::from_value(payload)?),
            "chat" => GameEvent::Chat(ChatLine::from_value(payload)?),
            other => {
                debug!(game = %game_id, kind = other, "unhandled game event");
                return Ok(Routed::Dropped(DropReason::Unknown));
            }
        };
        Ok(Routed::Game(game_id, event))
    }
}

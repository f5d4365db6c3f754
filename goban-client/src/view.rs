//! The observable state published to collaborators (UI, CLI).
//!
//! A [`GameView`] is a self-contained copy: observers never borrow from the
//! client and never see a half-applied update, because the client builds a
//! fresh view once per processed input.

use goban_core::{
    Board, ConnectionState, DispatchStats, Dispatcher, GameSession, Ghost, LobbyTracker, Outcome, SessionStats,
};
use goban_types::messages::{Challenge, PlayerInfo, PlayerTime};
use goban_types::{GameId, MoveRecord, PlayerId, Stone};

use crate::identity::IdentityState;

/// Coarse connection status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Connectivity {
    /// Not connected and not trying.
    #[default]
    Offline,
    /// Socket or handshake in progress.
    Connecting,
    /// Handshake complete.
    Online,
    /// Waiting to reconnect.
    Reconnecting {
        /// Attempt number.
        attempt: u32,
    },
}

impl From<&ConnectionState> for Connectivity {
    fn from(state: &ConnectionState) -> Self {
        match state {
            ConnectionState::Disconnected => Self::Offline,
            ConnectionState::Connecting { .. }
            | ConnectionState::AwaitingOpen
            | ConnectionState::AwaitingNamespace => Self::Connecting,
            ConnectionState::Ready => Self::Online,
            ConnectionState::Reconnecting { attempt } => Self::Reconnecting { attempt: *attempt },
        }
    }
}

/// Snapshot of everything a renderer needs.
#[derive(Debug, Clone, PartialEq)]
pub struct GameView {
    /// Connection status.
    pub connectivity: Connectivity,
    /// The signed-in user, if any.
    pub user: Option<PlayerId>,
    /// Whether game actions are blocked.
    pub read_only: bool,

    /// Active live game; `None` offline.
    pub game_id: Option<GameId>,
    /// Board at the current position.
    pub board: Board,
    /// Side to move.
    pub turn: Stone,
    /// The user's color, if seated.
    pub my_color: Option<Stone>,
    /// Moves applied up to the current position.
    pub move_number: usize,
    /// Total moves in the history.
    pub history_len: usize,
    /// Most recent move at the current position.
    pub last_move: Option<MoveRecord>,
    /// Stones captured by black.
    pub black_captures: usize,
    /// Stones captured by white.
    pub white_captures: usize,
    /// Komi, when known.
    pub komi: Option<f64>,
    /// Black player.
    pub black: Option<PlayerInfo>,
    /// White player.
    pub white: Option<PlayerInfo>,

    /// Game over.
    pub finished: bool,
    /// Result, once known.
    pub outcome: Option<Outcome>,

    /// Black's remaining time.
    pub black_time: PlayerTime,
    /// White's remaining time.
    pub white_time: PlayerTime,
    /// Color whose clock runs.
    pub ticking: Option<Stone>,
    /// Name of the time system.
    pub clock_system: &'static str,

    /// Preview stone.
    pub ghost: Option<Ghost>,
    /// Our undo request is outstanding.
    pub pending_undo: bool,
    /// The opponent's outstanding undo request (move number).
    pub opponent_undo: Option<u64>,

    /// Open lobby challenges, sorted by id.
    pub challenges: Vec<Challenge>,
    /// The user's joinable games.
    pub joinable: Vec<GameId>,

    /// Frame routing counters.
    pub dispatch_stats: DispatchStats,
    /// Stale, mismatched and out-of-order update counters.
    pub session_stats: SessionStats,
}

impl GameView {
    /// Build a view from the client's state.
    pub fn capture(
        connection: &ConnectionState,
        identity: &IdentityState,
        dispatcher: &Dispatcher,
        session: &GameSession,
        lobby: &LobbyTracker,
    ) -> Self {
        let engine = session.engine();
        let clock = session.clock();
        Self {
            connectivity: Connectivity::from(connection),
            user: identity.player_id(),
            read_only: session.is_read_only(),
            game_id: session.game_id(),
            board: engine.board().clone(),
            turn: engine.turn(),
            my_color: session.my_color(),
            move_number: engine.cursor(),
            history_len: engine.len(),
            last_move: engine.last_move(),
            black_captures: engine.captures(Stone::Black),
            white_captures: engine.captures(Stone::White),
            komi: session.komi(),
            black: session.player(Stone::Black).cloned(),
            white: session.player(Stone::White).cloned(),
            finished: session.is_finished(),
            outcome: session.outcome().cloned(),
            black_time: clock.time_of(Stone::Black),
            white_time: clock.time_of(Stone::White),
            ticking: clock.ticking(),
            clock_system: clock.system(),
            ghost: session.ghost(),
            pending_undo: session.pending_undo(),
            opponent_undo: session.opponent_undo(),
            challenges: lobby.challenges().into_iter().cloned().collect(),
            joinable: lobby.joinable(),
            dispatch_stats: dispatcher.stats(),
            session_stats: session.stats(),
        }
    }

    /// Remaining time for `color`.
    pub fn time_of(&self, color: Stone) -> PlayerTime {
        match color {
            Stone::Black => self.black_time,
            Stone::White => self.white_time,
        }
    }

    /// Whether the user may move now.
    pub fn is_my_turn(&self) -> bool {
        !self.read_only && !self.finished && self.game_id.is_some() && self.my_color == Some(self.turn)
    }
}

impl Default for GameView {
    fn default() -> Self {
        Self::capture(
            &ConnectionState::default(),
            &IdentityState::default(),
            &Dispatcher::new(),
            &GameSession::new(false),
            &LobbyTracker::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goban_types::Point;

    #[test]
    fn default_view_is_offline_and_empty() {
        let view = GameView::default();
        assert_eq!(view.connectivity, Connectivity::Offline);
        assert!(view.read_only);
        assert_eq!(view.game_id, None);
        assert_eq!(view.board.size(), 19);
        assert_eq!(view.turn, Stone::Black);
        assert!(!view.is_my_turn());
        assert_eq!(view.clock_system, "none");
    }

    #[test]
    fn connectivity_follows_state() {
        assert_eq!(Connectivity::from(&ConnectionState::Ready), Connectivity::Online);
        assert_eq!(Connectivity::from(&ConnectionState::AwaitingOpen), Connectivity::Connecting);
        assert_eq!(
            Connectivity::from(&ConnectionState::Reconnecting { attempt: 2 }),
            Connectivity::Reconnecting { attempt: 2 }
        );
    }

    #[test]
    fn capture_copies_the_board() {
        let mut session = GameSession::new(false);
        let record = goban_core::sgf::parse("(;SZ[9];B[cc];W[dd])").unwrap();
        session.load_local_game(&record);
        let view = GameView::capture(
            &ConnectionState::default(),
            &IdentityState::default(),
            &Dispatcher::new(),
            &session,
            &LobbyTracker::default(),
        );

        session.seek(0);
        assert_eq!(view.board.get(Point::new(2, 2)), Some(Stone::Black));
        assert_eq!(view.move_number, 2);
        assert_eq!(view.turn, Stone::Black);
        assert_eq!(view.last_move.map(|m| m.color), Some(Stone::White));
    }
}

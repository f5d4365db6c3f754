//! Game session controller: the reconciliation core.
//!
//! One [`GameSession`] bridges user intent, the rules [`Engine`] and the
//! server for a single active game. Like the connection state machine it
//! performs no I/O: every operation mutates the session and returns the
//! [`SessionAction`]s the client must carry out. At most one
//! [`SessionAction::Publish`] is returned per operation, always last, and
//! only when something observable changed.
//!
//! Reconciliation rules in short:
//!
//! - local moves are applied optimistically and sent tagged with
//!   `local version + 1`;
//! - a full snapshot with fewer moves than are applied is a confirmed undo
//!   and always reloads;
//! - otherwise a snapshot whose version is not newer than the known one is a
//!   stale echo and is discarded, once at least one move is applied;
//! - an incremental move must be exactly the next move, or it is dropped and
//!   a later snapshot resyncs.

use std::collections::HashSet;

use goban_types::messages::{ClockSnapshot, GameData, MoveEvent, PhaseChange, PlayerInfo, UndoNotice};
use goban_types::{Directive, GameId, MoveClock, MoveRecord, PlayerId, Point, Stone};
use thiserror::Error;
use tracing::{debug, info};

use crate::clock::{policy_for, ClockSync, TickOutcome};
use crate::engine::{Engine, Setup};
use crate::sgf::GameRecord;
use crate::version::VersionTracker;

/// Why a local request was refused. No network traffic and no board change
/// happen when one of these is returned.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum MoveRejected {
    /// The game is over.
    #[error("game is finished")]
    Finished,
    /// It is the opponent's turn, or the user is not seated.
    #[error("not your turn")]
    NotYourTurn,
    /// The point already holds a stone.
    #[error("point is occupied")]
    Occupied,
    /// The point is off the board.
    #[error("point is off the board")]
    OutOfBounds,
    /// The client is in read-only (spectator) mode.
    #[error("read-only session")]
    ReadOnly,
    /// No game is active.
    #[error("no active game")]
    NoActiveGame,
    /// The connection is not ready to carry the request.
    #[error("not connected")]
    NotConnected,
}

/// Instructions for the client, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Send a directive, optionally tagged with a sequence number.
    Send {
        /// What to send.
        directive: Directive,
        /// Sequence tag.
        sequence: Option<u64>,
    },
    /// Fetch the authoritative state of a game out of band.
    RefetchGameState(GameId),
    /// Start the local clock tick.
    StartClock,
    /// Stop the local clock tick.
    StopClock,
    /// Start the per-game presence pulse.
    StartPresence,
    /// Stop the per-game presence pulse.
    StopPresence,
    /// Permanently mark a game finished in the lobby tracker.
    Shield(GameId),
    /// Observable state changed; republish the view.
    Publish,
}

/// Final result of a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Server's result text.
    pub text: String,
    /// Winning color, when known.
    pub winner: Option<Stone>,
}

/// Speculative preview stone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ghost {
    /// Where.
    pub point: Point,
    /// Whose.
    pub color: Stone,
}

/// Reconciliation diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Full snapshots discarded as stale or duplicate.
    pub stale_snapshots: u64,
    /// Incremental moves dropped for arriving out of order.
    pub out_of_order_moves: u64,
    /// Events discarded because their game id did not match.
    pub mismatched_ids: u64,
}

/// State of one game as seen by this client.
#[derive(Debug)]
pub struct GameSession {
    user: Option<PlayerId>,
    read_only: bool,
    wants_chat: bool,

    game_id: Option<GameId>,
    engine: Engine,
    clock: ClockSync,
    versions: VersionTracker,
    black: Option<PlayerInfo>,
    white: Option<PlayerInfo>,
    komi: Option<f64>,
    finished: bool,
    outcome: Option<Outcome>,
    pending_undo: bool,
    awaiting_refetch: bool,
    opponent_undo: Option<u64>,
    ghost: Option<Ghost>,
    blur_ms: u64,
    stats: SessionStats,
}

impl GameSession {
    /// A session with no active game.
    pub fn new(wants_chat: bool) -> Self {
        Self {
            user: None,
            read_only: true,
            wants_chat,
            game_id: None,
            engine: Engine::new(19),
            clock: ClockSync::default(),
            versions: VersionTracker::new(),
            black: None,
            white: None,
            komi: None,
            finished: false,
            outcome: None,
            pending_undo: false,
            awaiting_refetch: false,
            opponent_undo: None,
            ghost: None,
            blur_ms: 0,
            stats: SessionStats::default(),
        }
    }

    /// Set who the user is. `read_only` blocks every outgoing game action.
    pub fn set_identity(&mut self, user: Option<PlayerId>, read_only: bool) -> Vec<SessionAction> {
        let changed = self.user != user || self.read_only != read_only;
        self.user = user;
        self.read_only = read_only;
        publish_if(Vec::new(), changed)
    }

    // =======================================================================
    // Connection
    // =======================================================================

    /// Make `game_id` the active game.
    ///
    /// Switching from another game clears all per-game state first. The
    /// finished flag starts set only when the id is already `shielded`.
    pub fn connect(&mut self, game_id: GameId, shielded: bool) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        if let Some(old) = self.game_id.filter(|old| *old != game_id) {
            info!(from = %old, to = %game_id, "switching game");
            actions.push(send(Directive::GameDisconnect { game_id: old }));
        }
        if self.game_id != Some(game_id) {
            self.clear_game();
        }
        self.game_id = Some(game_id);
        self.finished = shielded;

        actions.push(send(Directive::GameConnect {
            game_id,
            chat: self.wants_chat,
        }));
        if self.finished {
            actions.push(SessionAction::StopClock);
            actions.push(SessionAction::StopPresence);
        } else {
            actions.push(SessionAction::StartClock);
            if !self.read_only {
                actions.push(SessionAction::StartPresence);
            }
        }
        actions.push(SessionAction::Publish);
        actions
    }

    /// Re-issue the connect directive after a reconnect.
    pub fn rejoin(&self) -> Vec<SessionAction> {
        match self.game_id {
            Some(game_id) => vec![send(Directive::GameConnect {
                game_id,
                chat: self.wants_chat,
            })],
            None => Vec::new(),
        }
    }

    /// Leave the active game.
    pub fn leave(&mut self) -> Vec<SessionAction> {
        let game_id = match self.game_id.take() {
            Some(g) => g,
            None => return Vec::new(),
        };
        self.clear_game();
        vec![
            send(Directive::GameDisconnect { game_id }),
            SessionAction::StopClock,
            SessionAction::StopPresence,
            SessionAction::Publish,
        ]
    }

    fn clear_game(&mut self) {
        self.engine = Engine::new(19);
        self.clock = ClockSync::default();
        self.versions.reset();
        self.black = None;
        self.white = None;
        self.komi = None;
        self.finished = false;
        self.outcome = None;
        self.pending_undo = false;
        self.awaiting_refetch = false;
        self.opponent_undo = None;
        self.ghost = None;
        self.blur_ms = 0;
    }

    // =======================================================================
    // User intent
    // =======================================================================

    /// Play a stone at `point`.
    pub fn request_move(&mut self, point: Point) -> Result<Vec<SessionAction>, MoveRejected> {
        let (game_id, color) = self.check_turn()?;
        if !self.engine.board().contains(point) {
            return Err(MoveRejected::OutOfBounds);
        }
        if !self.engine.board().is_empty_at(point) {
            return Err(MoveRejected::Occupied);
        }
        Ok(self.commit_local(game_id, color, Some(point)))
    }

    /// Pass.
    pub fn request_pass(&mut self) -> Result<Vec<SessionAction>, MoveRejected> {
        let (game_id, color) = self.check_turn()?;
        Ok(self.commit_local(game_id, color, None))
    }

    /// Ask the opponent to undo.
    ///
    /// The request always names the server's last known move count: the
    /// local counter may include an optimistic move the server has not
    /// numbered yet, and a request naming it is silently rejected.
    pub fn request_undo(&mut self, move_number: u64) -> Result<Vec<SessionAction>, MoveRejected> {
        let game_id = self.check_active()?;
        let remote = self.versions.remote_moves();
        if move_number != remote {
            debug!(requested = move_number, remote, "undo addressed to remote move count");
        }
        self.pending_undo = true;
        Ok(vec![
            send(Directive::UndoRequest {
                game_id,
                move_number: remote,
            }),
            SessionAction::Publish,
        ])
    }

    /// Grant the opponent's undo request.
    pub fn accept_undo(&mut self) -> Result<Vec<SessionAction>, MoveRejected> {
        let game_id = self.check_active()?;
        let move_number = self.opponent_undo.take().unwrap_or_else(|| self.versions.remote_moves());
        Ok(vec![
            SessionAction::Send {
                directive: Directive::UndoAccept { game_id, move_number },
                sequence: Some(self.versions.next_sequence()),
            },
            SessionAction::Publish,
        ])
    }

    /// Refuse the opponent's undo request.
    pub fn reject_undo(&mut self) -> Result<Vec<SessionAction>, MoveRejected> {
        let game_id = self.check_active()?;
        let had_request = self.opponent_undo.take().is_some();
        Ok(publish_if(vec![send(Directive::UndoReject { game_id })], had_request))
    }

    /// Resign. The outcome arrives from the server.
    pub fn request_resign(&mut self) -> Result<Vec<SessionAction>, MoveRejected> {
        let game_id = self.check_active()?;
        Ok(vec![send(Directive::Resign { game_id })])
    }

    /// Show or clear the preview stone. Its color is the side to move.
    pub fn set_ghost(&mut self, point: Option<Point>) -> Vec<SessionAction> {
        let ghost = point.map(|point| Ghost {
            point,
            color: self.engine.turn(),
        });
        let changed = self.ghost != ghost;
        self.ghost = ghost;
        publish_if(Vec::new(), changed)
    }

    /// Milliseconds the UI was unfocused since the last move; reported with
    /// the next move.
    pub fn add_blur(&mut self, ms: u64) {
        self.blur_ms = self.blur_ms.saturating_add(ms);
    }

    /// Offline replay: drop any active game and load `record`.
    pub fn load_local_game(&mut self, record: &GameRecord) -> Vec<SessionAction> {
        let mut actions = self.leave();
        actions.retain(|a| *a != SessionAction::Publish);
        self.clear_game();
        self.engine = record.to_engine();
        self.komi = record.komi;
        actions.push(SessionAction::Publish);
        actions
    }

    /// Navigate an offline replay. Ignored while a live game is active.
    pub fn seek(&mut self, index: usize) -> Vec<SessionAction> {
        if self.game_id.is_some() {
            debug!(index, "seek ignored during a live game");
            return Vec::new();
        }
        let before = self.engine.cursor();
        self.engine.seek(index);
        self.ghost = None;
        publish_if(Vec::new(), self.engine.cursor() != before)
    }

    fn check_active(&self) -> Result<GameId, MoveRejected> {
        let game_id = self.game_id.ok_or(MoveRejected::NoActiveGame)?;
        if self.read_only {
            return Err(MoveRejected::ReadOnly);
        }
        if self.finished {
            return Err(MoveRejected::Finished);
        }
        Ok(game_id)
    }

    fn check_turn(&self) -> Result<(GameId, Stone), MoveRejected> {
        let game_id = self.check_active()?;
        let turn = self.engine.turn();
        match self.my_color() {
            Some(color) if color == turn => Ok((game_id, color)),
            _ => Err(MoveRejected::NotYourTurn),
        }
    }

    fn commit_local(&mut self, game_id: GameId, color: Stone, point: Option<Point>) -> Vec<SessionAction> {
        let sequence = self.versions.next_sequence();
        self.engine.apply(color, point);
        self.clock.on_move(color);
        self.versions.set_local(self.engine.cursor() as u64);
        self.ghost = None;

        let clock = MoveClock {
            black_ms: self.clock.display_ms(Stone::Black),
            white_ms: self.clock.display_ms(Stone::White),
        };
        let blur_ms = std::mem::take(&mut self.blur_ms);
        vec![
            SessionAction::Send {
                directive: Directive::Move {
                    game_id,
                    point,
                    blur_ms,
                    clock: Some(clock),
                },
                sequence: Some(sequence),
            },
            SessionAction::Publish,
        ]
    }

    // =======================================================================
    // Server input
    // =======================================================================

    /// Reconcile against a full snapshot.
    pub fn receive_game_data(&mut self, data: GameData) -> Vec<SessionAction> {
        if !self.matches(data.game_id) {
            return Vec::new();
        }

        let applied = self.engine.cursor();
        let undo = data.moves.len() < applied;
        // Compared against the version known *before* this payload.
        if !undo && applied > 0 && self.versions.is_stale(data.state_version) {
            self.stats.stale_snapshots += 1;
            debug!(
                version = ?data.state_version,
                known = ?self.versions.known(),
                "stale game data discarded"
            );
            return Vec::new();
        }

        let pending_before = self.pending_undo;
        self.pending_undo = false;
        self.awaiting_refetch = false;

        let setup = Setup {
            size: data.width,
            black: data.initial_black.clone(),
            white: data.initial_white.clone(),
            to_move: data.initial_player,
        };
        let mut color = data.initial_player;
        let records: Vec<MoveRecord> = data
            .moves
            .iter()
            .map(|point| {
                let record = MoveRecord { color, point: *point };
                color = color.opponent();
                record
            })
            .collect();

        let changed = pending_before
            || self.engine.setup() != &setup
            || self.engine.history() != records.as_slice()
            || self.engine.cursor() != records.len()
            || self.black != data.black
            || self.white != data.white;

        if changed {
            self.engine.load(setup, records);
        }
        if undo {
            info!(from = applied, to = data.moves.len(), "undo confirmed, board rolled back");
            self.versions.rollback(data.moves.len() as u64, data.state_version);
        } else {
            if let Some(v) = data.state_version {
                self.versions.observe(v);
            }
            self.versions.observe_move(data.moves.len() as u64);
        }
        self.versions.set_local(self.engine.cursor() as u64);

        self.black = data.black.clone();
        self.white = data.white.clone();
        if data.komi.is_some() {
            self.komi = data.komi;
        }
        if let Some(tc) = &data.time_control {
            self.clock.set_policy(policy_for(tc));
        }
        if changed {
            self.ghost = None;
        }

        if data.is_finished() {
            let text = data.outcome.clone().unwrap_or_else(|| "finished".to_string());
            let mut actions = self.outcome_actions(text, data.winner);
            if !actions.contains(&SessionAction::Publish) && changed {
                actions.push(SessionAction::Publish);
            }
            return actions;
        }
        publish_if(Vec::new(), changed)
    }

    /// Apply an incremental move if it is exactly the next one.
    pub fn receive_move_event(&mut self, event: MoveEvent) -> Vec<SessionAction> {
        if !self.matches(event.game_id) {
            return Vec::new();
        }
        self.versions.observe_move(event.move_number);

        let applied = self.engine.cursor() as u64;
        if event.move_number != applied + 1 {
            if event.move_number > applied + 1 {
                self.stats.out_of_order_moves += 1;
                debug!(move_number = event.move_number, applied, "out-of-order move dropped");
            } else {
                debug!(move_number = event.move_number, applied, "echo of applied move ignored");
            }
            return Vec::new();
        }

        let color = event
            .player_id
            .and_then(|p| self.color_of(p))
            .unwrap_or_else(|| self.engine.turn());
        self.engine.apply(color, event.point);
        self.clock.on_move(color);
        self.versions.set_local(self.engine.cursor() as u64);
        self.pending_undo = false;
        self.ghost = None;
        vec![SessionAction::Publish]
    }

    /// Adopt a clock snapshot taken at `now_ms`.
    pub fn receive_clock(&mut self, snapshot: &ClockSnapshot, now_ms: u64) -> Vec<SessionAction> {
        if !self.matches(snapshot.game_id) {
            return Vec::new();
        }
        self.clock.apply_snapshot(snapshot, now_ms);
        if self.finished {
            self.clock.stop();
        }
        vec![SessionAction::Publish]
    }

    /// Advance the local clock.
    pub fn tick_clock(&mut self, now_ms: u64) -> TickOutcome {
        if self.finished {
            return TickOutcome::Idle;
        }
        self.clock.tick(now_ms)
    }

    /// The opponent asks to undo.
    pub fn receive_undo_requested(&mut self, notice: UndoNotice) -> Vec<SessionAction> {
        let move_number = notice.move_number.unwrap_or_else(|| self.versions.remote_moves());
        self.opponent_undo = Some(move_number);
        vec![SessionAction::Publish]
    }

    /// Our undo was accepted: refetch, and keep the pending flag until the
    /// refetched snapshot is reconciled.
    pub fn receive_undo_accepted(&mut self) -> Vec<SessionAction> {
        match self.game_id {
            Some(game_id) => {
                self.awaiting_refetch = true;
                vec![SessionAction::RefetchGameState(game_id)]
            }
            None => Vec::new(),
        }
    }

    /// An undo request (ours or theirs) was canceled or rejected.
    pub fn receive_undo_cleared(&mut self) -> Vec<SessionAction> {
        let changed = self.pending_undo || self.opponent_undo.is_some();
        self.pending_undo = false;
        self.opponent_undo = None;
        publish_if(Vec::new(), changed)
    }

    /// Phase change; `finished` takes the outcome path.
    pub fn receive_phase(&mut self, change: PhaseChange) -> Vec<SessionAction> {
        if change.phase == goban_types::messages::GamePhase::Finished {
            let text = change.outcome.unwrap_or_else(|| "finished".to_string());
            return self.receive_outcome(text, change.winner);
        }
        Vec::new()
    }

    /// The game ended.
    pub fn receive_outcome(&mut self, text: String, winner: Option<PlayerId>) -> Vec<SessionAction> {
        self.outcome_actions(text, winner)
    }

    fn outcome_actions(&mut self, text: String, winner: Option<PlayerId>) -> Vec<SessionAction> {
        let game_id = match self.game_id {
            Some(g) => g,
            None => return Vec::new(),
        };
        let outcome = Outcome {
            winner: winner.and_then(|w| self.color_of(w)),
            text,
        };
        let changed = !self.finished || self.outcome.as_ref() != Some(&outcome);
        if !self.finished {
            info!(game = %game_id, outcome = %outcome.text, "game finished");
        }
        self.finished = true;
        self.outcome = Some(outcome);
        self.clock.stop();
        self.ghost = None;
        publish_if(
            vec![
                SessionAction::StopClock,
                SessionAction::StopPresence,
                SessionAction::Shield(game_id),
            ],
            changed,
        )
    }

    /// Refetch after an accepted undo failed; allow the next snapshot to
    /// clear the flag normally.
    pub fn refetch_failed(&mut self) {
        self.awaiting_refetch = false;
    }

    fn matches(&mut self, incoming: Option<GameId>) -> bool {
        match (self.game_id, incoming) {
            (Some(active), Some(id)) if active == id => true,
            (Some(_), None) => true,
            (active, id) => {
                self.stats.mismatched_ids += 1;
                debug!(active = ?active, incoming = ?id, "game id mismatch");
                false
            }
        }
    }

    fn color_of(&self, player: PlayerId) -> Option<Stone> {
        if self.black.as_ref().map(|p| p.id) == Some(player) {
            Some(Stone::Black)
        } else if self.white.as_ref().map(|p| p.id) == Some(player) {
            Some(Stone::White)
        } else {
            None
        }
    }

    // =======================================================================
    // Accessors
    // =======================================================================

    /// The active game.
    pub fn game_id(&self) -> Option<GameId> {
        self.game_id
    }

    /// The rules engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The clock.
    pub fn clock(&self) -> &ClockSync {
        &self.clock
    }

    /// The user's color in the active game, if seated.
    pub fn my_color(&self) -> Option<Stone> {
        self.user.and_then(|u| self.color_of(u))
    }

    /// Player info for `color`.
    pub fn player(&self, color: Stone) -> Option<&PlayerInfo> {
        match color {
            Stone::Black => self.black.as_ref(),
            Stone::White => self.white.as_ref(),
        }
    }

    /// Whether the game is over.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Final result, once known.
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// Whether our undo request is outstanding.
    pub fn pending_undo(&self) -> bool {
        self.pending_undo
    }

    /// Whether a refetch after an accepted undo is in flight.
    pub fn awaiting_refetch(&self) -> bool {
        self.awaiting_refetch
    }

    /// The opponent's outstanding undo request.
    pub fn opponent_undo(&self) -> Option<u64> {
        self.opponent_undo
    }

    /// Preview stone.
    pub fn ghost(&self) -> Option<Ghost> {
        self.ghost
    }

    /// Komi, when known.
    pub fn komi(&self) -> Option<f64> {
        self.komi
    }

    /// Whether the session may send game actions.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Version counters.
    pub fn versions(&self) -> &VersionTracker {
        &self.versions
    }

    /// Diagnostics.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Score of the current position with `dead` stones removed.
    pub fn score(&self, dead: &HashSet<Point>) -> crate::engine::Score {
        self.engine.score(dead, self.komi.unwrap_or(0.0))
    }
}

fn send(directive: Directive) -> SessionAction {
    SessionAction::Send {
        directive,
        sequence: None,
    }
}

fn publish_if(mut actions: Vec<SessionAction>, changed: bool) -> Vec<SessionAction> {
    if changed {
        actions.push(SessionAction::Publish);
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use goban_types::messages::{GamePhase, PlayerTime};

    const GAME: GameId = GameId::new(42);
    const ME: PlayerId = PlayerId::new(1);
    const THEM: PlayerId = PlayerId::new(2);

    fn player(id: PlayerId) -> Option<PlayerInfo> {
        Some(PlayerInfo { id, username: None })
    }

    fn gamedata(moves: Vec<Option<Point>>, version: Option<u64>) -> GameData {
        GameData {
            game_id: Some(GAME),
            width: 9,
            height: 9,
            moves,
            initial_black: Vec::new(),
            initial_white: Vec::new(),
            initial_player: Stone::Black,
            state_version: version,
            black: player(ME),
            white: player(THEM),
            phase: Some(GamePhase::Play),
            outcome: None,
            winner: None,
            komi: Some(6.5),
            time_control: None,
            clock: None,
        }
    }

    fn pts(n: usize) -> Vec<Option<Point>> {
        (0..n).map(|i| Some(Point::new(i as i32, 0))).collect()
    }

    fn seated() -> GameSession {
        let mut s = GameSession::new(true);
        s.set_identity(Some(ME), false);
        s.connect(GAME, false);
        s
    }

    fn sent(actions: &[SessionAction]) -> Vec<(&Directive, Option<u64>)> {
        actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Send { directive, sequence } => Some((directive, *sequence)),
                _ => None,
            })
            .collect()
    }

    fn publishes(actions: &[SessionAction]) -> usize {
        actions.iter().filter(|a| **a == SessionAction::Publish).count()
    }

    // ==========================================================================
    // Connect / leave
    // ==========================================================================

    #[test]
    fn connect_sends_directive_and_starts_clock() {
        let mut s = GameSession::new(true);
        s.set_identity(Some(ME), false);
        let actions = s.connect(GAME, false);
        assert_eq!(
            sent(&actions),
            vec![(&Directive::GameConnect { game_id: GAME, chat: true }, None)]
        );
        assert!(actions.contains(&SessionAction::StartClock));
        assert!(actions.contains(&SessionAction::StartPresence));
        assert_eq!(actions.last(), Some(&SessionAction::Publish));
    }

    #[test]
    fn connect_to_shielded_game_stays_finished() {
        let mut s = GameSession::new(false);
        let actions = s.connect(GAME, true);
        assert!(s.is_finished());
        assert!(!actions.contains(&SessionAction::StartClock));
    }

    #[test]
    fn switching_games_clears_state() {
        let mut s = seated();
        s.receive_game_data(gamedata(pts(3), Some(3)));
        let actions = s.connect(GameId::new(7), false);

        assert_eq!(
            sent(&actions)[0].0,
            &Directive::GameDisconnect { game_id: GAME }
        );
        assert_eq!(s.engine().cursor(), 0);
        assert_eq!(s.versions().known(), None);
        assert_eq!(s.game_id(), Some(GameId::new(7)));
    }

    #[test]
    fn rejoin_reissues_connect() {
        let s = seated();
        assert_eq!(sent(&s.rejoin()).len(), 1);
        assert!(GameSession::new(true).rejoin().is_empty());
    }

    // ==========================================================================
    // Local moves
    // ==========================================================================

    #[test]
    fn request_move_applies_optimistically_with_sequence() {
        let mut s = seated();
        s.receive_game_data(gamedata(Vec::new(), Some(1)));

        let actions = s.request_move(Point::new(2, 2)).unwrap();
        assert_eq!(s.engine().board().get(Point::new(2, 2)), Some(Stone::Black));
        let sends = sent(&actions);
        assert_eq!(sends.len(), 1);
        assert!(matches!(
            sends[0],
            (Directive::Move { point: Some(p), .. }, Some(1)) if *p == Point::new(2, 2)
        ));
        assert_eq!(publishes(&actions), 1);
    }

    #[test]
    fn request_move_rejections() {
        let mut s = GameSession::new(true);
        assert_eq!(s.request_move(Point::new(0, 0)), Err(MoveRejected::NoActiveGame));

        s.connect(GAME, false);
        assert_eq!(s.request_move(Point::new(0, 0)), Err(MoveRejected::ReadOnly));

        s.set_identity(Some(ME), false);
        s.receive_game_data(gamedata(pts(1), Some(1)));
        // One move applied, white (them) to move.
        assert_eq!(s.request_move(Point::new(5, 5)), Err(MoveRejected::NotYourTurn));

        s.receive_game_data(gamedata(pts(2), Some(2)));
        assert_eq!(s.request_move(Point::new(0, 0)), Err(MoveRejected::Occupied));
        assert_eq!(s.request_move(Point::new(9, 0)), Err(MoveRejected::OutOfBounds));
        assert_eq!(s.engine().cursor(), 2);

        s.receive_outcome("Resignation".into(), Some(THEM));
        assert_eq!(s.request_move(Point::new(5, 5)), Err(MoveRejected::Finished));
    }

    #[test]
    fn spectator_is_never_on_turn() {
        let mut s = GameSession::new(true);
        s.set_identity(Some(PlayerId::new(99)), false);
        s.connect(GAME, false);
        s.receive_game_data(gamedata(Vec::new(), Some(1)));
        assert_eq!(s.request_pass(), Err(MoveRejected::NotYourTurn));
    }

    #[test]
    fn pass_flips_turn() {
        let mut s = seated();
        s.receive_game_data(gamedata(Vec::new(), Some(1)));
        let actions = s.request_pass().unwrap();
        assert!(matches!(sent(&actions)[0], (Directive::Move { point: None, .. }, Some(1))));
        assert_eq!(s.engine().turn(), Stone::White);
        assert_eq!(s.engine().board().stones().count(), 0);
    }

    #[test]
    fn own_move_echo_is_ignored() {
        let mut s = seated();
        s.receive_game_data(gamedata(Vec::new(), Some(1)));
        s.request_move(Point::new(4, 4)).unwrap();

        let actions = s.receive_move_event(MoveEvent {
            game_id: Some(GAME),
            move_number: 1,
            point: Some(Point::new(4, 4)),
            player_id: Some(ME),
        });
        assert!(actions.is_empty());
        assert_eq!(s.engine().cursor(), 1);
        assert_eq!(s.stats().out_of_order_moves, 0);
    }

    #[test]
    fn blur_is_reported_once() {
        let mut s = seated();
        s.receive_game_data(gamedata(Vec::new(), Some(1)));
        s.add_blur(250);
        let actions = s.request_pass().unwrap();
        assert!(matches!(sent(&actions)[0].0, Directive::Move { blur_ms: 250, .. }));
        assert_eq!(s.blur_ms, 0);
    }

    // ==========================================================================
    // Snapshots
    // ==========================================================================

    #[test]
    fn identical_snapshot_twice_changes_nothing() {
        let mut s = seated();
        let first = s.receive_game_data(gamedata(pts(4), Some(5)));
        assert_eq!(publishes(&first), 1);
        let board = s.engine().board().clone();

        let second = s.receive_game_data(gamedata(pts(4), Some(5)));
        assert!(second.is_empty());
        assert_eq!(s.engine().board(), &board);
        assert_eq!(s.stats().stale_snapshots, 1);
    }

    #[test]
    fn identical_unversioned_snapshot_does_not_publish() {
        let mut s = seated();
        s.receive_game_data(gamedata(pts(4), None));
        assert!(s.receive_game_data(gamedata(pts(4), None)).is_empty());
    }

    #[test]
    fn older_version_with_more_moves_is_discarded() {
        let mut s = seated();
        s.receive_game_data(gamedata(pts(3), Some(10)));
        let actions = s.receive_game_data(gamedata(pts(4), Some(9)));
        assert!(actions.is_empty());
        assert_eq!(s.engine().cursor(), 3);
    }

    #[test]
    fn shorter_move_list_is_undo_regardless_of_version() {
        let mut s = seated();
        s.receive_game_data(gamedata(pts(5), Some(10)));
        s.request_undo(5).ok();

        let actions = s.receive_game_data(gamedata(pts(4), Some(3)));
        assert_eq!(publishes(&actions), 1);
        assert_eq!(s.engine().cursor(), 4);
        assert_eq!(s.versions().remote_moves(), 4);
        assert_eq!(s.versions().known(), Some(10));
        assert!(!s.pending_undo());
    }

    #[test]
    fn late_echo_from_before_undo_is_stale() {
        let mut s = seated();
        s.receive_game_data(gamedata(pts(5), Some(10)));
        s.request_undo(5).ok();
        s.receive_game_data(gamedata(pts(4), Some(8)));
        assert_eq!(s.engine().cursor(), 4);

        let actions = s.receive_game_data(gamedata(pts(5), Some(10)));
        assert!(actions.is_empty());
        assert_eq!(s.engine().cursor(), 4);
        assert_eq!(s.stats().stale_snapshots, 1);

        s.receive_game_data(gamedata(pts(5), Some(11)));
        assert_eq!(s.engine().cursor(), 5);
    }

    #[test]
    fn replay_alternates_from_initial_player() {
        let mut s = seated();
        let mut data = gamedata(vec![Some(Point::new(0, 0)), None, Some(Point::new(1, 1))], Some(1));
        data.initial_player = Stone::White;
        s.receive_game_data(data);

        let history = s.engine().history();
        assert_eq!(history[0].color, Stone::White);
        assert_eq!(history[1], MoveRecord::pass(Stone::Black));
        assert_eq!(history[2].color, Stone::White);
        assert_eq!(s.engine().turn(), Stone::Black);
    }

    #[test]
    fn snapshot_for_other_game_is_ignored() {
        let mut s = seated();
        let mut data = gamedata(pts(2), Some(1));
        data.game_id = Some(GameId::new(9));
        assert!(s.receive_game_data(data).is_empty());
        assert_eq!(s.stats().mismatched_ids, 1);
    }

    #[test]
    fn finished_snapshot_takes_outcome_path() {
        let mut s = seated();
        let mut data = gamedata(pts(2), Some(1));
        data.outcome = Some("B+R".into());
        data.winner = Some(ME);
        let actions = s.receive_game_data(data);

        assert!(s.is_finished());
        assert_eq!(s.outcome().and_then(|o| o.winner), Some(Stone::Black));
        assert!(actions.contains(&SessionAction::Shield(GAME)));
        assert!(actions.contains(&SessionAction::StopClock));
        assert_eq!(actions.last(), Some(&SessionAction::Publish));
        assert_eq!(publishes(&actions), 1);
    }

    // ==========================================================================
    // Incremental moves
    // ==========================================================================

    #[test]
    fn next_move_applies() {
        let mut s = seated();
        s.receive_game_data(gamedata(pts(2), Some(2)));
        let actions = s.receive_move_event(MoveEvent {
            game_id: Some(GAME),
            move_number: 3,
            point: Some(Point::new(8, 8)),
            player_id: None,
        });
        assert_eq!(actions, vec![SessionAction::Publish]);
        assert_eq!(s.engine().board().get(Point::new(8, 8)), Some(Stone::Black));
        assert_eq!(s.versions().remote_moves(), 3);
    }

    #[test]
    fn out_of_order_move_is_dropped() {
        let mut s = seated();
        s.receive_game_data(gamedata(pts(2), Some(2)));
        let actions = s.receive_move_event(MoveEvent {
            game_id: Some(GAME),
            move_number: 4,
            point: Some(Point::new(8, 8)),
            player_id: None,
        });
        assert!(actions.is_empty());
        assert_eq!(s.engine().cursor(), 2);
        assert_eq!(s.stats().out_of_order_moves, 1);
    }

    #[test]
    fn explicit_player_sets_color() {
        let mut s = seated();
        s.receive_game_data(gamedata(Vec::new(), Some(1)));
        s.receive_move_event(MoveEvent {
            game_id: None,
            move_number: 1,
            point: Some(Point::new(3, 3)),
            player_id: Some(THEM),
        });
        assert_eq!(s.engine().board().get(Point::new(3, 3)), Some(Stone::White));
    }

    // ==========================================================================
    // Undo
    // ==========================================================================

    #[test]
    fn undo_request_uses_remote_move_count() {
        let mut s = seated();
        s.receive_game_data(gamedata(pts(2), Some(2)));
        s.request_move(Point::new(5, 5)).unwrap();
        assert_eq!(s.engine().cursor(), 3);

        let actions = s.request_undo(3).unwrap();
        assert_eq!(
            sent(&actions),
            vec![(&Directive::UndoRequest { game_id: GAME, move_number: 2 }, None)]
        );
        assert!(s.pending_undo());
    }

    #[test]
    fn undo_accepted_refetches_and_keeps_pending() {
        let mut s = seated();
        s.receive_game_data(gamedata(pts(3), Some(3)));
        s.request_undo(3).unwrap();

        let actions = s.receive_undo_accepted();
        assert_eq!(actions, vec![SessionAction::RefetchGameState(GAME)]);
        assert!(s.pending_undo());
        assert!(s.awaiting_refetch());

        s.receive_game_data(gamedata(pts(2), Some(4)));
        assert!(!s.pending_undo());
        assert!(!s.awaiting_refetch());
        assert_eq!(s.engine().cursor(), 2);
    }

    #[test]
    fn opponent_undo_accept_and_reject() {
        let mut s = seated();
        s.receive_game_data(gamedata(pts(3), Some(3)));
        s.receive_undo_requested(UndoNotice { move_number: Some(3) });
        assert_eq!(s.opponent_undo(), Some(3));

        let actions = s.accept_undo().unwrap();
        assert_eq!(
            sent(&actions),
            vec![(&Directive::UndoAccept { game_id: GAME, move_number: 3 }, Some(4))]
        );
        assert_eq!(s.opponent_undo(), None);

        s.receive_undo_requested(UndoNotice { move_number: None });
        let actions = s.reject_undo().unwrap();
        assert_eq!(sent(&actions)[0].0, &Directive::UndoReject { game_id: GAME });
        assert_eq!(publishes(&actions), 1);
    }

    #[test]
    fn undo_cleared_resets_flags() {
        let mut s = seated();
        s.receive_game_data(gamedata(pts(1), Some(1)));
        s.request_undo(1).unwrap();
        assert_eq!(s.receive_undo_cleared(), vec![SessionAction::Publish]);
        assert!(!s.pending_undo());
        assert!(s.receive_undo_cleared().is_empty());
    }

    // ==========================================================================
    // Outcome, clock, ghost, offline
    // ==========================================================================

    #[test]
    fn phase_finished_stops_everything_once() {
        let mut s = seated();
        s.receive_game_data(gamedata(pts(2), Some(2)));
        let actions = s.receive_phase(PhaseChange {
            phase: GamePhase::Finished,
            outcome: Some("W+T".into()),
            winner: Some(THEM),
        });
        assert!(actions.contains(&SessionAction::StopPresence));
        assert_eq!(publishes(&actions), 1);

        let again = s.receive_outcome("W+T".into(), Some(THEM));
        assert_eq!(publishes(&again), 0);
        assert_eq!(s.tick_clock(10_000), TickOutcome::Idle);
    }

    #[test]
    fn clock_snapshot_drives_ticks() {
        let mut s = seated();
        let mut data = gamedata(Vec::new(), Some(1));
        data.time_control = Some(goban_types::TimeControl::Absolute { total_ms: 5_000 });
        s.receive_game_data(data);
        assert_eq!(s.clock().system(), "absolute");
        let t = PlayerTime {
            main_ms: 5_000,
            ..PlayerTime::default()
        };
        s.receive_clock(
            &ClockSnapshot {
                game_id: Some(GAME),
                current: Some(Stone::White),
                black: t,
                white: t,
                server_now_ms: None,
                paused: false,
            },
            1_000,
        );
        assert!(matches!(s.tick_clock(1_500), TickOutcome::Ticked(Stone::White, _)));
        assert_eq!(s.clock().time_of(Stone::White).main_ms, 4_500);
    }

    #[test]
    fn clock_runs_without_a_time_control() {
        let mut s = seated();
        s.receive_game_data(gamedata(Vec::new(), Some(1)));
        let t = PlayerTime {
            main_ms: 5_000,
            ..PlayerTime::default()
        };
        s.receive_clock(
            &ClockSnapshot {
                game_id: Some(GAME),
                current: Some(Stone::Black),
                black: t,
                white: t,
                server_now_ms: None,
                paused: false,
            },
            1_000,
        );
        assert!(matches!(s.tick_clock(1_500), TickOutcome::Ticked(Stone::Black, _)));
        assert_eq!(s.clock().time_of(Stone::Black).main_ms, 4_500);
        assert_eq!(s.clock().time_of(Stone::White).main_ms, 5_000);
    }

    #[test]
    fn ghost_uses_turn_color_and_clears_on_update() {
        let mut s = seated();
        s.receive_game_data(gamedata(pts(1), Some(1)));
        assert_eq!(s.set_ghost(Some(Point::new(6, 6))), vec![SessionAction::Publish]);
        assert_eq!(s.ghost().map(|g| g.color), Some(Stone::White));
        assert!(s.set_ghost(Some(Point::new(6, 6))).is_empty());

        s.receive_move_event(MoveEvent {
            game_id: Some(GAME),
            move_number: 2,
            point: None,
            player_id: None,
        });
        assert_eq!(s.ghost(), None);
    }

    #[test]
    fn offline_replay_and_seek() {
        let record = crate::sgf::parse("(;SZ[9];B[aa];W[bb];B[cc])").unwrap();
        let mut s = seated();
        let actions = s.load_local_game(&record);
        assert!(matches!(sent(&actions)[0].0, Directive::GameDisconnect { .. }));
        assert_eq!(actions.last(), Some(&SessionAction::Publish));
        assert_eq!(s.game_id(), None);
        assert_eq!(s.engine().cursor(), 3);

        assert_eq!(s.seek(1), vec![SessionAction::Publish]);
        assert_eq!(s.engine().board().stones().count(), 1);
        assert!(s.seek(1).is_empty());
    }

    #[test]
    fn seek_ignored_during_live_game() {
        let mut s = seated();
        s.receive_game_data(gamedata(pts(3), Some(3)));
        assert!(s.seek(0).is_empty());
        assert_eq!(s.engine().cursor(), 3);
    }
}

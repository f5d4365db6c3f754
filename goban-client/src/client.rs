//! GoClient - the main interface for goban.
//!
//! This module provides [`GoClient`], the handle applications use to play
//! and watch games.
//!
//! # Architecture
//!
//! GoClient owns no game state. [`GoClient::start`] spawns one actor task
//! that owns everything (connection state machine, session controller,
//! lobby tracker) and performs the I/O those pure state machines ask for.
//! Handle methods queue commands to it and at most wait for its local
//! validation.
//!
//! ```text
//! Application → GoClient ─commands─▶ actor → Transport → Network
//!      ▲                               │
//!      └──── watch<GameView> / mpsc<ClientEvent>
//! ```
//!
//! # Example
//!
//! ```ignore
//! use goban_client::{ClientConfig, GoClient, HttpApi, WsTransport};
//!
//! let config = ClientConfig::default();
//! let api = HttpApi::new(&config.server);
//! let (client, mut view, mut events) = GoClient::start(config, WsTransport::new(), api);
//!
//! client.connect()?;
//! client.join_game(GameId::new(123))?;
//! view.changed().await?;
//! client.request_move(Point::new(3, 3)).await?;
//! ```

use std::collections::HashSet;

use goban_core::lobby::LobbyChange;
use goban_core::sgf::{self, SgfError};
use goban_core::{ConnectionEvent, MoveRejected, Score};
use goban_types::messages::{ChallengeCreated, ChatLine};
use goban_types::{ChallengeId, ChallengeParams, GameId, Point, Stone};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::api::{ApiError, GameApi};
use crate::config::ClientConfig;
use crate::runner::Runner;
use crate::transport::Transport;
use crate::view::GameView;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request was refused locally; nothing was sent.
    #[error("move rejected: {0}")]
    Rejected(#[from] MoveRejected),

    /// The SGF file could not be loaded.
    #[error("invalid SGF: {0}")]
    Sgf(#[from] SgfError),

    /// The client task has stopped.
    #[error("client is shut down")]
    Closed,
}

/// Discrete notifications. State lives in the [`GameView`]; these are the
/// things that happen *once*.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Connection lifecycle change.
    Connectivity(ConnectionEvent),
    /// Identity resolution failed; the client is read-only.
    ReadOnly {
        /// Why.
        reason: String,
    },
    /// Identity resolved.
    SignedIn {
        /// Display name.
        username: String,
    },
    /// A chat line in the active game.
    Chat {
        /// Game it was posted in.
        game_id: GameId,
        /// The line.
        line: ChatLine,
    },
    /// Lobby changes.
    Lobby(Vec<LobbyChange>),
    /// A color ran out of time locally.
    Expired(Stone),
    /// Heartbeat round trip.
    Latency {
        /// Milliseconds.
        ms: u64,
    },
    /// A challenge we accepted produced a game (now joined).
    ChallengeAccepted {
        /// The accepted challenge.
        challenge_id: ChallengeId,
        /// The game it became.
        game_id: GameId,
    },
    /// Our challenge was posted.
    ChallengeCreated(ChallengeCreated),
    /// A one-shot API call failed.
    ApiFailed {
        /// Which call.
        operation: &'static str,
        /// What went wrong.
        error: ApiError,
    },
}

pub(crate) type Reply = oneshot::Sender<Result<(), MoveRejected>>;

/// Commands from the handle to the actor.
#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Disconnect,
    JoinGame(GameId),
    LeaveGame,
    Move(Point, Reply),
    Pass(Reply),
    Undo(Reply),
    AcceptUndo(Reply),
    RejectUndo(Reply),
    Resign(Reply),
    Ghost(Option<Point>),
    Blur(u64),
    LoadLocal(Box<sgf::GameRecord>),
    Seek(usize),
    Score(HashSet<Point>, oneshot::Sender<Score>),
    Chat(String),
    SubscribeLobby,
    UnsubscribeLobby,
    AcceptChallenge(ChallengeId),
    CreateChallenge(Box<ChallengeParams>),
    CancelChallenge(ChallengeId),
    Shutdown,
}

/// Handle to a running client.
#[derive(Debug)]
pub struct GoClient {
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl GoClient {
    /// Spawn the client task and return a handle, the view receiver and the
    /// event receiver.
    ///
    /// Must be called inside a tokio runtime. The client starts offline;
    /// call [`GoClient::connect`] to open the socket. Identity resolution
    /// starts immediately.
    #[must_use = "the view and event receivers must be used"]
    pub fn start<T: Transport, A: GameApi>(
        config: ClientConfig,
        transport: T,
        api: A,
    ) -> (Self, watch::Receiver<GameView>, mpsc::Receiver<ClientEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        // tokio panics on a zero capacity.
        let capacity = config.play.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (view_tx, view_rx) = watch::channel(GameView::default());

        let runner = Runner::new(config, transport, api, command_rx, event_tx, view_tx);
        let task = tokio::spawn(runner.run());

        let client = Self {
            commands: command_tx,
            task: Some(task),
        };
        (client, view_rx, event_rx)
    }

    fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands.send(command).map_err(|_| ClientError::Closed)
    }

    async fn ask(&self, make: impl FnOnce(Reply) -> Command) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx))?;
        rx.await.map_err(|_| ClientError::Closed)?.map_err(ClientError::from)
    }

    // =======================================================================
    // Connection
    // =======================================================================

    /// Open the socket and run the handshake.
    pub fn connect(&self) -> Result<(), ClientError> {
        self.send(Command::Connect)
    }

    /// Close the socket and cancel all timers. Idempotent.
    pub fn disconnect(&self) -> Result<(), ClientError> {
        self.send(Command::Disconnect)
    }

    /// Stop the client task and wait for it to finish.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    // =======================================================================
    // Games
    // =======================================================================

    /// Make `game_id` the active game.
    pub fn join_game(&self, game_id: GameId) -> Result<(), ClientError> {
        self.send(Command::JoinGame(game_id))
    }

    /// Leave the active game.
    pub fn leave_game(&self) -> Result<(), ClientError> {
        self.send(Command::LeaveGame)
    }

    /// Play at `point`. Fails without network traffic if the move is not
    /// allowed locally.
    pub async fn request_move(&self, point: Point) -> Result<(), ClientError> {
        self.ask(|reply| Command::Move(point, reply)).await
    }

    /// Pass.
    pub async fn request_pass(&self) -> Result<(), ClientError> {
        self.ask(Command::Pass).await
    }

    /// Ask the opponent to take back the last move.
    pub async fn request_undo(&self) -> Result<(), ClientError> {
        self.ask(Command::Undo).await
    }

    /// Grant the opponent's undo request.
    pub async fn accept_undo(&self) -> Result<(), ClientError> {
        self.ask(Command::AcceptUndo).await
    }

    /// Refuse the opponent's undo request.
    pub async fn reject_undo(&self) -> Result<(), ClientError> {
        self.ask(Command::RejectUndo).await
    }

    /// Resign the active game.
    pub async fn request_resign(&self) -> Result<(), ClientError> {
        self.ask(Command::Resign).await
    }

    /// Show or clear the preview stone.
    pub fn set_ghost(&self, point: Option<Point>) -> Result<(), ClientError> {
        self.send(Command::Ghost(point))
    }

    /// Report time the UI spent unfocused; sent with the next move.
    pub fn report_blur(&self, ms: u64) -> Result<(), ClientError> {
        self.send(Command::Blur(ms))
    }

    /// Post a chat line in the active game.
    pub fn send_chat(&self, body: &str) -> Result<(), ClientError> {
        self.send(Command::Chat(body.to_string()))
    }

    /// Score the current position with `dead` stones removed.
    pub async fn score(&self, dead: HashSet<Point>) -> Result<Score, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Score(dead, tx))?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    // =======================================================================
    // Offline replay
    // =======================================================================

    /// Parse `sgf_text` and replay it offline. Leaves any live game.
    pub fn load_local_game(&self, sgf_text: &str) -> Result<(), ClientError> {
        let record = sgf::parse(sgf_text)?;
        self.send(Command::LoadLocal(Box::new(record)))
    }

    /// Move the replay cursor. Ignored during a live game.
    pub fn seek(&self, index: usize) -> Result<(), ClientError> {
        self.send(Command::Seek(index))
    }

    // =======================================================================
    // Lobby
    // =======================================================================

    /// Subscribe to the configured lobby channel.
    pub fn subscribe_lobby(&self) -> Result<(), ClientError> {
        self.send(Command::SubscribeLobby)
    }

    /// Unsubscribe from the lobby and forget its challenges.
    pub fn unsubscribe_lobby(&self) -> Result<(), ClientError> {
        self.send(Command::UnsubscribeLobby)
    }

    /// Accept a challenge; the resulting game is joined automatically.
    pub fn accept_challenge(&self, challenge_id: ChallengeId) -> Result<(), ClientError> {
        self.send(Command::AcceptChallenge(challenge_id))
    }

    /// Post a challenge.
    pub fn create_challenge(&self, params: ChallengeParams) -> Result<(), ClientError> {
        self.send(Command::CreateChallenge(Box::new(params)))
    }

    /// Withdraw a challenge.
    pub fn cancel_challenge(&self, challenge_id: ChallengeId) -> Result<(), ClientError> {
        self.send(Command::CancelChallenge(challenge_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockApi;
    use crate::transport::MockTransport;
    use crate::view::Connectivity;
    use goban_types::messages::{GameData, Identity};
    use goban_types::PlayerId;
    use serde_json::json;
    use std::time::Duration;

    const GAME: GameId = GameId::new(42);

    fn alice() -> Identity {
        Identity {
            player_id: PlayerId::new(7),
            username: "alice".into(),
            jwt: "jwt-alice".into(),
        }
    }

    fn test_config() -> ClientConfig {
        ClientConfig::default()
            .with_socket_url("ws://mock/socket")
            .with_reconnect_delay_ms(100)
    }

    /// Poll `check` while letting the client task run.
    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..300 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    async fn next_event(events: &mut mpsc::Receiver<ClientEvent>, wanted: impl Fn(&ClientEvent) -> bool) -> ClientEvent {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("timed out waiting for event")
                .expect("event channel closed");
            if wanted(&event) {
                return event;
            }
        }
    }

    fn online(view: &watch::Receiver<GameView>) -> bool {
        view.borrow().connectivity == Connectivity::Online
    }

    /// Started, signed in as alice, connected and seated in GAME as black.
    async fn seated() -> (GoClient, watch::Receiver<GameView>, mpsc::Receiver<ClientEvent>, MockTransport, MockApi) {
        let transport = MockTransport::new();
        let api = MockApi::new().with_identity(alice());
        let (client, view, mut events) = GoClient::start(test_config(), transport.clone(), api.clone());
        next_event(&mut events, |e| matches!(e, ClientEvent::SignedIn { .. })).await;

        transport.push_handshake();
        client.connect().unwrap();
        client.join_game(GAME).unwrap();
        next_event(&mut events, |e| *e == ClientEvent::Connectivity(ConnectionEvent::Ready)).await;

        transport.push_event(
            "game/42/gamedata",
            json!({
                "game_id": 42,
                "width": 9,
                "height": 9,
                "moves": [[2, 2], [6, 6]],
                "players": {"black": {"id": 7}, "white": {"id": 8}},
                "state_version": 2,
                "phase": "play",
            }),
        );
        eventually(|| view.borrow().move_number == 2).await;
        (client, view, events, transport, api)
    }

    // ===========================================
    // Connection Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn handshake_authenticates_and_joins() {
        let transport = MockTransport::new();
        let api = MockApi::new().with_identity(alice());
        let (client, view, mut events) = GoClient::start(test_config(), transport.clone(), api);

        transport.push_handshake();
        client.join_game(GAME).unwrap();
        client.connect().unwrap();

        let ready = next_event(&mut events, |e| matches!(e, ClientEvent::Connectivity(_))).await;
        assert_eq!(ready, ClientEvent::Connectivity(ConnectionEvent::Ready));
        eventually(|| online(&view)).await;
        eventually(|| transport.sent_named("authenticate").len() == 1).await;

        assert_eq!(transport.connected_address(), Some("ws://mock/socket".to_string()));
        assert_eq!(transport.sent_frames()[0], "40");
        let joins = transport.sent_named("game/connect");
        assert_eq!(joins.len(), 1);
        assert_eq!(joins[0].payload["game_id"], 42);
        assert_eq!(transport.sent_named("authenticate")[0].payload["jwt"], "jwt-alice");

        client.shutdown().await;
        assert!(!transport.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn server_close_reconnects_once_and_rejoins() {
        let (client, view, mut events, transport, _api) = seated().await;

        transport.server_close();
        transport.push_handshake();

        let lost = next_event(&mut events, |e| matches!(e, ClientEvent::Connectivity(_))).await;
        assert!(matches!(
            lost,
            ClientEvent::Connectivity(ConnectionEvent::Lost { attempt: 1, .. })
        ));
        let ready = next_event(&mut events, |e| matches!(e, ClientEvent::Connectivity(_))).await;
        assert_eq!(ready, ClientEvent::Connectivity(ConnectionEvent::Ready));

        eventually(|| online(&view)).await;
        assert_eq!(transport.connect_count(), 2);
        assert_eq!(transport.sent_named("game/connect").len(), 2);
        assert_eq!(transport.sent_named("authenticate").len(), 2);
        // The board survives the reconnect.
        assert_eq!(view.borrow().move_number, 2);

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_retries_after_delay() {
        let transport = MockTransport::new();
        transport.fail_next_connect("refused");
        let (client, view, mut events) = GoClient::start(test_config(), transport.clone(), MockApi::new());

        transport.push_handshake();
        client.connect().unwrap();

        let lost = next_event(&mut events, |e| matches!(e, ClientEvent::Connectivity(_))).await;
        assert!(matches!(lost, ClientEvent::Connectivity(ConnectionEvent::Lost { .. })));
        eventually(|| online(&view)).await;
        assert_eq!(transport.connect_count(), 1);

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn answers_pings() {
        let (client, _view, _events, transport, _api) = seated().await;

        transport.push_frame("2");
        transport.push_event("net/ping", json!({"nonce": "n-17"}));

        eventually(|| transport.sent_frames().iter().any(|f| f == "3")).await;
        eventually(|| !transport.sent_named("net/pong").is_empty()).await;
        assert_eq!(transport.sent_named("net/pong")[0].payload["nonce"], "n-17");

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_frames_are_counted_in_the_view() {
        let (client, view, _events, transport, _api) = seated().await;

        transport.push_frame("42[not json");
        transport.push_event("game/99/move", json!({"game_id": 99, "move": [0, 0]}));

        eventually(|| view.borrow().dispatch_stats.foreign_game == 1).await;
        assert_eq!(view.borrow().dispatch_stats.malformed, 1);
        assert_eq!(view.borrow().move_number, 2);

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_runs_while_ready() {
        let (client, _view, _events, transport, _api) = seated().await;

        tokio::time::sleep(Duration::from_millis(25_000)).await;
        assert!(transport.sent_named("net/ping").len() >= 2);

        client.shutdown().await;
    }

    // ===========================================
    // Game Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn move_is_sent_and_applied_optimistically() {
        let (client, view, _events, transport, _api) = seated().await;

        client.request_move(Point::new(4, 4)).await.unwrap();

        let moves = transport.sent_named("game/move");
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].payload["move"], "ee");
        assert_eq!(moves[0].sequence, Some(3));
        eventually(|| view.borrow().move_number == 3).await;

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn move_while_disconnected_is_refused() {
        let (client, view, mut events, transport, _api) = seated().await;

        transport.server_close();
        next_event(&mut events, |e| matches!(e, ClientEvent::Connectivity(ConnectionEvent::Lost { .. }))).await;

        let offline = client.request_move(Point::new(4, 4)).await;
        assert!(matches!(offline, Err(ClientError::Rejected(MoveRejected::NotConnected))));
        assert!(matches!(
            client.request_pass().await,
            Err(ClientError::Rejected(MoveRejected::NotConnected))
        ));
        assert!(transport.sent_named("game/move").is_empty());
        assert_eq!(view.borrow().move_number, 2);

        transport.push_handshake();
        eventually(|| online(&view)).await;
        client.request_move(Point::new(4, 4)).await.unwrap();
        assert_eq!(transport.sent_named("game/move")[0].sequence, Some(3));

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_move_sends_nothing() {
        let (client, _view, _events, transport, _api) = seated().await;

        let occupied = client.request_move(Point::new(2, 2)).await;
        assert!(matches!(occupied, Err(ClientError::Rejected(MoveRejected::Occupied))));

        client.request_move(Point::new(4, 4)).await.unwrap();
        let again = client.request_move(Point::new(5, 5)).await;
        assert!(matches!(again, Err(ClientError::Rejected(MoveRejected::NotYourTurn))));

        assert_eq!(transport.sent_named("game/move").len(), 1);
        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn accepted_undo_refetches_state() {
        let (client, view, _events, transport, api) = seated().await;
        api.queue_game_state(
            GAME,
            Ok(GameData::from_value(&json!({
                "game_id": 42,
                "width": 9,
                "moves": [[2, 2]],
                "players": {"black": {"id": 7}, "white": {"id": 8}},
                "state_version": 3,
            }))
            .unwrap()),
        );

        client.request_undo().await.unwrap();
        let request = transport.sent_named("game/undo/request");
        assert_eq!(request.len(), 1);
        assert_eq!(request[0].payload["move_number"], 2);
        eventually(|| view.borrow().pending_undo).await;

        transport.push_event("game/42/undo_accepted", json!(2));
        eventually(|| api.calls().contains(&"game_state:42".to_string())).await;
        eventually(|| view.borrow().move_number == 1).await;
        assert!(!view.borrow().pending_undo);

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn identity_failure_is_read_only() {
        let transport = MockTransport::new();
        let api = MockApi::new().with_identity_error(ApiError::Unauthorized);
        let (client, view, mut events) = GoClient::start(test_config(), transport.clone(), api);

        let event = next_event(&mut events, |e| matches!(e, ClientEvent::ReadOnly { .. })).await;
        assert_eq!(
            event,
            ClientEvent::ReadOnly {
                reason: "unauthorized".into()
            }
        );

        transport.push_handshake();
        client.connect().unwrap();
        client.join_game(GAME).unwrap();
        eventually(|| online(&view)).await;

        assert!(view.borrow().read_only);
        let result = client.request_move(Point::new(3, 3)).await;
        assert!(matches!(result, Err(ClientError::Rejected(MoveRejected::ReadOnly))));
        assert!(transport.sent_named("authenticate").is_empty());
        assert!(transport.sent_named("game/move").is_empty());
        // Spectating still works.
        assert_eq!(transport.sent_named("game/connect").len(), 1);

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn chat_reaches_the_event_stream() {
        let (client, _view, mut events, transport, _api) = seated().await;

        transport.push_event(
            "game/42/chat",
            json!({"channel": "main", "line": {"username": "bob", "player_id": 8, "body": "hi"}}),
        );
        let event = next_event(&mut events, |e| matches!(e, ClientEvent::Chat { .. })).await;
        match event {
            ClientEvent::Chat { game_id, line } => {
                assert_eq!(game_id, GAME);
                assert_eq!(line.username, "bob");
            }
            other => panic!("expected chat, got {:?}", other),
        }

        client.send_chat("hello").unwrap();
        eventually(|| !transport.sent_named("game/chat").is_empty()).await;
        assert_eq!(transport.sent_named("game/chat")[0].payload["body"], "hello");

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn local_replay_leaves_live_game() {
        let (client, view, _events, transport, _api) = seated().await;

        client.load_local_game("(;SZ[9];B[cc];W[dd];B[ee])").unwrap();
        eventually(|| view.borrow().game_id.is_none()).await;
        assert_eq!(view.borrow().move_number, 3);
        assert_eq!(transport.sent_named("game/disconnect").len(), 1);

        client.seek(1).unwrap();
        eventually(|| view.borrow().move_number == 1).await;

        let score = client.score(HashSet::new()).await.unwrap();
        assert!(score.black > 0.0);

        assert!(matches!(client.load_local_game("not sgf"), Err(ClientError::Sgf(_))));
        client.shutdown().await;
    }
}

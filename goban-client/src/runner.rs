//! The client actor.
//!
//! One task owns every piece of mutable state and multiplexes its inputs
//! with `tokio::select!`: socket frames, handle commands, timers and
//! completions of one-shot API calls. Each input is processed to completion
//! before the next is read, and the view is republished at most once per
//! input.

use std::collections::VecDeque;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use goban_core::dispatch::{Control, Dispatcher, GameEvent, Routed};
use goban_core::lobby::LobbyChange;
use goban_core::{
    Action, ConnectionState, Event, GameSession, LobbyTracker, MoveRejected, SessionAction, TickOutcome,
};
use goban_types::messages::{ChallengeCreated, GameData, Identity};
use goban_types::{ChallengeId, Directive, Frame, GameId};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, info, warn};

use crate::api::{ApiError, GameApi};
use crate::client::{ClientEvent, Command, Reply};
use crate::config::ClientConfig;
use crate::identity::IdentityState;
use crate::transport::Transport;
use crate::view::GameView;

/// Completion of a spawned API call.
#[derive(Debug)]
enum ApiDone {
    Identity(Result<Identity, ApiError>),
    GameState(GameId, Result<GameData, ApiError>),
    Accepted(ChallengeId, Result<GameId, ApiError>),
    Created(Result<ChallengeCreated, ApiError>),
}

pub(crate) struct Runner<T: Transport, A: GameApi> {
    config: ClientConfig,
    transport: T,
    api: Arc<A>,

    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::Sender<ClientEvent>,
    view: watch::Sender<GameView>,
    api_tx: mpsc::UnboundedSender<ApiDone>,
    api_rx: mpsc::UnboundedReceiver<ApiDone>,

    connection: ConnectionState,
    identity: IdentityState,
    dispatcher: Dispatcher,
    session: GameSession,
    lobby: LobbyTracker,
    lobby_subscribed: bool,

    socket_open: bool,
    heartbeat: Option<Interval>,
    clock: Option<Interval>,
    presence: Option<Interval>,
    reconnect: Option<Pin<Box<Sleep>>>,

    started: Instant,
    lost: Option<String>,
    dirty: bool,
}

impl<T: Transport, A: GameApi> Runner<T, A> {
    pub(crate) fn new(
        config: ClientConfig,
        transport: T,
        api: A,
        commands: mpsc::UnboundedReceiver<Command>,
        events: mpsc::Sender<ClientEvent>,
        view: watch::Sender<GameView>,
    ) -> Self {
        let (api_tx, api_rx) = mpsc::unbounded_channel();
        let session = GameSession::new(config.play.wants_chat);
        Self {
            config,
            transport,
            api: Arc::new(api),
            commands,
            events,
            view,
            api_tx,
            api_rx,
            connection: ConnectionState::new(),
            identity: IdentityState::default(),
            dispatcher: Dispatcher::new(),
            session,
            lobby: LobbyTracker::new(),
            lobby_subscribed: false,
            socket_open: false,
            heartbeat: None,
            clock: None,
            presence: None,
            reconnect: None,
            started: Instant::now(),
            lost: None,
            dirty: false,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("client loop started");
        self.resolve_identity();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => {
                        self.drive(Event::DisconnectRequested).await;
                        self.flush();
                        break;
                    }
                    Some(command) => self.on_command(command).await,
                },

                incoming = self.transport.recv(), if self.socket_open => match incoming {
                    Ok(text) => self.on_frame(&text).await,
                    Err(e) => {
                        warn!(error = %e, "socket receive failed");
                        self.socket_open = false;
                        self.lost = Some(e.to_string());
                    }
                },

                Some(done) = self.api_rx.recv() => self.on_api(done).await,

                _ = tick(&mut self.heartbeat) => {
                    let client_ms = wall_ms();
                    self.send_directive(Directive::NetPing { client_ms }, None).await;
                }

                _ = tick(&mut self.clock) => {
                    let now = self.now_ms();
                    match self.session.tick_clock(now) {
                        TickOutcome::Idle => {}
                        TickOutcome::Ticked(..) => self.dirty = true,
                        TickOutcome::Expired(color) => {
                            info!(%color, "clock expired");
                            self.emit(ClientEvent::Expired(color));
                            self.dirty = true;
                        }
                    }
                }

                _ = tick(&mut self.presence) => {
                    if let Some(game_id) = self.session.game_id() {
                        self.send_directive(Directive::Presence { game_id }, None).await;
                    }
                }

                _ = sleep(&mut self.reconnect) => {
                    self.reconnect = None;
                    self.drive(Event::ReconnectTimer).await;
                }
            }

            if let Some(reason) = self.lost.take() {
                self.drive(Event::ConnectionLost { reason }).await;
            }
            self.flush();
        }

        debug!("client loop exited");
    }

    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    // =======================================================================
    // Output
    // =======================================================================

    fn emit(&self, event: ClientEvent) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.events.try_send(event) {
            warn!(?event, "event channel full, dropping event");
        }
    }

    fn flush(&mut self) {
        if std::mem::take(&mut self.dirty) {
            let view = GameView::capture(
                &self.connection,
                &self.identity,
                &self.dispatcher,
                &self.session,
                &self.lobby,
            );
            self.view.send_replace(view);
        }
    }

    async fn send_raw(&mut self, text: &str) {
        if !self.socket_open {
            debug!(frame = text, "socket closed, frame dropped");
            return;
        }
        if let Err(e) = self.transport.send(text).await {
            warn!(error = %e, "socket send failed");
            self.socket_open = false;
            self.lost = Some(e.to_string());
        }
    }

    /// Send a directive. Only a ready connection carries events; anything
    /// dropped here is recovered by the rejoin after the next handshake.
    async fn send_directive(&mut self, directive: Directive, sequence: Option<u64>) {
        if !self.connection.is_ready() {
            debug!(event = directive.event_name(), "not ready, directive dropped");
            return;
        }
        let text = directive.into_frame(sequence).encode();
        self.send_raw(&text).await;
    }

    // =======================================================================
    // Connection state machine
    // =======================================================================

    /// Feed an event to the connection state machine and carry out the
    /// resulting actions, including any events those actions produce.
    async fn drive(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let (next, actions) = self.connection.clone().on_event(event);
            if next != self.connection {
                self.dirty = true;
            }
            self.connection = next;
            for action in actions {
                if let Some(follow) = self.run_action(action).await {
                    queue.push_back(follow);
                }
            }
        }
    }

    async fn run_action(&mut self, action: Action) -> Option<Event> {
        match action {
            Action::OpenSocket => {
                let url = self.config.server.socket_url.clone();
                info!(url = %url, "opening socket");
                let timeout = self.config.timing.connect_timeout();
                match tokio::time::timeout(timeout, self.transport.connect(&url)).await {
                    Ok(Ok(())) => {
                        self.socket_open = true;
                        Some(Event::SocketOpened)
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "socket open failed");
                        Some(Event::SocketFailed { error: e.to_string() })
                    }
                    Err(_) => {
                        warn!("socket open timed out");
                        Some(Event::SocketFailed {
                            error: "connection timeout".into(),
                        })
                    }
                }
            }
            Action::CloseSocket => {
                self.socket_open = false;
                if let Err(e) = self.transport.close().await {
                    debug!(error = %e, "socket close failed");
                }
                None
            }
            Action::SendNamespaceConnect => {
                self.send_raw(&Frame::Connect(None).encode()).await;
                None
            }
            Action::StartHeartbeat => {
                self.heartbeat = Some(every(self.config.timing.heartbeat_interval()));
                None
            }
            Action::StopHeartbeat => {
                self.heartbeat = None;
                None
            }
            Action::Authenticate => {
                self.authenticate().await;
                None
            }
            Action::RejoinGame => {
                let actions = self.session.rejoin();
                self.run_session(actions).await;
                if self.lobby_subscribed {
                    let channel = self.config.play.lobby_channel.clone();
                    self.send_directive(Directive::LobbySubscribe { channel }, None).await;
                }
                None
            }
            Action::StartReconnectTimer { attempt } => {
                let delay = self.config.timing.reconnect_delay();
                info!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
                self.reconnect = Some(Box::pin(tokio::time::sleep(delay)));
                None
            }
            Action::CancelReconnect => {
                self.reconnect = None;
                None
            }
            Action::Emit(event) => {
                self.emit(ClientEvent::Connectivity(event));
                None
            }
        }
    }

    async fn authenticate(&mut self) {
        match self.identity.auth_directive() {
            Some(directive) => self.send_directive(directive, None).await,
            None => debug!("no identity yet, authenticating later"),
        }
    }

    // =======================================================================
    // Session actions
    // =======================================================================

    async fn run_session(&mut self, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::Send { directive, sequence } => self.send_directive(directive, sequence).await,
                SessionAction::RefetchGameState(game_id) => self.refetch(game_id),
                SessionAction::StartClock => {
                    self.clock = Some(every(self.config.timing.clock_tick()));
                }
                SessionAction::StopClock => self.clock = None,
                SessionAction::StartPresence => {
                    self.presence = Some(every(self.config.timing.presence_interval()));
                }
                SessionAction::StopPresence => self.presence = None,
                SessionAction::Shield(game_id) => {
                    let changes = self.lobby.shield(game_id);
                    self.lobby_changed(changes);
                }
                SessionAction::Publish => self.dirty = true,
            }
        }
    }

    async fn run_checked(&mut self, result: Result<Vec<SessionAction>, MoveRejected>, reply: Reply) {
        match result {
            Ok(actions) => {
                self.run_session(actions).await;
                let _ = reply.send(Ok(()));
            }
            Err(rejected) => {
                debug!(%rejected, "request rejected locally");
                let _ = reply.send(Err(rejected));
            }
        }
    }

    /// Game actions are refused outright while they could not be sent, so
    /// the board never shows a move the server will not see.
    fn ready(&self) -> Result<(), MoveRejected> {
        if self.connection.is_ready() {
            Ok(())
        } else {
            Err(MoveRejected::NotConnected)
        }
    }

    fn lobby_changed(&mut self, changes: Vec<LobbyChange>) {
        if !changes.is_empty() {
            self.dirty = true;
            self.emit(ClientEvent::Lobby(changes));
        }
    }

    // =======================================================================
    // Commands
    // =======================================================================

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.drive(Event::ConnectRequested).await,
            Command::Disconnect => self.drive(Event::DisconnectRequested).await,
            Command::JoinGame(game_id) => {
                let shielded = self.lobby.is_shielded(game_id);
                let actions = self.session.connect(game_id, shielded);
                self.run_session(actions).await;
            }
            Command::LeaveGame => {
                let actions = self.session.leave();
                self.run_session(actions).await;
            }
            Command::Move(point, reply) => {
                let result = self.ready().and_then(|()| self.session.request_move(point));
                self.run_checked(result, reply).await;
            }
            Command::Pass(reply) => {
                let result = self.ready().and_then(|()| self.session.request_pass());
                self.run_checked(result, reply).await;
            }
            Command::Undo(reply) => {
                let seen = self.session.engine().cursor() as u64;
                let result = self.ready().and_then(|()| self.session.request_undo(seen));
                self.run_checked(result, reply).await;
            }
            Command::AcceptUndo(reply) => {
                let result = self.ready().and_then(|()| self.session.accept_undo());
                self.run_checked(result, reply).await;
            }
            Command::RejectUndo(reply) => {
                let result = self.ready().and_then(|()| self.session.reject_undo());
                self.run_checked(result, reply).await;
            }
            Command::Resign(reply) => {
                let result = self.ready().and_then(|()| self.session.request_resign());
                self.run_checked(result, reply).await;
            }
            Command::Ghost(point) => {
                let actions = self.session.set_ghost(point);
                self.run_session(actions).await;
            }
            Command::Blur(ms) => self.session.add_blur(ms),
            Command::LoadLocal(record) => {
                let actions = self.session.load_local_game(&record);
                self.run_session(actions).await;
            }
            Command::Seek(index) => {
                let actions = self.session.seek(index);
                self.run_session(actions).await;
            }
            Command::Score(dead, reply) => {
                let _ = reply.send(self.session.score(&dead));
            }
            Command::Chat(body) => match self.session.game_id() {
                Some(game_id) if !self.identity.is_read_only() => {
                    let directive = Directive::Chat {
                        game_id,
                        body,
                        kind: "main".into(),
                    };
                    self.send_directive(directive, None).await;
                }
                _ => debug!("chat dropped: no game or read-only"),
            },
            Command::SubscribeLobby => {
                self.lobby_subscribed = true;
                let channel = self.config.play.lobby_channel.clone();
                self.send_directive(Directive::LobbySubscribe { channel }, None).await;
            }
            Command::UnsubscribeLobby => {
                self.lobby_subscribed = false;
                let channel = self.config.play.lobby_channel.clone();
                self.send_directive(Directive::LobbyUnsubscribe { channel }, None).await;
                self.lobby.clear_challenges();
                self.dirty = true;
            }
            Command::AcceptChallenge(challenge_id) => {
                let api = Arc::clone(&self.api);
                self.spawn_api(async move { ApiDone::Accepted(challenge_id, api.accept_challenge(challenge_id).await) });
            }
            Command::CreateChallenge(params) => {
                let api = Arc::clone(&self.api);
                self.spawn_api(async move { ApiDone::Created(api.create_challenge(&params).await) });
            }
            Command::CancelChallenge(challenge_id) => {
                self.send_directive(Directive::CancelChallenge { challenge_id }, None).await;
            }
            // Handled by the loop.
            Command::Shutdown => {}
        }
    }

    // =======================================================================
    // One-shot API calls
    // =======================================================================

    fn spawn_api<F>(&self, call: F)
    where
        F: std::future::Future<Output = ApiDone> + Send + 'static,
    {
        let tx = self.api_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(call.await);
        });
    }

    fn resolve_identity(&mut self) {
        if self.identity.begin() {
            let api = Arc::clone(&self.api);
            self.spawn_api(async move { ApiDone::Identity(api.fetch_identity().await) });
        }
    }

    fn refetch(&self, game_id: GameId) {
        let api = Arc::clone(&self.api);
        self.spawn_api(async move { ApiDone::GameState(game_id, api.fetch_game_state(game_id).await) });
    }

    async fn on_api(&mut self, done: ApiDone) {
        match done {
            ApiDone::Identity(result) => {
                self.identity.finish(result);
                let user = self.identity.player_id();
                let read_only = self.identity.is_read_only();
                self.lobby.set_user(user);
                let actions = self.session.set_identity(user, read_only);
                self.run_session(actions).await;
                self.dirty = true;

                if let Some(username) = self.identity.identity().map(|i| i.username.clone()) {
                    self.emit(ClientEvent::SignedIn { username });
                    if self.connection.is_ready() {
                        self.authenticate().await;
                    }
                } else if let IdentityState::ReadOnly { reason } = &self.identity {
                    self.emit(ClientEvent::ReadOnly { reason: reason.clone() });
                }
            }
            ApiDone::GameState(game_id, Ok(data)) => {
                if self.session.game_id() == Some(game_id) {
                    self.on_game_event(game_id, GameEvent::Data(data)).await;
                } else {
                    debug!(game = %game_id, "refetched state for inactive game ignored");
                }
            }
            ApiDone::GameState(game_id, Err(error)) => {
                warn!(game = %game_id, %error, "game state refetch failed");
                self.session.refetch_failed();
                self.emit(ClientEvent::ApiFailed {
                    operation: "fetch_game_state",
                    error,
                });
            }
            ApiDone::Accepted(challenge_id, Ok(game_id)) => {
                info!(challenge = %challenge_id, game = %game_id, "challenge accepted");
                self.emit(ClientEvent::ChallengeAccepted { challenge_id, game_id });
                let shielded = self.lobby.is_shielded(game_id);
                let actions = self.session.connect(game_id, shielded);
                self.run_session(actions).await;
            }
            ApiDone::Accepted(_, Err(error)) => self.emit(ClientEvent::ApiFailed {
                operation: "accept_challenge",
                error,
            }),
            ApiDone::Created(Ok(created)) => self.emit(ClientEvent::ChallengeCreated(created)),
            ApiDone::Created(Err(error)) => self.emit(ClientEvent::ApiFailed {
                operation: "create_challenge",
                error,
            }),
        }
    }

    // =======================================================================
    // Inbound frames
    // =======================================================================

    async fn on_frame(&mut self, text: &str) {
        let counted = (self.dispatcher.stats(), self.session.stats());
        self.route_frame(text).await;
        if counted != (self.dispatcher.stats(), self.session.stats()) {
            self.dirty = true;
        }
    }

    async fn route_frame(&mut self, text: &str) {
        let routed = match self.dispatcher.route(text, self.session.game_id()) {
            Ok(routed) => routed,
            Err(e) => {
                warn!(error = %e, "malformed frame dropped");
                return;
            }
        };

        match routed {
            Routed::Control(control) => self.on_control(control).await,
            Routed::Game(game_id, event) => self.on_game_event(game_id, event).await,
            Routed::Lobby(updates) => {
                let changes = self.lobby.apply_seek(updates);
                self.lobby_changed(changes);
            }
            Routed::ActiveGame(echo) => {
                let changes = self.lobby.observe_game(&echo);
                self.lobby_changed(changes);
                if self.session.game_id() == Some(echo.game_id) && echo.signals_finished() {
                    let text = echo.outcome.unwrap_or_else(|| "finished".to_string());
                    let actions = self.session.receive_outcome(text, None);
                    self.run_session(actions).await;
                }
            }
            Routed::NetPing(ping) => {
                let directive = Directive::NetPong {
                    nonce: ping.nonce,
                    client_ms: wall_ms(),
                };
                self.send_directive(directive, None).await;
            }
            Routed::NetPong(pong) => {
                self.emit(ClientEvent::Latency {
                    ms: pong.latency_ms(wall_ms()),
                });
            }
            Routed::Dropped(reason) => debug!(?reason, "frame not routed"),
        }
    }

    async fn on_control(&mut self, control: Control) {
        match control {
            Control::Open(info) => {
                debug!(sid = ?info.sid, "server open");
                self.drive(Event::OpenReceived).await;
            }
            Control::NamespaceConfirmed => self.drive(Event::NamespaceConfirmed).await,
            Control::NamespaceRefused(reason) => self.drive(Event::NamespaceRefused { reason }).await,
            Control::Closed => {
                self.socket_open = false;
                self.lost = Some("closed by server".into());
            }
            Control::Ping(data) => self.send_raw(&Frame::Pong(data).encode()).await,
            Control::Pong => {}
        }
    }

    async fn on_game_event(&mut self, game_id: GameId, event: GameEvent) {
        let now = self.now_ms();
        let actions = match event {
            GameEvent::Data(data) => {
                let clock = data.clock.clone();
                let mut actions = self.session.receive_game_data(data);
                if let Some(snapshot) = clock {
                    actions.extend(self.session.receive_clock(&snapshot, now));
                }
                actions
            }
            GameEvent::Move(event) => self.session.receive_move_event(event),
            GameEvent::Clock(snapshot) => self.session.receive_clock(&snapshot, now),
            GameEvent::UndoRequested(notice) => self.session.receive_undo_requested(notice),
            GameEvent::UndoAccepted(_) => self.session.receive_undo_accepted(),
            GameEvent::UndoCleared(_) => self.session.receive_undo_cleared(),
            GameEvent::Phase(change) => self.session.receive_phase(change),
            GameEvent::Chat(line) => {
                self.emit(ClientEvent::Chat { game_id, line });
                Vec::new()
            }
        };
        self.run_session(actions).await;
    }
}

/// Wall-clock milliseconds, for heartbeat payloads.
fn wall_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// An interval whose first tick is one period from now.
fn every(period: std::time::Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Tick an optional interval; never completes when it is `None`.
async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending::<()>().await,
    }
}

/// Await an optional sleep; never completes when it is `None`.
async fn sleep(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => pending::<()>().await,
    }
}

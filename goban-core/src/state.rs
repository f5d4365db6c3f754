//! Connection state machine.
//!
//! This module provides a pure, side-effect-free state machine for the
//! socket lifecycle and its staged handshake. The state machine takes events
//! as input and produces a new state plus a list of actions to execute.
//!
//! ```text
//! Disconnected ─ConnectRequested─▶ Connecting ─SocketOpened─▶ AwaitingOpen
//!                                                                 │ OpenReceived
//!                                                                 ▼
//!        Ready ◀───────────────NamespaceConfirmed─────────── AwaitingNamespace
//!          │
//!          └─ConnectionLost─▶ Reconnecting ─ReconnectTimer─▶ Connecting ...
//! ```
//!
//! The actual I/O (opening the socket, sending frames, timers) is performed
//! by goban-client, not by this module.

/// Connection state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket, nothing scheduled.
    Disconnected,
    /// Socket open in progress.
    Connecting {
        /// Reconnect attempt this belongs to (0 for the first connect).
        attempt: u32,
    },
    /// Socket open, waiting for the server's open frame.
    AwaitingOpen,
    /// Namespace connect sent, waiting for confirmation.
    AwaitingNamespace,
    /// Handshake complete; events flow.
    Ready,
    /// Connection lost; one reconnect timer is pending.
    Reconnecting {
        /// Number of reconnection attempts so far.
        attempt: u32,
    },
}

impl ConnectionState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (goban-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // Explicit disconnect wins from anywhere and is idempotent.
            (Self::Disconnected, Event::DisconnectRequested) => (Self::Disconnected, vec![]),
            (_, Event::DisconnectRequested) => (
                Self::Disconnected,
                vec![
                    Action::CancelReconnect,
                    Action::StopHeartbeat,
                    Action::CloseSocket,
                    Action::Emit(ConnectionEvent::Disconnected {
                        reason: "user requested".into(),
                    }),
                ],
            ),

            // From Disconnected
            (Self::Disconnected, Event::ConnectRequested) => {
                (Self::Connecting { attempt: 0 }, vec![Action::OpenSocket])
            }

            // From Connecting
            (Self::Connecting { .. }, Event::SocketOpened) => (Self::AwaitingOpen, vec![]),
            (Self::Connecting { attempt }, Event::SocketFailed { error }) => {
                schedule_reconnect(attempt.saturating_add(1), error, false)
            }

            // Handshake
            (Self::AwaitingOpen, Event::OpenReceived) => {
                (Self::AwaitingNamespace, vec![Action::SendNamespaceConnect])
            }
            (Self::AwaitingNamespace, Event::NamespaceConfirmed) => (
                Self::Ready,
                vec![
                    Action::StartHeartbeat,
                    Action::Authenticate,
                    Action::RejoinGame,
                    Action::Emit(ConnectionEvent::Ready),
                ],
            ),
            (Self::AwaitingNamespace, Event::NamespaceRefused { reason }) => {
                schedule_reconnect(1, reason, true)
            }

            // Losing the socket after it opened
            (
                Self::AwaitingOpen | Self::AwaitingNamespace | Self::Ready,
                Event::ConnectionLost { reason },
            ) => schedule_reconnect(1, reason, true),

            // From Reconnecting
            (Self::Reconnecting { attempt }, Event::ReconnectTimer) => {
                (Self::Connecting { attempt }, vec![Action::OpenSocket])
            }
            // A second failure report while a timer is pending must not
            // schedule another one.
            (
                state @ Self::Reconnecting { .. },
                Event::ConnectionLost { .. } | Event::SocketFailed { .. },
            ) => (state, vec![]),
            (Self::Reconnecting { .. }, Event::ConnectRequested) => (
                Self::Connecting { attempt: 0 },
                vec![Action::CancelReconnect, Action::OpenSocket],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if the handshake is complete.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Check if a socket is (being) established.
    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            Self::Connecting { .. } | Self::AwaitingOpen | Self::AwaitingNamespace
        )
    }

    /// Check if a reconnect timer is pending.
    pub fn is_reconnecting(&self) -> bool {
        matches!(self, Self::Reconnecting { .. })
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

fn schedule_reconnect(attempt: u32, reason: String, had_socket: bool) -> (ConnectionState, Vec<Action>) {
    let mut actions = Vec::new();
    if had_socket {
        actions.push(Action::StopHeartbeat);
        actions.push(Action::CloseSocket);
    }
    actions.push(Action::Emit(ConnectionEvent::Lost { reason, attempt }));
    actions.push(Action::StartReconnectTimer { attempt });
    (ConnectionState::Reconnecting { attempt }, actions)
}

/// Events that can occur in the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// User requested connection.
    ConnectRequested,
    /// Transport connection succeeded.
    SocketOpened,
    /// Transport connection failed.
    SocketFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The server's open control frame arrived.
    OpenReceived,
    /// The server confirmed the namespace connect.
    NamespaceConfirmed,
    /// The server refused the namespace connect.
    NamespaceRefused {
        /// Server-supplied reason, if any.
        reason: String,
    },
    /// The socket closed or errored.
    ConnectionLost {
        /// Reason for disconnection.
        reason: String,
    },
    /// User requested disconnect.
    DisconnectRequested,
    /// Reconnect timer fired.
    ReconnectTimer,
}

/// Actions to be executed by goban-client.
///
/// These are instructions, not side effects. The client interprets these
/// and performs the actual I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open the socket.
    OpenSocket,
    /// Close the socket.
    CloseSocket,
    /// Send the namespace connect control frame.
    SendNamespaceConnect,
    /// Start the fixed-interval heartbeat.
    StartHeartbeat,
    /// Stop the heartbeat.
    StopHeartbeat,
    /// Authenticate the socket if an identity is known.
    Authenticate,
    /// Re-issue the connect directive for the active game, if any.
    RejoinGame,
    /// Start the (single) reconnect timer.
    StartReconnectTimer {
        /// Attempt number the timer is for.
        attempt: u32,
    },
    /// Cancel any pending reconnect timer.
    CancelReconnect,
    /// Emit an event to the application.
    Emit(ConnectionEvent),
}

/// Connectivity events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Handshake complete.
    Ready,
    /// Connection lost or failed; a reconnect is scheduled.
    Lost {
        /// What happened.
        reason: String,
        /// The reconnect attempt that is now scheduled.
        attempt: u32,
    },
    /// Disconnected on request.
    Disconnected {
        /// Reason for disconnection.
        reason: String,
    },
}

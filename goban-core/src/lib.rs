//! # goban-core
//!
//! Pure logic for the goban client (no I/O, instant tests).
//!
//! This crate holds the rules engine, SGF ingestion and every state machine
//! the online client drives, without any network or timer I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (socket, HTTP, timers) is performed by `goban-client`,
//! which interprets the actions produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod board;
pub mod clock;
pub mod dispatch;
pub mod engine;
pub mod lobby;
pub mod session;
pub mod sgf;
pub mod state;
pub mod version;

pub use board::Board;
pub use clock::{format_ms, policy_for, ClockSync, TickOutcome, TimePolicy};
pub use dispatch::{Control, DispatchStats, Dispatcher, DropReason, GameEvent, Routed};
pub use engine::{Engine, MoveOutcome, Score, Setup, Territory};
pub use lobby::{LobbyChange, LobbyTracker};
pub use session::{GameSession, Ghost, MoveRejected, Outcome, SessionAction, SessionStats};
pub use sgf::{GameRecord, SgfError};
pub use state::{Action, ConnectionEvent, ConnectionState, Event};
pub use version::VersionTracker;

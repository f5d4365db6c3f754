//! # goban-types
//!
//! Wire vocabulary for the goban online Go client.
//!
//! This crate provides the foundational types used across all goban crates:
//! - [`Stone`], [`Point`], [`MoveRecord`] - Board vocabulary
//! - [`GameId`], [`ChallengeId`], [`PlayerId`] - Server identifiers
//! - [`Frame`] - Text frame codec (control markers and event frames)
//! - [`messages`] - Inbound payloads decoded once at the transport boundary
//! - [`Directive`] - Outbound commands
//! - [`WireError`] - Error types
//!
//! Payloads arriving from the server are loosely typed (numbers may be
//! encoded as integers, numeric strings or decimals). All of that leniency
//! lives in [`coerce`]; everything past the decoders is strongly typed.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coerce;
mod directives;
mod error;
mod frame;
mod ids;
pub mod messages;
mod stone;

pub use directives::{ChallengeParams, Directive, MoveClock};
pub use error::WireError;
pub use frame::{EventFrame, Frame, OpenInfo};
pub use ids::{ChallengeId, GameId, PlayerId};
pub use messages::TimeControl;
pub use stone::{move_token, MoveRecord, Point, Stone, PASS_TOKEN};

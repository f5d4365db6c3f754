//! CLI command implementations.

pub mod lobby;
pub mod replay;
pub mod watch;

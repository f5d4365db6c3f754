//! Version tracking for one game.
//!
//! Three counters are kept:
//! - the highest authoritative `state_version` seen in any snapshot;
//! - the highest move number the server has announced (the *remote* move
//!   count, which undo requests must reference);
//! - the local version, i.e. the number of moves applied locally, including
//!   optimistic ones not yet confirmed.
//!
//! The first two only grow. The one exception is the remote move count,
//! which [`VersionTracker::rollback`] lowers when the server confirms an undo.
//! The known version keeps its maximum even then, so an echo from before the
//! undo still reads as stale.

/// Tracks known remote versions and the local move counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionTracker {
    known: Option<u64>,
    remote_moves: u64,
    local: u64,
}

impl VersionTracker {
    /// Create a new tracker with nothing known.
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest state version seen so far.
    pub fn known(&self) -> Option<u64> {
        self.known
    }

    /// Whether a snapshot at `incoming` adds nothing over what is known.
    ///
    /// A snapshot without a version cannot be compared and is never stale.
    pub fn is_stale(&self, incoming: Option<u64>) -> bool {
        match (incoming, self.known) {
            (Some(v), Some(k)) => v <= k,
            _ => false,
        }
    }

    /// Record a state version: `known = max(known, v)`.
    ///
    /// Returns `true` if the known version advanced.
    pub fn observe(&mut self, version: u64) -> bool {
        match self.known {
            Some(k) if k >= version => false,
            _ => {
                self.known = Some(version);
                true
            }
        }
    }

    /// Record a move number announced by the server.
    pub fn observe_move(&mut self, move_number: u64) {
        self.remote_moves = self.remote_moves.max(move_number);
    }

    /// The server's move count as far as we know.
    pub fn remote_moves(&self) -> u64 {
        self.remote_moves
    }

    /// Confirmed undo: the server now has `moves` moves at `version`.
    ///
    /// The move count goes down; the known version does not.
    pub fn rollback(&mut self, moves: u64, version: Option<u64>) {
        self.remote_moves = moves;
        if let Some(v) = version {
            self.observe(v);
        }
    }

    /// Moves applied locally.
    pub fn local(&self) -> u64 {
        self.local
    }

    /// Set the local move count after the engine changed.
    pub fn set_local(&mut self, applied: u64) {
        self.local = applied;
    }

    /// Sequence number for the next outgoing tagged directive.
    pub fn next_sequence(&self) -> u64 {
        self.local + 1
    }

    /// Forget everything (game switch).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

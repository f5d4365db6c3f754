//! Lobby tracker: open challenges plus the finished-game shield.
//!
//! The server keeps advertising a game as active for a while after it ends.
//! Without remembering which ids are finished, a client that auto-joins its
//! active games would reconnect to a dead game forever. Once an id lands in
//! the finished set it stays there for the life of the tracker.

use std::collections::{BTreeSet, HashMap, HashSet};

use goban_types::messages::{ActiveGameEcho, Challenge, SeekUpdate};
use goban_types::{ChallengeId, GameId, PlayerId};
use tracing::debug;

/// A change worth telling observers about.
#[derive(Debug, Clone, PartialEq)]
pub enum LobbyChange {
    /// A challenge appeared.
    ChallengeAdded(ChallengeId),
    /// An existing challenge was replaced.
    ChallengeUpdated(ChallengeId),
    /// A challenge went away.
    ChallengeRemoved(ChallengeId),
    /// A game of ours became joinable.
    Joinable(GameId),
    /// A game is no longer joinable.
    NoLongerJoinable(GameId),
}

/// Challenge map, joinable set and finished-id shield.
#[derive(Debug, Default)]
pub struct LobbyTracker {
    user: Option<PlayerId>,
    challenges: HashMap<ChallengeId, Challenge>,
    finished: HashSet<GameId>,
    joinable: BTreeSet<GameId>,
}

impl LobbyTracker {
    /// An empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whose games count as joinable.
    pub fn set_user(&mut self, user: Option<PlayerId>) {
        if self.user != user {
            self.user = user;
            self.joinable.clear();
        }
    }

    /// Apply a batch of feed records in order. Last write for an id wins.
    pub fn apply_seek(&mut self, updates: Vec<SeekUpdate>) -> Vec<LobbyChange> {
        let mut changes = Vec::new();
        for update in updates {
            match update {
                SeekUpdate::Delete(id) => {
                    if self.challenges.remove(&id).is_some() {
                        changes.push(LobbyChange::ChallengeRemoved(id));
                    }
                }
                SeekUpdate::Upsert(challenge) => {
                    let id = challenge.id;
                    if challenge.game_id.map(|g| self.is_shielded(g)).unwrap_or(false) {
                        debug!(challenge = %id, "challenge for finished game ignored");
                        if self.challenges.remove(&id).is_some() {
                            changes.push(LobbyChange::ChallengeRemoved(id));
                        }
                        continue;
                    }
                    match self.challenges.insert(id, challenge) {
                        Some(_) => changes.push(LobbyChange::ChallengeUpdated(id)),
                        None => changes.push(LobbyChange::ChallengeAdded(id)),
                    }
                }
            }
        }
        changes
    }

    /// Process an active-game echo.
    ///
    /// A finished signal shields the id. Otherwise the id becomes joinable
    /// only if the user plays in it, the phase is play or scoring, and it
    /// is not shielded.
    pub fn observe_game(&mut self, echo: &ActiveGameEcho) -> Vec<LobbyChange> {
        let id = echo.game_id;
        if echo.signals_finished() {
            return self.shield(id);
        }
        if self.is_shielded(id) {
            debug!(game = %id, "active echo for finished game ignored");
            return Vec::new();
        }

        let ours = self.user.map(|u| echo.involves(u)).unwrap_or(false);
        let active = echo.phase.as_ref().map(|p| p.is_active()).unwrap_or(false);
        if ours && active && self.joinable.insert(id) {
            vec![LobbyChange::Joinable(id)]
        } else {
            Vec::new()
        }
    }

    /// Permanently mark `id` finished and drop it from the joinable set.
    pub fn shield(&mut self, id: GameId) -> Vec<LobbyChange> {
        self.finished.insert(id);
        let mut changes = Vec::new();
        if self.joinable.remove(&id) {
            changes.push(LobbyChange::NoLongerJoinable(id));
        }
        let stale: Vec<ChallengeId> = self
            .challenges
            .values()
            .filter(|c| c.game_id == Some(id))
            .map(|c| c.id)
            .collect();
        for cid in stale {
            self.challenges.remove(&cid);
            changes.push(LobbyChange::ChallengeRemoved(cid));
        }
        changes
    }

    /// Whether `id` is known to be finished.
    pub fn is_shielded(&self, id: GameId) -> bool {
        self.finished.contains(&id)
    }

    /// Open challenges, sorted by id.
    pub fn challenges(&self) -> Vec<&Challenge> {
        let mut list: Vec<&Challenge> = self.challenges.values().collect();
        list.sort_by_key(|c| c.id);
        list
    }

    /// Look up one challenge.
    pub fn challenge(&self, id: ChallengeId) -> Option<&Challenge> {
        self.challenges.get(&id)
    }

    /// The user's joinable games, sorted.
    pub fn joinable(&self) -> Vec<GameId> {
        self.joinable.iter().copied().collect()
    }

    /// Forget all challenges (on lobby unsubscribe). The shield survives.
    pub fn clear_challenges(&mut self) {
        self.challenges.clear();
    }
}

//! Who the user is.
//!
//! Identity is resolved once through the HTTP API. A failure does not stop
//! the client: it carries on read-only, observing games without being able
//! to act in them.

use goban_types::messages::Identity;
use goban_types::{Directive, PlayerId};
use tracing::{info, warn};

use crate::api::ApiError;

/// Identity resolution state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IdentityState {
    /// Nothing attempted yet.
    #[default]
    Unresolved,
    /// Fetch in flight.
    Resolving,
    /// Identity known; the socket can authenticate.
    Resolved(Identity),
    /// Fetch failed; spectator mode.
    ReadOnly {
        /// Why the identity is unavailable.
        reason: String,
    },
}

impl IdentityState {
    /// Mark a fetch as started. Returns `false` if one is already running
    /// or the identity is known.
    pub fn begin(&mut self) -> bool {
        match self {
            Self::Resolving | Self::Resolved(_) => false,
            _ => {
                *self = Self::Resolving;
                true
            }
        }
    }

    /// Record the fetch result.
    pub fn finish(&mut self, result: Result<Identity, ApiError>) {
        *self = match result {
            Ok(identity) => {
                info!(player = %identity.player_id, username = %identity.username, "identity resolved");
                Self::Resolved(identity)
            }
            Err(e) => {
                warn!(error = %e, "identity unavailable, continuing read-only");
                Self::ReadOnly { reason: e.to_string() }
            }
        };
    }

    /// The resolved identity.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Resolved(identity) => Some(identity),
            _ => None,
        }
    }

    /// The user's account id.
    pub fn player_id(&self) -> Option<PlayerId> {
        self.identity().map(|i| i.player_id)
    }

    /// Whether game actions are blocked.
    pub fn is_read_only(&self) -> bool {
        self.identity().is_none()
    }

    /// The socket-level authenticate directive, once the identity is known.
    pub fn auth_directive(&self) -> Option<Directive> {
        self.identity().map(|i| Directive::Authenticate {
            jwt: i.jwt.clone(),
            player_id: i.player_id,
            username: i.username.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity {
            player_id: PlayerId::new(5),
            username: "alice".into(),
            jwt: "jwt-token".into(),
        }
    }

    #[test]
    fn starts_unresolved_and_read_only() {
        let state = IdentityState::default();
        assert_eq!(state, IdentityState::Unresolved);
        assert!(state.is_read_only());
        assert!(state.auth_directive().is_none());
    }

    #[test]
    fn begin_is_exclusive() {
        let mut state = IdentityState::default();
        assert!(state.begin());
        assert!(!state.begin());
        state.finish(Ok(alice()));
        assert!(!state.begin());
    }

    #[test]
    fn resolved_identity_authenticates() {
        let mut state = IdentityState::default();
        state.begin();
        state.finish(Ok(alice()));

        assert_eq!(state.player_id(), Some(PlayerId::new(5)));
        assert!(!state.is_read_only());
        assert_eq!(
            state.auth_directive(),
            Some(Directive::Authenticate {
                jwt: "jwt-token".into(),
                player_id: PlayerId::new(5),
                username: "alice".into(),
            })
        );
    }

    #[test]
    fn failure_degrades_to_read_only_and_can_retry() {
        let mut state = IdentityState::default();
        state.begin();
        state.finish(Err(ApiError::Unauthorized));

        assert_eq!(
            state,
            IdentityState::ReadOnly {
                reason: "unauthorized".into()
            }
        );
        assert!(state.is_read_only());
        assert!(state.begin());
    }
}

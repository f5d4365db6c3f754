//! One-shot calls that do not go over the socket.
//!
//! Identity resolution, full-state refetch and challenge accept/create are
//! plain request/response calls. The client runs them on spawned tasks and
//! applies the results in its own loop.

mod http;
mod mock;

pub use http::HttpApi;
pub use mock::MockApi;

use async_trait::async_trait;
use goban_types::messages::{ChallengeCreated, GameData, Identity};
use goban_types::{ChallengeId, ChallengeParams, GameId, WireError};
use thiserror::Error;

/// API errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Could not reach the server.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Request failed at the HTTP level.
    #[error("http error: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Credentials missing or rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// The response did not decode.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            ApiError::ConnectionFailed(e.to_string())
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Http(e.to_string())
        }
    }
}

impl From<WireError> for ApiError {
    fn from(e: WireError) -> Self {
        ApiError::Decode(e.to_string())
    }
}

/// Request/response calls to the game server.
#[async_trait]
pub trait GameApi: Send + Sync + 'static {
    /// Who the user is, plus the socket auth token.
    async fn fetch_identity(&self) -> Result<Identity, ApiError>;

    /// The authoritative state of one game.
    async fn fetch_game_state(&self, game_id: GameId) -> Result<GameData, ApiError>;

    /// Accept an open challenge; returns the game it created.
    async fn accept_challenge(&self, challenge_id: ChallengeId) -> Result<GameId, ApiError>;

    /// Post a new challenge.
    async fn create_challenge(&self, params: &ChallengeParams) -> Result<ChallengeCreated, ApiError>;
}

//! Mock API for testing.

use super::{ApiError, GameApi};
use async_trait::async_trait;
use goban_types::messages::{ChallengeCreated, GameData, Identity};
use goban_types::{ChallengeId, ChallengeParams, GameId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Mock API with scripted responses and a call log.
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    inner: Arc<Mutex<MockApiInner>>,
}

#[derive(Debug, Default)]
struct MockApiInner {
    identity: Option<Result<Identity, ApiError>>,
    game_states: HashMap<GameId, VecDeque<Result<GameData, ApiError>>>,
    accepts: HashMap<ChallengeId, Result<GameId, ApiError>>,
    created: Option<Result<ChallengeCreated, ApiError>>,
    calls: Vec<String>,
}

impl MockApi {
    /// Create a mock with nothing scripted. Unscripted calls fail.
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MockApiInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer identity fetches with `identity`.
    pub fn with_identity(self, identity: Identity) -> Self {
        self.inner().identity = Some(Ok(identity));
        self
    }

    /// Make identity fetches fail.
    pub fn with_identity_error(self, error: ApiError) -> Self {
        self.inner().identity = Some(Err(error));
        self
    }

    /// Queue one answer for a game state fetch.
    pub fn queue_game_state(&self, game_id: GameId, result: Result<GameData, ApiError>) {
        self.inner().game_states.entry(game_id).or_default().push_back(result);
    }

    /// Answer accepts of `challenge_id`.
    pub fn set_accept(&self, challenge_id: ChallengeId, result: Result<GameId, ApiError>) {
        self.inner().accepts.insert(challenge_id, result);
    }

    /// Answer challenge creation.
    pub fn set_created(&self, result: Result<ChallengeCreated, ApiError>) {
        self.inner().created = Some(result);
    }

    /// Calls made so far, e.g. `game_state:42`.
    pub fn calls(&self) -> Vec<String> {
        self.inner().calls.clone()
    }
}

fn unscripted(what: &str) -> ApiError {
    ApiError::Status {
        status: 404,
        body: format!("mock has no answer for {}", what),
    }
}

#[async_trait]
impl GameApi for MockApi {
    async fn fetch_identity(&self) -> Result<Identity, ApiError> {
        let mut inner = self.inner();
        inner.calls.push("identity".into());
        inner.identity.clone().unwrap_or_else(|| Err(ApiError::Unauthorized))
    }

    async fn fetch_game_state(&self, game_id: GameId) -> Result<GameData, ApiError> {
        let mut inner = self.inner();
        inner.calls.push(format!("game_state:{}", game_id));
        inner
            .game_states
            .get_mut(&game_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(unscripted("game state")))
    }

    async fn accept_challenge(&self, challenge_id: ChallengeId) -> Result<GameId, ApiError> {
        let mut inner = self.inner();
        inner.calls.push(format!("accept:{}", challenge_id));
        inner
            .accepts
            .get(&challenge_id)
            .cloned()
            .unwrap_or_else(|| Err(unscripted("accept")))
    }

    async fn create_challenge(&self, params: &ChallengeParams) -> Result<ChallengeCreated, ApiError> {
        let mut inner = self.inner();
        inner.calls.push(format!("create:{}", params.name));
        inner.created.clone().unwrap_or_else(|| Err(unscripted("create")))
    }
}

//! HTTP implementation of [`GameApi`] over reqwest.

use super::{ApiError, GameApi};
use async_trait::async_trait;
use goban_types::messages::{ChallengeCreated, GameData, Identity};
use goban_types::{ChallengeId, ChallengeParams, GameId};
use serde_json::Value;
use tracing::debug;

use crate::config::ServerConfig;

/// Response bodies longer than this are cut in error messages.
const MAX_ERROR_BODY: usize = 512;

/// Client for the server's HTTP API.
pub struct HttpApi {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl std::fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApi")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl HttpApi {
    /// Create a client for the configured server.
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn json(&self, request: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate(&mut body, MAX_ERROR_BODY);
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

fn truncate(body: &mut String, max: usize) {
    if body.len() > max {
        let mut cut = max;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
}

/// Unwrap `{gamedata: {...}}` envelopes.
fn game_payload(value: &Value) -> &Value {
    value.get("gamedata").filter(|g| g.is_object()).unwrap_or(value)
}

#[async_trait]
impl GameApi for HttpApi {
    async fn fetch_identity(&self) -> Result<Identity, ApiError> {
        let value = self.json(self.http.get(self.url("api/v1/ui/config"))).await?;
        Ok(Identity::from_value(&value)?)
    }

    async fn fetch_game_state(&self, game_id: GameId) -> Result<GameData, ApiError> {
        debug!(game = %game_id, "fetching game state");
        let url = self.url(&format!("api/v1/games/{}", game_id));
        let value = self.json(self.http.get(url)).await?;
        let mut data = GameData::from_value(game_payload(&value))?;
        data.game_id.get_or_insert(game_id);
        Ok(data)
    }

    async fn accept_challenge(&self, challenge_id: ChallengeId) -> Result<GameId, ApiError> {
        let url = self.url(&format!("api/v1/challenges/{}/accept", challenge_id));
        let value = self.json(self.http.post(url).json(&serde_json::json!({}))).await?;
        value
            .get("game")
            .or_else(|| value.get("game_id"))
            .and_then(GameId::from_json)
            .ok_or_else(|| ApiError::Decode("accept response has no game id".into()))
    }

    async fn create_challenge(&self, params: &ChallengeParams) -> Result<ChallengeCreated, ApiError> {
        let value = self
            .json(self.http.post(self.url("api/v1/challenges")).json(params))
            .await?;
        Ok(ChallengeCreated::from_value(&value)?)
    }
}

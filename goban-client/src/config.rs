//! Configuration loading for goban-client.
//!
//! Configuration is loaded from a TOML file (default: `goban.toml`). Every
//! section and field is optional; missing values fall back to the defaults
//! below.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Server endpoints.
    #[serde(default)]
    pub server: ServerConfig,
    /// Heartbeat, reconnect and clock timing.
    #[serde(default)]
    pub timing: TimingConfig,
    /// Play preferences.
    #[serde(default)]
    pub play: PlayConfig,
}

/// Server endpoints.
#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket URL.
    #[serde(default = "default_socket_url")]
    pub socket_url: String,
    /// Base URL for one-shot HTTP calls.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Bearer token for the HTTP API (optional; anonymous without it).
    pub api_token: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("socket_url", &self.socket_url)
            .field("api_url", &self.api_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Timer configuration, all in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// Interval between application heartbeats (default: 10s).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Delay before the single reconnect attempt (default: 2.5s).
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Local clock tick (default: 100ms).
    #[serde(default = "default_clock_tick_ms")]
    pub clock_tick_ms: u64,
    /// Per-game presence pulse while seated (default: 30s).
    #[serde(default = "default_presence_interval_ms")]
    pub presence_interval_ms: u64,
    /// Give up on opening the socket after this long (default: 10s).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// Play preferences.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayConfig {
    /// Subscribe to game chat when joining (default: true).
    #[serde(default = "default_wants_chat")]
    pub wants_chat: bool,
    /// Lobby channel to subscribe to (default: `global`).
    #[serde(default = "default_lobby_channel")]
    pub lobby_channel: String,
    /// Capacity of the client event channel (default: 256).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

// Default value functions
fn default_socket_url() -> String {
    "wss://online-go.com/socket.io/?EIO=4&transport=websocket".to_string()
}

fn default_api_url() -> String {
    "https://online-go.com".to_string()
}

fn default_heartbeat_interval_ms() -> u64 {
    10_000
}

fn default_reconnect_delay_ms() -> u64 {
    2_500
}

fn default_clock_tick_ms() -> u64 {
    100
}

fn default_presence_interval_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_wants_chat() -> bool {
    true
}

fn default_lobby_channel() -> String {
    "global".to_string()
}

fn default_event_channel_capacity() -> usize {
    256
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_url: default_socket_url(),
            api_url: default_api_url(),
            api_token: None,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            clock_tick_ms: default_clock_tick_ms(),
            presence_interval_ms: default_presence_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for PlayConfig {
    fn default() -> Self {
        Self {
            wants_chat: default_wants_chat(),
            lobby_channel: default_lobby_channel(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl TimingConfig {
    /// Heartbeat interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    /// Reconnect delay.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Clock tick interval.
    pub fn clock_tick(&self) -> Duration {
        Duration::from_millis(self.clock_tick_ms.max(1))
    }

    /// Presence pulse interval.
    pub fn presence_interval(&self) -> Duration {
        Duration::from_millis(self.presence_interval_ms.max(1))
    }

    /// Socket open timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Set the socket URL.
    pub fn with_socket_url(mut self, url: &str) -> Self {
        self.server.socket_url = url.to_string();
        self
    }

    /// Set the HTTP API base URL.
    pub fn with_api_url(mut self, url: &str) -> Self {
        self.server.api_url = url.to_string();
        self
    }

    /// Set the HTTP API token.
    pub fn with_api_token(mut self, token: &str) -> Self {
        self.server.api_token = Some(token.to_string());
        self
    }

    /// Set the reconnect delay.
    pub fn with_reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.timing.reconnect_delay_ms = ms;
        self
    }

    /// Set the heartbeat interval.
    pub fn with_heartbeat_interval_ms(mut self, ms: u64) -> Self {
        self.timing.heartbeat_interval_ms = ms;
        self
    }

    /// Enable or disable the game chat subscription.
    pub fn with_chat(mut self, wants_chat: bool) -> Self {
        self.play.wants_chat = wants_chat;
        self
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

//! Locating and loading the client configuration.

use anyhow::{Context, Result};
use goban_client::ClientConfig;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the API token from the file.
pub const TOKEN_ENV: &str = "GOBAN_API_TOKEN";

/// The per-user config path, e.g. `~/.config/goban/goban.toml` on Linux.
pub fn default_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "goban", "goban").map(|dirs| dirs.config_dir().join("goban.toml"))
}

/// Load `explicit` if given (it must exist), else the per-user file if it
/// exists, else built-in defaults.
pub fn load(explicit: Option<&Path>) -> Result<ClientConfig> {
    let config = match explicit {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => match default_path().filter(|p| p.exists()) {
            Some(path) => ClientConfig::from_file(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ClientConfig::default(),
        },
    };
    Ok(with_env_token(config, std::env::var(TOKEN_ENV).ok()))
}

fn with_env_token(config: ClientConfig, token: Option<String>) -> ClientConfig {
    match token.filter(|t| !t.is_empty()) {
        Some(token) => config.with_api_token(&token),
        None => config,
    }
}

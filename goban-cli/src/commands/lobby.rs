//! List open lobby challenges.

use anyhow::Result;
use goban_client::{ClientConfig, ClientEvent, GoClient, HttpApi, WsTransport};
use goban_core::LobbyChange;
use goban_types::messages::{Challenge, TimeControl};
use std::fmt::Write;

use super::watch::format_event;

/// Run the lobby command until interrupted.
pub async fn run(config: ClientConfig) -> Result<()> {
    let api = HttpApi::new(&config.server);
    let (client, view, mut events) = GoClient::start(config, WsTransport::new(), api);
    client.connect()?;
    client.subscribe_lobby()?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ClientEvent::Lobby(changes)) => {
                    for change in &changes {
                        println!("{}", describe_change(change));
                    }
                    let challenges = view.borrow().challenges.clone();
                    print!("{}", table(&challenges));
                }
                Some(event) => {
                    if let Some(text) = format_event(&event) {
                        println!("{}", text);
                    }
                }
                None => break,
            },

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.unsubscribe_lobby()?;
    client.shutdown().await;
    Ok(())
}

fn describe_change(change: &LobbyChange) -> String {
    match change {
        LobbyChange::ChallengeAdded(id) => format!("+ challenge {}", id),
        LobbyChange::ChallengeUpdated(id) => format!("~ challenge {}", id),
        LobbyChange::ChallengeRemoved(id) => format!("- challenge {}", id),
        LobbyChange::Joinable(id) => format!("Your game {} is in progress", id),
        LobbyChange::NoLongerJoinable(id) => format!("Your game {} ended", id),
    }
}

fn time_label(tc: Option<&TimeControl>) -> &'static str {
    match tc {
        Some(TimeControl::Byoyomi { .. }) => "byoyomi",
        Some(TimeControl::Fischer { .. }) => "fischer",
        Some(TimeControl::Canadian { .. }) => "canadian",
        Some(TimeControl::Simple { .. }) => "simple",
        Some(TimeControl::Absolute { .. }) => "absolute",
        Some(TimeControl::None) | None => "none",
    }
}

/// Text table of challenges.
pub fn table(challenges: &[Challenge]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:>10}  {:<16} {:>5}  {:>3}  {:<6} {:<9}", "id", "player", "size", "hc", "ranked", "time");
    for c in challenges {
        let player = c
            .challenger
            .as_ref()
            .map(|p| p.username.clone().unwrap_or_else(|| format!("#{}", p.id)))
            .unwrap_or_else(|| "?".to_string());
        let _ = writeln!(
            out,
            "{:>10}  {:<16} {:>5}  {:>3}  {:<6} {:<9}",
            c.id.to_string(),
            player,
            format!("{}x{}", c.width, c.height),
            c.handicap,
            if c.ranked { "yes" } else { "no" },
            time_label(c.time_control.as_ref())
        );
    }
    out
}

//! Follow or play a live game.
//!
//! The board is reprinted whenever the position changes. With `--play`,
//! stdin lines are commands: a coordinate (`dd`), `pass`, `undo`, `accept`,
//! `reject`, `resign`, `say <text>` or `quit`.

use anyhow::{bail, Result};
use goban_client::{ClientConfig, ClientError, ClientEvent, GameView, GoClient, HttpApi, WsTransport};
use goban_core::{format_ms, ConnectionEvent};
use goban_types::messages::PlayerInfo;
use goban_types::{GameId, Point, Stone};
use std::fmt::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// One line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Play here.
    Move(Point),
    /// Pass.
    Pass,
    /// Ask to undo.
    Undo,
    /// Accept the opponent's undo.
    Accept,
    /// Reject the opponent's undo.
    Reject,
    /// Resign.
    Resign,
    /// Chat.
    Say(String),
    /// Stop.
    Quit,
}

/// Parse one input line.
pub fn parse_input(line: &str) -> Result<Input> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let input = match word {
        "pass" => Input::Pass,
        "undo" => Input::Undo,
        "accept" => Input::Accept,
        "reject" => Input::Reject,
        "resign" => Input::Resign,
        "quit" | "exit" => Input::Quit,
        "say" if !rest.trim().is_empty() => Input::Say(rest.trim().to_string()),
        coord => match Point::from_coord(coord) {
            Some(point) => Input::Move(point),
            None => bail!("Unknown command '{}'", line),
        },
    };
    Ok(input)
}

/// Run the watch command.
pub async fn run(config: ClientConfig, game_id: u64, play: bool) -> Result<()> {
    let api = HttpApi::new(&config.server);
    let (client, mut view, mut events) = GoClient::start(config, WsTransport::new(), api);
    client.connect()?;
    client.join_game(GameId::new(game_id))?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut shown = None;

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = view.borrow_and_update().clone();
                let key = (snapshot.move_number, snapshot.history_len, snapshot.finished);
                if snapshot.game_id.is_some() && shown != Some(key) {
                    shown = Some(key);
                    print!("{}", describe(&snapshot));
                }
                if snapshot.finished && !play {
                    break;
                }
            }

            Some(event) = events.recv() => {
                if let Some(text) = format_event(&event) {
                    println!("{}", text);
                }
            }

            line = stdin.next_line(), if play => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => match parse_input(&line) {
                    Ok(Input::Quit) => break,
                    Ok(input) => apply(&client, input).await?,
                    Err(e) => eprintln!("{}", e),
                },
                None => break,
            },

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.shutdown().await;
    Ok(())
}

async fn apply(client: &GoClient, input: Input) -> Result<()> {
    debug!(?input, "user input");
    let result = match input {
        Input::Move(point) => client.request_move(point).await,
        Input::Pass => client.request_pass().await,
        Input::Undo => client.request_undo().await,
        Input::Accept => client.accept_undo().await,
        Input::Reject => client.reject_undo().await,
        Input::Resign => client.request_resign().await,
        Input::Say(text) => client.send_chat(&text),
        Input::Quit => Ok(()),
    };
    match result {
        Ok(()) => Ok(()),
        Err(ClientError::Rejected(reason)) => {
            eprintln!("Not sent: {}", reason);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn player_name(player: Option<&PlayerInfo>) -> String {
    match player {
        Some(PlayerInfo {
            username: Some(name), ..
        }) => name.clone(),
        Some(player) => format!("#{}", player.id),
        None => "?".to_string(),
    }
}

/// Text rendering of a game view.
pub fn describe(view: &GameView) -> String {
    let mut out = String::new();
    if let Some(game_id) = view.game_id {
        let _ = writeln!(
            out,
            "Game {}: {} (B) vs {} (W)",
            game_id,
            player_name(view.black.as_ref()),
            player_name(view.white.as_ref())
        );
    }
    let _ = write!(out, "{}", view.board);
    let _ = writeln!(
        out,
        "Move {}  Captures B {} W {}",
        view.move_number, view.black_captures, view.white_captures
    );

    if view.clock_system != "none" {
        for color in [Stone::Black, Stone::White] {
            let time = view.time_of(color);
            let ticking = if view.ticking == Some(color) { " *" } else { "" };
            let _ = write!(out, "{}: {}", color, format_ms(time.main_ms));
            if time.periods > 0 {
                let _ = write!(out, " + {}x{}", time.periods, format_ms(time.period_ms));
            }
            let _ = writeln!(out, "{}", ticking);
        }
    }

    match (&view.outcome, view.finished) {
        (Some(outcome), _) => {
            let _ = writeln!(out, "Finished: {}", outcome.text);
        }
        (None, true) => {
            let _ = writeln!(out, "Finished");
        }
        (None, false) if view.is_my_turn() => {
            let _ = writeln!(out, "Your move ({})", view.turn);
        }
        (None, false) => {
            let _ = writeln!(out, "{} to move", view.turn);
        }
    }
    if let Some(number) = view.opponent_undo {
        let _ = writeln!(out, "Opponent asks to undo move {} (accept/reject)", number);
    }
    if view.pending_undo {
        let _ = writeln!(out, "Undo requested");
    }
    out
}

/// One-line text for an event, or `None` for events not worth printing.
pub fn format_event(event: &ClientEvent) -> Option<String> {
    let text = match event {
        ClientEvent::Connectivity(ConnectionEvent::Ready) => "Connected".to_string(),
        ClientEvent::Connectivity(ConnectionEvent::Lost { reason, attempt }) => {
            format!("Connection lost ({}), reconnect attempt {}", reason, attempt)
        }
        ClientEvent::Connectivity(ConnectionEvent::Disconnected { reason }) => {
            format!("Disconnected ({})", reason)
        }
        ClientEvent::ReadOnly { reason } => format!("Read-only: {}", reason),
        ClientEvent::SignedIn { username } => format!("Signed in as {}", username),
        ClientEvent::Chat { line, .. } => format!("<{}> {}", line.username, line.body),
        ClientEvent::Expired(color) => format!("{} ran out of time", color),
        ClientEvent::ChallengeAccepted { game_id, .. } => format!("Challenge accepted, game {}", game_id),
        ClientEvent::ChallengeCreated(created) => format!("Challenge {} posted", created.challenge_id),
        ClientEvent::ApiFailed { operation, error } => format!("{} failed: {}", operation, error),
        ClientEvent::Lobby(_) | ClientEvent::Latency { .. } => return None,
    };
    Some(text)
}

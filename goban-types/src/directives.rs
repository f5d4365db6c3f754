//! Outbound commands.

use serde::Serialize;
use serde_json::{json, Value};

use crate::frame::{EventFrame, Frame};
use crate::messages::TimeControl;
use crate::{move_token, ChallengeId, GameId, PlayerId, Point, Stone};

/// The sender's view of both clocks, attached to a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoveClock {
    /// Black's remaining main time.
    pub black_ms: u64,
    /// White's remaining main time.
    pub white_ms: u64,
}

/// Parameters of a new lobby challenge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChallengeParams {
    /// Game name shown in the lobby.
    pub name: String,
    /// Board width (square boards only).
    pub width: usize,
    /// Board height.
    pub height: usize,
    /// Ranked game.
    pub ranked: bool,
    /// Handicap stones.
    pub handicap: u32,
    /// Fixed komi, or `None` for automatic.
    pub komi: Option<f64>,
    /// Rule set name, e.g. `japanese`.
    pub rules: String,
    /// Requested color, or `None` for automatic.
    pub challenger_color: Option<Stone>,
    /// Time system.
    pub time_control: TimeControl,
}

impl Default for ChallengeParams {
    fn default() -> Self {
        Self {
            name: "Friendly Match".to_string(),
            width: 19,
            height: 19,
            ranked: false,
            handicap: 0,
            komi: None,
            rules: "japanese".to_string(),
            challenger_color: None,
            time_control: TimeControl::Byoyomi {
                main_ms: 600_000,
                period_ms: 30_000,
                periods: 5,
            },
        }
    }
}

/// A command sent to the server as a named event.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Join a game's event stream.
    GameConnect {
        /// Game to join.
        game_id: GameId,
        /// Also subscribe to its chat.
        chat: bool,
    },
    /// Leave a game's event stream.
    GameDisconnect {
        /// Game to leave.
        game_id: GameId,
    },
    /// Play a stone or pass.
    Move {
        /// Target game.
        game_id: GameId,
        /// Coordinate, or `None` to pass.
        point: Option<Point>,
        /// Milliseconds the window was unfocused during this move.
        blur_ms: u64,
        /// Sender's clock view, if any.
        clock: Option<MoveClock>,
    },
    /// Resign the game.
    Resign {
        /// Target game.
        game_id: GameId,
    },
    /// Ask the opponent to take back `move_number`.
    UndoRequest {
        /// Target game.
        game_id: GameId,
        /// The server's move count at request time.
        move_number: u64,
    },
    /// Grant the opponent's undo request.
    UndoAccept {
        /// Target game.
        game_id: GameId,
        /// Move being taken back.
        move_number: u64,
    },
    /// Refuse the opponent's undo request.
    UndoReject {
        /// Target game.
        game_id: GameId,
    },
    /// Post a challenge in the lobby.
    CreateChallenge(ChallengeParams),
    /// Withdraw an own challenge.
    CancelChallenge {
        /// Challenge to withdraw.
        challenge_id: ChallengeId,
    },
    /// Subscribe to a lobby channel.
    LobbySubscribe {
        /// Channel name.
        channel: String,
    },
    /// Unsubscribe from a lobby channel.
    LobbyUnsubscribe {
        /// Channel name.
        channel: String,
    },
    /// Post a chat line.
    Chat {
        /// Target game.
        game_id: GameId,
        /// Message text.
        body: String,
        /// Chat channel type (`main`, `malkovich`, ...).
        kind: String,
    },
    /// Authenticate the socket.
    Authenticate {
        /// Opaque token from the identity fetch.
        jwt: String,
        /// Account id.
        player_id: PlayerId,
        /// Display name.
        username: String,
    },
    /// Application-level heartbeat.
    NetPing {
        /// Local wall-clock time, echoed back in the pong.
        client_ms: u64,
    },
    /// Reply to a server heartbeat.
    NetPong {
        /// Nonce from the server's ping.
        nonce: Value,
        /// Local wall-clock time.
        client_ms: u64,
    },
    /// Per-game keepalive while seated in a game.
    Presence {
        /// Target game.
        game_id: GameId,
    },
}

impl Directive {
    /// Event name on the wire.
    pub fn event_name(&self) -> &'static str {
        match self {
            Directive::GameConnect { .. } => "game/connect",
            Directive::GameDisconnect { .. } => "game/disconnect",
            Directive::Move { .. } => "game/move",
            Directive::Resign { .. } => "game/resign",
            Directive::UndoRequest { .. } => "game/undo/request",
            Directive::UndoAccept { .. } => "game/undo/accept",
            Directive::UndoReject { .. } => "game/undo/reject",
            Directive::CreateChallenge(_) => "seek_graph/create",
            Directive::CancelChallenge { .. } => "seek_graph/cancel",
            Directive::LobbySubscribe { .. } => "seek_graph/connect",
            Directive::LobbyUnsubscribe { .. } => "seek_graph/disconnect",
            Directive::Chat { .. } => "game/chat",
            Directive::Authenticate { .. } => "authenticate",
            Directive::NetPing { .. } => "net/ping",
            Directive::NetPong { .. } => "net/pong",
            Directive::Presence { .. } => "game/presence",
        }
    }

    /// JSON payload.
    pub fn payload(&self) -> Value {
        match self {
            Directive::GameConnect { game_id, chat } => json!({"game_id": game_id, "chat": chat}),
            Directive::GameDisconnect { game_id }
            | Directive::Resign { game_id }
            | Directive::UndoReject { game_id }
            | Directive::Presence { game_id } => json!({ "game_id": game_id }),
            Directive::Move {
                game_id,
                point,
                blur_ms,
                clock,
            } => {
                let mut payload = json!({
                    "game_id": game_id,
                    "move": move_token(*point),
                    "blur": blur_ms,
                });
                if let Some(clock) = clock {
                    payload["clock"] = json!(clock);
                }
                payload
            }
            Directive::UndoRequest {
                game_id,
                move_number,
            }
            | Directive::UndoAccept {
                game_id,
                move_number,
            } => json!({"game_id": game_id, "move_number": move_number}),
            Directive::CreateChallenge(params) => json!(params),
            Directive::CancelChallenge { challenge_id } => json!({ "challenge_id": challenge_id }),
            Directive::LobbySubscribe { channel } | Directive::LobbyUnsubscribe { channel } => {
                json!({ "channel": channel })
            }
            Directive::Chat {
                game_id,
                body,
                kind,
            } => json!({"game_id": game_id, "body": body, "type": kind}),
            Directive::Authenticate {
                jwt,
                player_id,
                username,
            } => json!({"jwt": jwt, "player_id": player_id, "username": username}),
            Directive::NetPing { client_ms } => json!({ "client": client_ms }),
            Directive::NetPong { nonce, client_ms } => json!({"nonce": nonce, "client": client_ms}),
        }
    }

    /// Build the event frame, optionally tagged with a sequence number.
    pub fn into_frame(self, sequence: Option<u64>) -> Frame {
        let event = EventFrame::new(self.event_name(), self.payload());
        Frame::Event(match sequence {
            Some(seq) => event.with_sequence(seq),
            None => event,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_directive_encodes_coordinate_and_sequence() {
        let d = Directive::Move {
            game_id: GameId::new(9),
            point: Some(Point::new(15, 3)),
            blur_ms: 0,
            clock: None,
        };
        assert_eq!(d.event_name(), "game/move");
        assert_eq!(
            d.into_frame(Some(5)).encode(),
            r#"42["game/move",{"blur":0,"game_id":9,"move":"dp"},5]"#
        );
    }

    #[test]
    fn pass_uses_pass_token() {
        let d = Directive::Move {
            game_id: GameId::new(1),
            point: None,
            blur_ms: 120,
            clock: Some(MoveClock {
                black_ms: 1000,
                white_ms: 2000,
            }),
        };
        let payload = d.payload();
        assert_eq!(payload["move"], "..");
        assert_eq!(payload["clock"]["white_ms"], 2000);
    }

    #[test]
    fn undo_request_carries_move_number() {
        let d = Directive::UndoRequest {
            game_id: GameId::new(3),
            move_number: 12,
        };
        assert_eq!(d.payload(), json!({"game_id": 3, "move_number": 12}));
        assert_eq!(d.event_name(), "game/undo/request");
    }

    #[test]
    fn pong_echoes_nonce_verbatim() {
        let d = Directive::NetPong {
            nonce: json!("abc"),
            client_ms: 55,
        };
        assert_eq!(d.payload(), json!({"nonce": "abc", "client": 55}));
    }

    #[test]
    fn challenge_payload_uses_server_units() {
        let d = Directive::CreateChallenge(ChallengeParams {
            width: 9,
            height: 9,
            ..ChallengeParams::default()
        });
        let payload = d.payload();
        assert_eq!(payload["width"], 9);
        assert_eq!(payload["time_control"]["system"], "byoyomi");
        assert_eq!(payload["time_control"]["main_time"], 600.0);
        assert_eq!(payload["challenger_color"], Value::Null);
    }

    #[test]
    fn chat_and_lobby_payloads() {
        let chat = Directive::Chat {
            game_id: GameId::new(2),
            body: "gg".into(),
            kind: "main".into(),
        };
        assert_eq!(chat.payload(), json!({"game_id": 2, "body": "gg", "type": "main"}));

        let sub = Directive::LobbySubscribe {
            channel: "global".into(),
        };
        assert_eq!(sub.event_name(), "seek_graph/connect");
        assert_eq!(sub.payload(), json!({"channel": "global"}));
    }
}

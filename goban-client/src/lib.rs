//! # goban-client
//!
//! Client library for playing and watching Go games on an online server.
//!
//! This is the library applications embed: it owns the socket, keeps the
//! local board in step with the server and publishes a renderable view.
//!
//! ## Features
//!
//! - **Optimistic play**: moves appear immediately and are reconciled
//!   against server snapshots and move events
//! - **Resilient connection**: one reconnect timer at a time, automatic
//!   re-authentication and game rejoin
//! - **Local clocks**: byo-yomi, Fischer, Canadian, simple and absolute
//!   time ticked between server snapshots
//! - **Transport abstraction**: pluggable socket (WebSocket, mock) and HTTP
//!   API (reqwest, mock)
//! - **Pure core**: protocol state machines live in goban-core
//!
//! ## Example
//!
//! ```ignore
//! use goban_client::{ClientConfig, GoClient, HttpApi, WsTransport};
//!
//! let config = ClientConfig::from_file("goban.toml".as_ref())?;
//! let api = HttpApi::new(&config.server);
//! let (client, mut view, mut events) = GoClient::start(config, WsTransport::new(), api);
//!
//! client.connect()?;
//! client.join_game(GameId::new(123))?;
//! while view.changed().await.is_ok() {
//!     render(&view.borrow());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod client;
pub mod config;
pub mod identity;
mod runner;
pub mod transport;
pub mod view;

pub use api::{ApiError, GameApi, HttpApi, MockApi};
pub use client::{ClientError, ClientEvent, GoClient};
pub use config::{ClientConfig, ConfigError, PlayConfig, ServerConfig, TimingConfig};
pub use identity::IdentityState;
pub use transport::{MockTransport, Transport, TransportError, WsTransport};
pub use view::{Connectivity, GameView};

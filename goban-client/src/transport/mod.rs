//! Transport abstraction for goban.
//!
//! This module provides a pluggable transport layer that abstracts the
//! underlying socket (WebSocket, mock for testing). Transports move text
//! frames only; framing and the handshake live above them.
//!
//! # Design
//!
//! The transport trait is async and connection-oriented:
//! - `connect()` opens the socket
//! - `send()` transmits one text frame
//! - `recv()` waits for the next text frame
//! - `close()` tears the socket down
//!
//! `recv()` must be cancel-safe: the client polls it inside `tokio::select!`
//! and drops the future whenever another branch fires first.
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.connect("ws://localhost/socket").await?;
//! transport.send("40").await?;
//! let frame = transport.recv().await?;
//! ```

mod mock;
mod ws;

pub use mock::MockTransport;
pub use ws::WsTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connection timeout.
    #[error("connection timeout")]
    Timeout,
}

/// Transport trait for exchanging protocol text frames.
///
/// Implementations handle the underlying connection mechanism
/// (WebSocket, mock, etc).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a socket to `url`.
    async fn connect(&self, url: &str) -> Result<(), TransportError>;

    /// Send one text frame.
    async fn send(&self, text: &str) -> Result<(), TransportError>;

    /// Receive the next text frame.
    ///
    /// Waits until a frame arrives or the connection ends. Must be
    /// cancel-safe.
    async fn recv(&self) -> Result<String, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection.
    async fn close(&self) -> Result<(), TransportError>;
}

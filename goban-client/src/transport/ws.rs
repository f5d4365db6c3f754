//! WebSocket transport over tokio-tungstenite.

use super::{Transport, TransportError};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport.
///
/// Text messages carry protocol frames. Binary messages are ignored;
/// transport-level pings are answered by tungstenite itself.
#[derive(Default)]
pub struct WsTransport {
    sink: Mutex<Option<SplitSink<WsStream, Message>>>,
    stream: Mutex<Option<SplitStream<WsStream>>>,
    connected: AtomicBool,
}

impl WsTransport {
    /// Create an unconnected transport.
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &str) -> Result<(), TransportError> {
        let (ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let (sink, stream) = ws.split();
        *self.sink.lock().await = Some(sink);
        *self.stream.lock().await = Some(stream);
        self.connected.store(true, Ordering::SeqCst);
        info!(url, "websocket connected");
        Ok(())
    }

    async fn send(&self, text: &str) -> Result<(), TransportError> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(TransportError::NotConnected)?;
        sink.send(Message::text(text.to_owned()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&self) -> Result<String, TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(TransportError::NotConnected)?;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "websocket closed by server");
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ConnectionClosed);
                }
                Some(Ok(Message::Binary(bytes))) => {
                    debug!(len = bytes.len(), "ignoring binary message");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                None => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ConnectionClosed);
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        self.stream.lock().await.take();
        if let Some(mut sink) = self.sink.lock().await.take() {
            sink.close()
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconnected_transport_refuses_io() {
        let transport = WsTransport::new();
        assert!(!transport.is_connected());
        assert!(matches!(transport.send("2").await, Err(TransportError::NotConnected)));
        assert!(matches!(transport.recv().await, Err(TransportError::NotConnected)));
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn connect_to_unreachable_host_fails() {
        let transport = WsTransport::new();
        let result = transport.connect("ws://127.0.0.1:1/socket").await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
        assert!(!transport.is_connected());
    }
}

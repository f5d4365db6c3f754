//! Mock transport for testing.
//!
//! Allows injecting server frames and capturing sent frames for
//! verification. Injected frames wait in a channel, so `recv()` blocks like
//! a real socket instead of failing when nothing is queued.

use super::{Transport, TransportError};
use async_trait::async_trait;
use goban_types::{EventFrame, Frame};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

#[derive(Debug)]
enum Incoming {
    Text(String),
    Close,
    Error(String),
}

/// Mock transport for testing.
///
/// Clones share state, so a test keeps one clone and hands the other to the
/// client.
#[derive(Debug, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    incoming_tx: mpsc::UnboundedSender<Incoming>,
    incoming_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Incoming>>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    connect_count: usize,
    connected_address: Option<String>,
    sent_frames: Vec<String>,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Mutex::new(MockTransportInner::default())),
            incoming_tx,
            incoming_rx: Arc::new(tokio::sync::Mutex::new(incoming_rx)),
        }
    }

    fn inner(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a raw frame to be returned by `recv()`.
    pub fn push_frame(&self, text: &str) {
        let _ = self.incoming_tx.send(Incoming::Text(text.to_string()));
    }

    /// Queue an event frame.
    pub fn push_event(&self, name: &str, payload: Value) {
        self.push_frame(&Frame::event(name, payload).encode());
    }

    /// Queue the server side of a successful handshake (open + confirm).
    pub fn push_handshake(&self) {
        self.push_frame(r#"0{"sid":"mock","pingInterval":25000,"pingTimeout":20000}"#);
        self.push_frame(r#"40{"sid":"mock-ns"}"#);
    }

    /// Simulate the server closing the socket.
    pub fn server_close(&self) {
        let _ = self.incoming_tx.send(Incoming::Close);
    }

    /// Make a pending or future `recv()` fail with the given error.
    pub fn fail_next_recv(&self, error: &str) {
        let _ = self.incoming_tx.send(Incoming::Error(error.to_string()));
    }

    /// Get all frames that were sent.
    pub fn sent_frames(&self) -> Vec<String> {
        self.inner().sent_frames.clone()
    }

    /// Sent frames that decode as events.
    pub fn sent_events(&self) -> Vec<EventFrame> {
        self.sent_frames()
            .iter()
            .filter_map(|text| match Frame::parse(text) {
                Ok(Frame::Event(event)) => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Sent events with the given name.
    pub fn sent_named(&self, name: &str) -> Vec<EventFrame> {
        self.sent_events().into_iter().filter(|e| e.name == name).collect()
    }

    /// Get the last frame that was sent.
    pub fn last_sent(&self) -> Option<String> {
        self.inner().sent_frames.last().cloned()
    }

    /// Forget the frames sent so far.
    pub fn clear_sent(&self) {
        self.inner().sent_frames.clear();
    }

    /// Number of successful `connect()` calls.
    pub fn connect_count(&self) -> usize {
        self.inner().connect_count
    }

    /// Get the address that was connected to.
    pub fn connected_address(&self) -> Option<String> {
        self.inner().connected_address.clone()
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        self.inner().fail_next_connect = Some(error.to_string());
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.inner().fail_next_send = Some(error.to_string());
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, url: &str) -> Result<(), TransportError> {
        let mut inner = self.inner();

        // Check for forced failure
        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }

        inner.connected = true;
        inner.connect_count += 1;
        inner.connected_address = Some(url.to_string());
        Ok(())
    }

    async fn send(&self, text: &str) -> Result<(), TransportError> {
        let mut inner = self.inner();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_frames.push(text.to_string());
        Ok(())
    }

    async fn recv(&self) -> Result<String, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let mut rx = self.incoming_rx.lock().await;
        match rx.recv().await {
            Some(Incoming::Text(text)) => Ok(text),
            Some(Incoming::Close) | None => {
                self.inner().connected = false;
                Err(TransportError::ConnectionClosed)
            }
            Some(Incoming::Error(error)) => Err(TransportError::ReceiveFailed(error)),
        }
    }

    fn is_connected(&self) -> bool {
        self.inner().connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner().connected = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ===========================================
    // MockTransport Basic Tests
    // ===========================================

    #[tokio::test]
    async fn mock_transport_connects() {
        let transport = MockTransport::new();
        assert!(!transport.is_connected());

        transport.connect("ws://test").await.unwrap();

        assert!(transport.is_connected());
        assert_eq!(transport.connected_address(), Some("ws://test".to_string()));
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn mock_transport_records_sent_frames() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();

        transport.send("40").await.unwrap();
        transport.send(r#"42["net/ping",{"client":1}]"#).await.unwrap();

        assert_eq!(transport.sent_frames().len(), 2);
        assert_eq!(transport.sent_frames()[0], "40");
        let pings = transport.sent_named("net/ping");
        assert_eq!(pings.len(), 1);
        assert_eq!(pings[0].payload, json!({"client": 1}));
    }

    #[tokio::test]
    async fn mock_transport_receives_pushed_frames_in_order() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();

        transport.push_frame("2");
        transport.push_event("net/ping", json!({"nonce": 5}));

        assert_eq!(transport.recv().await.unwrap(), "2");
        assert!(transport.recv().await.unwrap().starts_with("42[\"net/ping\""));
    }

    #[tokio::test]
    async fn mock_transport_recv_waits_for_frames() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();

        let pending = tokio::time::timeout(std::time::Duration::from_millis(10), transport.recv()).await;
        assert!(pending.is_err());

        transport.push_frame("3");
        assert_eq!(transport.recv().await.unwrap(), "3");
    }

    #[tokio::test]
    async fn server_close_disconnects() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();
        transport.server_close();

        assert!(matches!(transport.recv().await, Err(TransportError::ConnectionClosed)));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn mock_transport_closes() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();
        transport.close().await.unwrap();
        assert!(!transport.is_connected());
    }

    // ===========================================
    // Forced Failure Tests
    // ===========================================

    #[tokio::test]
    async fn send_without_connect_fails() {
        let transport = MockTransport::new();
        let result = transport.send("40").await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn fail_next_connect_works() {
        let transport = MockTransport::new();
        transport.fail_next_connect("refused");

        let result = transport.connect("ws://test").await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));

        // Second attempt succeeds
        transport.connect("ws://test").await.unwrap();
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn fail_next_send_works() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();
        transport.fail_next_send("broken pipe");

        assert!(matches!(transport.send("2").await, Err(TransportError::SendFailed(_))));
        transport.send("2").await.unwrap();
        assert_eq!(transport.sent_frames(), vec!["2".to_string()]);
    }

    #[tokio::test]
    async fn fail_next_recv_works() {
        let transport = MockTransport::new();
        transport.connect("ws://test").await.unwrap();
        transport.fail_next_recv("reset");
        assert!(matches!(transport.recv().await, Err(TransportError::ReceiveFailed(_))));
    }

    #[tokio::test]
    async fn clones_share_state() {
        let transport = MockTransport::new();
        let clone = transport.clone();
        clone.connect("ws://test").await.unwrap();
        clone.send("40").await.unwrap();
        assert!(transport.is_connected());
        assert_eq!(transport.last_sent(), Some("40".to_string()));
    }
}

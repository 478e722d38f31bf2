//! Transport seam between a session and its socket.
//!
//! A session only sees a [`Transport`] handle for sending and an ordered
//! stream of [`TransportEvent`]s. [`WebSocketConnector`] provides the real
//! implementation; tests substitute their own connector.

mod websocket;

pub use websocket::{WebSocketConnector, WebSocketTransport};

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

use crate::core::realtime::CloseEvent;

/// Errors raised by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Transport closed")]
    Closed,
}

/// Lifecycle and data signals from a transport, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection is established
    Open,
    /// A text frame arrived
    Message(String),
    /// A binary frame arrived
    Binary(Bytes),
    /// The connection ended. Always the last event.
    Close(CloseEvent),
    /// The connection failed. A `Close` follows.
    Error(String),
}

/// Receiving half of a transport's event stream.
pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// A bidirectional message channel.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a text frame.
    async fn send_text(&self, text: String) -> Result<(), TransportError>;

    /// Send a binary frame.
    async fn send_binary(&self, data: Bytes) -> Result<(), TransportError>;

    /// Request shutdown. The `Close` event follows once the connection ends.
    async fn close(&self) -> Result<(), TransportError>;

    /// Whether the connection is open and accepting frames.
    fn is_open(&self) -> bool;
}

/// Constructs transports.
///
/// `open` returns as soon as the transport exists; connecting happens in
/// the background and is reported through the returned events.
pub trait TransportConnector: Send + Sync {
    fn open(&self, url: &str) -> Result<(Arc<dyn Transport>, TransportEvents), TransportError>;
}

/// Parse `url` and check it uses the `ws` or `wss` scheme.
pub fn validate_url(url: &str) -> Result<Url, TransportError> {
    let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        other => Err(TransportError::InvalidUrl(format!(
            "unsupported scheme '{other}' in {url}"
        ))),
    }
}

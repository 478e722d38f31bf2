//! WebSocket transport built on tokio-tungstenite.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, error, info, warn};

use super::{Transport, TransportConnector, TransportError, TransportEvent, TransportEvents};
use crate::core::realtime::CloseEvent;

/// Default time allowed for the websocket handshake.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Time to wait for the peer's close frame after sending ours.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Close code reported when the peer's close frame carried no status.
const NO_STATUS_RECEIVED: u16 = 1005;

enum Outbound {
    Text(String),
    Binary(Bytes),
    Close,
}

/// Opens [`WebSocketTransport`]s.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl WebSocketConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl TransportConnector for WebSocketConnector {
    fn open(&self, url: &str) -> Result<(Arc<dyn Transport>, TransportEvents), TransportError> {
        super::validate_url(url)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::ConnectionFailed(format!("no async runtime: {e}")))?;

        // Bounded outbound channel for backpressure on audio
        let (outbound_tx, outbound_rx) = mpsc::channel::<Outbound>(32);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));

        runtime.spawn(run_connection(
            url.to_string(),
            self.connect_timeout,
            outbound_rx,
            event_tx,
            Arc::clone(&open),
        ));

        let transport = WebSocketTransport {
            outbound: outbound_tx,
            open,
            closing: AtomicBool::new(false),
        };
        Ok((Arc::new(transport), event_rx))
    }
}

/// Handle to a websocket connection driven by a background task.
pub struct WebSocketTransport {
    outbound: mpsc::Sender<Outbound>,
    open: Arc<AtomicBool>,
    closing: AtomicBool,
}

impl WebSocketTransport {
    async fn send(&self, frame: Outbound) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(frame)
            .await
            .map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.send(Outbound::Text(text)).await
    }

    async fn send_binary(&self, data: Bytes) -> Result<(), TransportError> {
        self.send(Outbound::Binary(data)).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closing.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.open.store(false, Ordering::Release);
        // A finished connection task has nothing left to close
        let _ = self.outbound.send(Outbound::Close).await;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.closing.load(Ordering::Acquire)
    }
}

async fn run_connection(
    url: String,
    connect_timeout: Duration,
    mut outbound_rx: mpsc::Receiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
    open: Arc<AtomicBool>,
) {
    let ws_stream = match timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((ws_stream, _response))) => ws_stream,
        Ok(Err(e)) => {
            error!("WebSocket connection failed: {}", e);
            let _ = events.send(TransportEvent::Error(format!("connection failed: {e}")));
            let _ = events.send(TransportEvent::Close(CloseEvent::abnormal()));
            return;
        }
        Err(_) => {
            error!(
                "WebSocket connection timed out after {}s",
                connect_timeout.as_secs()
            );
            let _ = events.send(TransportEvent::Error("connection timed out".to_string()));
            let _ = events.send(TransportEvent::Close(CloseEvent::abnormal()));
            return;
        }
    };

    info!("WebSocket connected");
    open.store(true, Ordering::Release);
    let _ = events.send(TransportEvent::Open);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();
    let mut close_deadline: Option<Instant> = None;

    let close_event = loop {
        tokio::select! {
            // Prioritize outgoing frames for lowest latency
            biased;

            frame = outbound_rx.recv(), if close_deadline.is_none() => {
                let message = match frame {
                    Some(Outbound::Text(text)) => Message::Text(text.into()),
                    Some(Outbound::Binary(data)) => Message::Binary(data),
                    Some(Outbound::Close) | None => {
                        debug!("Sending close frame");
                        open.store(false, Ordering::Release);
                        close_deadline = Some(Instant::now() + CLOSE_GRACE);
                        Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "".into(),
                        }))
                    }
                };
                if let Err(e) = ws_sink.send(message).await {
                    error!("WebSocket send failed: {}", e);
                    let _ = events.send(TransportEvent::Error(format!("send failed: {e}")));
                    break CloseEvent::abnormal();
                }
            }

            incoming = ws_stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let _ = events.send(TransportEvent::Message(text.as_str().to_string()));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        let _ = events.send(TransportEvent::Binary(data));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!("WebSocket closed by peer: {:?}", frame);
                        break match frame {
                            Some(frame) => CloseEvent::new(u16::from(frame.code), frame.reason.as_str()),
                            None => CloseEvent::new(NO_STATUS_RECEIVED, ""),
                        };
                    }
                    Some(Ok(_)) => {
                        // Ping/pong are answered by tungstenite
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        break CloseEvent::abnormal();
                    }
                    None => {
                        info!("WebSocket stream ended");
                        break CloseEvent::abnormal();
                    }
                }
            }

            _ = sleep_until(close_deadline.unwrap_or_else(Instant::now)), if close_deadline.is_some() => {
                warn!("Peer did not answer close frame within {}s", CLOSE_GRACE.as_secs());
                break CloseEvent::new(CloseEvent::NORMAL, "");
            }
        }
    };

    open.store(false, Ordering::Release);
    let _ = timeout(Duration::from_secs(1), ws_sink.close()).await;
    let _ = events.send(TransportEvent::Close(close_event));
    info!("WebSocket connection closed");
}

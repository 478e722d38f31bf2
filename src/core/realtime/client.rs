//! Realtime transcription session.
//!
//! [`RealtimeSpeechClient`] owns one logical transcription conversation and
//! at most one live transport at a time. It drives the session through
//! `STOPPED -> OPENING -> AUTHENTICATING -> RUNNING` (or `ERROR`), sends the
//! credential frame once the transport opens, and routes every inbound
//! frame to exactly one listener callback.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use speech_realtime::core::credentials::{ApiKeySigner, CredentialCache};
//! use speech_realtime::core::realtime::{RealtimeListener, RealtimeSpeechClient};
//!
//! # async fn run(listener: Arc<dyn RealtimeListener>) -> Result<(), Box<dyn std::error::Error>> {
//! let signer = ApiKeySigner::from_pem_file("ocid1.tenancy..", "ocid1.user..", "aa:bb", "key.pem")?;
//! let credentials = Arc::new(CredentialCache::new(Arc::new(signer)));
//!
//! let client = RealtimeSpeechClient::new(
//!     listener,
//!     credentials,
//!     "ocid1.compartment..",
//!     "wss://realtime.aiservice.us-phoenix-1.oci.oraclecloud.com",
//!     None,
//! );
//! client.connect().await;
//! client.send_audio_data(vec![0u8; 3200]).await;
//! client.request_final_result().await;
//! client.close().await;
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::base::{CloseEvent, OpenEvent, RealtimeError, RealtimeListener, SessionState};
use super::config::RealtimeParameters;
use super::messages::{RealtimeMessage, SendFinalResultMessage};
use crate::core::credentials::{
    CredentialCache, CredentialError, CredentialScope, RealtimeCredential,
};
use crate::core::transport::{
    Transport, TransportConnector, TransportError, TransportEvent, TransportEvents,
    WebSocketConnector,
};

/// Background credential generation started by `connect()`.
type Prewarm = JoinHandle<Result<RealtimeCredential, CredentialError>>;

// =============================================================================
// Client Handle
// =============================================================================

/// Streaming transcription session.
///
/// Cheap to clone; clones share the same session. Operations never return
/// errors. Failures are delivered to [`RealtimeListener::on_error`].
#[derive(Clone)]
pub struct RealtimeSpeechClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    listener: Arc<dyn RealtimeListener>,
    credentials: Arc<CredentialCache>,
    connector: Arc<dyn TransportConnector>,
    scope: CredentialScope,
    parameters: RealtimeParameters,
    state: RwLock<SessionState>,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    /// Incremented on every `connect`; events from older connections are dropped
    generation: AtomicU64,
}

impl fmt::Debug for RealtimeSpeechClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeSpeechClient")
            .field("endpoint", &self.inner.scope.endpoint)
            .field("compartment_id", &self.inner.scope.compartment_id)
            .field("state", &self.state())
            .finish()
    }
}

impl RealtimeSpeechClient {
    /// Create a session that connects over websockets.
    ///
    /// `parameters` defaults to [`RealtimeParameters::standard`].
    pub fn new(
        listener: Arc<dyn RealtimeListener>,
        credentials: Arc<CredentialCache>,
        compartment_id: impl Into<String>,
        endpoint: impl Into<String>,
        parameters: Option<RealtimeParameters>,
    ) -> Self {
        Self::with_connector(
            listener,
            credentials,
            compartment_id,
            endpoint,
            parameters,
            Arc::new(WebSocketConnector::new()),
        )
    }

    /// Create a session that opens its transports through `connector`.
    pub fn with_connector(
        listener: Arc<dyn RealtimeListener>,
        credentials: Arc<CredentialCache>,
        compartment_id: impl Into<String>,
        endpoint: impl Into<String>,
        parameters: Option<RealtimeParameters>,
        connector: Arc<dyn TransportConnector>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                listener,
                credentials,
                connector,
                scope: CredentialScope::new(endpoint, compartment_id),
                parameters: parameters.unwrap_or_else(RealtimeParameters::standard),
                state: RwLock::new(SessionState::Stopped),
                transport: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    /// URL the session connects to, query string included.
    pub fn url(&self) -> String {
        self.inner.parameters.build_url(&self.inner.scope.endpoint)
    }

    pub fn parameters(&self) -> &RealtimeParameters {
        &self.inner.parameters
    }

    /// Open the transport and start authenticating.
    ///
    /// Returns once the transport is constructed; the connection completes
    /// in the background. Calling this while a connection is active does
    /// nothing.
    pub async fn connect(&self) {
        let current = self.state();
        if current.is_active() {
            warn!(state = %current, "connect() called while session is active, ignoring");
            return;
        }

        let url = self.url();
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;

        let previous = self.inner.transport.lock().take();
        if let Some(previous) = previous {
            debug!("Closing transport of previous connection");
            if let Err(e) = previous.close().await {
                self.inner
                    .fail(RealtimeError::CloseFailed(e.to_string()))
                    .await;
            }
        }

        info!(%url, "Connecting realtime session");
        let (transport, events) = match self.inner.connector.open(&url) {
            Ok(opened) => opened,
            Err(e) => {
                error!("Failed to construct transport: {}", e);
                self.inner
                    .fail(RealtimeError::TransportConstructionFailed(e.to_string()))
                    .await;
                self.close().await;
                return;
            }
        };

        *self.inner.transport.lock() = Some(transport);
        self.inner.set_state(SessionState::Opening);

        // Start signing now so the credential is likely ready when the socket opens
        let credentials = Arc::clone(&self.inner.credentials);
        let scope = self.inner.scope.clone();
        let prewarm = tokio::spawn(async move { credentials.ensure_fresh(&scope).await });

        tokio::spawn(ClientInner::dispatch(
            Arc::clone(&self.inner),
            generation,
            url,
            events,
            prewarm,
        ));
    }

    /// Request transport shutdown.
    ///
    /// The session moves to `STOPPED` when the transport reports the close.
    pub async fn close(&self) {
        let transport = self.inner.current_transport();
        match transport {
            Some(transport) => {
                info!("Closing realtime session");
                if let Err(e) = transport.close().await {
                    self.inner
                        .fail(RealtimeError::CloseFailed(e.to_string()))
                        .await;
                }
            }
            None => self.inner.fail(RealtimeError::NotConnected).await,
        }
    }

    /// Ask the service for a final result covering the audio sent so far.
    pub async fn request_final_result(&self) {
        let Some(transport) = self.inner.current_transport() else {
            warn!("request_final_result() called without a transport, ignoring");
            return;
        };

        let frame = match SendFinalResultMessage::default().to_json() {
            Ok(frame) => frame,
            Err(e) => {
                self.inner.fail(RealtimeError::SendFailed(e.to_string())).await;
                return;
            }
        };

        debug!("Requesting final result");
        if let Err(e) = transport.send_text(frame).await {
            self.inner.fail(RealtimeError::SendFailed(e.to_string())).await;
        }
    }

    /// Forward an audio chunk verbatim.
    ///
    /// Audio is dropped without error unless the transport is open.
    pub async fn send_audio_data(&self, audio: impl Into<Bytes>) {
        let Some(transport) = self.inner.current_transport() else {
            debug!("No transport, dropping audio chunk");
            return;
        };
        if !transport.is_open() {
            debug!("Transport not open, dropping audio chunk");
            return;
        }

        match transport.send_binary(audio.into()).await {
            Ok(()) => {}
            Err(TransportError::Closed) => debug!("Transport closed, dropping audio chunk"),
            Err(e) => {
                self.inner.fail(RealtimeError::SendFailed(e.to_string())).await;
            }
        }
    }
}

// =============================================================================
// Event Handling
// =============================================================================

impl ClientInner {
    fn set_state(&self, state: SessionState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!(from = %previous, to = %state, "Session state changed");
        }
    }

    fn current_transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport.lock().clone()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    /// Move to `ERROR` and report `err`.
    async fn fail(&self, err: RealtimeError) {
        error!("Realtime session error: {}", err);
        self.set_state(SessionState::Error);
        self.listener.on_error(err).await;
    }

    /// Consume one connection's events in delivery order.
    async fn dispatch(
        inner: Arc<ClientInner>,
        generation: u64,
        url: String,
        mut events: TransportEvents,
        prewarm: Prewarm,
    ) {
        let mut prewarm = Some(prewarm);
        while let Some(event) = events.recv().await {
            if !inner.is_current(generation) {
                debug!("Ignoring event from superseded connection");
                break;
            }

            match event {
                TransportEvent::Open => {
                    inner.handle_open(generation, &url, prewarm.take()).await
                }
                TransportEvent::Message(text) => inner.handle_message(&text).await,
                TransportEvent::Binary(data) => {
                    debug!(len = data.len(), "Ignoring binary frame");
                }
                TransportEvent::Close(close) => {
                    inner.handle_close(close).await;
                    break;
                }
                TransportEvent::Error(message) => {
                    inner.fail(RealtimeError::Transport(message)).await;
                }
            }
        }
        debug!(generation, "Dispatch loop finished");
    }

    async fn handle_open(&self, generation: u64, url: &str, prewarm: Option<Prewarm>) {
        info!("Realtime transport open");
        self.listener
            .on_connect(OpenEvent {
                url: url.to_string(),
            })
            .await;
        self.set_state(SessionState::Authenticating);

        let credential = match self.credential_for_open(prewarm).await {
            Ok(credential) => credential,
            Err(e) => {
                self.fail(e.into()).await;
                return;
            }
        };

        if !self.is_current(generation) {
            debug!("Connection superseded while authenticating");
            return;
        }
        let Some(transport) = self.current_transport() else {
            return;
        };

        let sent = match credential.to_json() {
            Ok(frame) => transport.send_text(frame).await,
            Err(e) => Err(TransportError::SendFailed(e.to_string())),
        };

        match sent {
            Ok(()) => debug!("Credential frame sent"),
            Err(e) => {
                error!("Failed to send credential frame: {}", e);
                if let Err(close_err) = transport.close().await {
                    self.fail(RealtimeError::CloseFailed(close_err.to_string()))
                        .await;
                }
                self.set_state(SessionState::Stopped);
                self.listener
                    .on_error(RealtimeError::SendFailed(e.to_string()))
                    .await;
            }
        }
    }

    /// The connection's pre-warm result counts as its credential attempt, so
    /// a failed pre-warm is reported instead of signing a second time.
    async fn credential_for_open(
        &self,
        prewarm: Option<Prewarm>,
    ) -> Result<RealtimeCredential, CredentialError> {
        if let Some(prewarm) = prewarm {
            match prewarm.await {
                Ok(Err(e)) => return Err(e),
                Ok(Ok(_)) => {}
                Err(e) => warn!("Credential pre-warm task failed: {}", e),
            }
        }
        self.credentials.ensure_fresh(&self.scope).await
    }

    async fn handle_message(&self, text: &str) {
        let message = match RealtimeMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring malformed frame: {}", e);
                return;
            }
        };

        match message {
            RealtimeMessage::AckAudio(ack) => {
                self.listener.on_ack_audio(ack).await;
            }
            RealtimeMessage::Connect(connect) => {
                info!(session_id = ?connect.session_id, "Realtime session running");
                self.set_state(SessionState::Running);
                self.listener.on_connect_message(connect).await;
            }
            RealtimeMessage::Result(result) => {
                debug!(
                    fragments = result.transcriptions.len(),
                    is_final = result.has_final(),
                    "Received result"
                );
                self.listener.on_result(result).await;
            }
            RealtimeMessage::Error(remote) => {
                self.fail(RealtimeError::RemoteError {
                    code: remote.code,
                    message: remote.message,
                })
                .await;
            }
            RealtimeMessage::Unknown(_) => {
                debug!("Ignoring frame with unknown event");
            }
        }
    }

    async fn handle_close(&self, close: CloseEvent) {
        info!(code = close.code, reason = %close.reason, "Realtime transport closed");
        self.set_state(SessionState::Stopped);
        self.listener.on_close(close).await;
    }
}

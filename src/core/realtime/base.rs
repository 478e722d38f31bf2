//! Base traits and types for realtime transcription sessions.
//!
//! This module defines the foundational abstractions shared by the session
//! state machine and its consumers: the session state enum, the error type
//! every failure is funneled into, the transport lifecycle events, and the
//! six-callback listener trait.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use super::messages::{AckAudioMessage, ConnectMessage, ResultMessage};
use crate::core::credentials::CredentialError;

// =============================================================================
// Error Types
// =============================================================================

/// Errors delivered to [`RealtimeListener::on_error`].
///
/// Session operations never return these to the caller. Every failure is
/// routed through the listener after the state machine has been moved to
/// its terminal state.
#[derive(Debug, Clone, Error)]
pub enum RealtimeError {
    /// The transport could not be constructed for the session URL
    #[error("Transport construction failed: {0}")]
    TransportConstructionFailed(String),

    /// Sending a frame over the transport failed
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Requesting transport shutdown failed
    #[error("Close failed: {0}")]
    CloseFailed(String),

    /// The remote service sent an `ERROR` frame
    #[error("{code}: {message}")]
    RemoteError {
        /// Error code reported by the service
        code: String,
        /// Human readable message reported by the service
        message: String,
    },

    /// The authentication credential could not be produced
    #[error("Credential generation failed: {0}")]
    CredentialGenerationFailed(#[from] CredentialError),

    /// The transport signalled an error
    #[error("Transport error: {0}")]
    Transport(String),

    /// No transport exists for this session
    #[error("Not connected")]
    NotConnected,
}

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle state of a realtime session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum SessionState {
    /// No live transport. Initial state, and the state after a close.
    #[default]
    Stopped,
    /// Transport constructed, waiting for the open signal
    Opening,
    /// Transport open, credential frame being produced or sent
    Authenticating,
    /// The service acknowledged the session with a `CONNECT` frame
    Running,
    /// An error was observed
    Error,
}

impl SessionState {
    /// Whether the session has a transport that is expected to be live.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::Opening | SessionState::Authenticating | SessionState::Running
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Stopped => write!(f, "STOPPED"),
            SessionState::Opening => write!(f, "OPENING"),
            SessionState::Authenticating => write!(f, "AUTHENTICATING"),
            SessionState::Running => write!(f, "RUNNING"),
            SessionState::Error => write!(f, "ERROR"),
        }
    }
}

// =============================================================================
// Transport Lifecycle Events
// =============================================================================

/// Passed to [`RealtimeListener::on_connect`] when the transport opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenEvent {
    /// Full URL the transport connected to, query string included
    pub url: String,
}

/// Passed to [`RealtimeListener::on_close`] when the transport closes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CloseEvent {
    /// Websocket close code (1006 when the connection dropped abnormally)
    pub code: u16,
    /// Close reason sent by the peer, empty if none
    pub reason: String,
}

impl CloseEvent {
    /// Close code used when the peer went away without a close frame.
    pub const ABNORMAL: u16 = 1006;

    /// Close code for a normal closure.
    pub const NORMAL: u16 = 1000;

    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Close event for a connection that ended without a close handshake.
    pub fn abnormal() -> Self {
        Self::new(Self::ABNORMAL, "")
    }
}

// =============================================================================
// Listener Trait
// =============================================================================

/// Consumer-supplied capability set receiving session events.
///
/// Exactly one method fires per distinguishable event. Methods are awaited
/// on the session's dispatch task, so a slow listener delays the dispatch
/// of later frames but never reorders them.
///
/// # Example
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use speech_realtime::core::realtime::{
///     AckAudioMessage, CloseEvent, ConnectMessage, OpenEvent, RealtimeError, RealtimeListener,
///     ResultMessage,
/// };
///
/// struct PrintListener;
///
/// #[async_trait]
/// impl RealtimeListener for PrintListener {
///     async fn on_close(&self, event: CloseEvent) {
///         println!("closed: {}", event.code);
///     }
///     async fn on_connect(&self, _event: OpenEvent) {}
///     async fn on_error(&self, error: RealtimeError) {
///         eprintln!("error: {error}");
///     }
///     async fn on_connect_message(&self, message: ConnectMessage) {
///         println!("session {:?}", message.session_id);
///     }
///     async fn on_result(&self, message: ResultMessage) {
///         for t in message.transcriptions {
///             println!("{} (final: {})", t.transcription, t.is_final);
///         }
///     }
///     async fn on_ack_audio(&self, _message: AckAudioMessage) {}
/// }
/// ```
#[async_trait]
pub trait RealtimeListener: Send + Sync {
    /// The transport closed.
    async fn on_close(&self, event: CloseEvent);

    /// The transport opened. Fired before authentication starts.
    async fn on_connect(&self, event: OpenEvent);

    /// Any failure observed by the session.
    async fn on_error(&self, error: RealtimeError);

    /// The service accepted the credential and started the session.
    async fn on_connect_message(&self, message: ConnectMessage);

    /// Transcription results arrived.
    async fn on_result(&self, message: ResultMessage);

    /// The service acknowledged an audio chunk.
    async fn on_ack_audio(&self, message: AckAudioMessage);
}

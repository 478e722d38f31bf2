//! Realtime speech transcription sessions.
//!
//! This module provides a streaming client for the realtime transcription
//! service with support for:
//!
//! - Binary audio streaming (raw bytes, no encoding overhead)
//! - Partial and final transcripts with token-level timing
//! - Audio chunk acknowledgements
//! - On-demand final results for buffered audio
//! - Custom vocabularies
//!
//! # Architecture
//!
//! - [`config`]: Session parameters and the query-string builder
//! - [`messages`]: WebSocket message types for the protocol
//! - [`client`]: The session state machine, `RealtimeSpeechClient`
//!
//! # Session Lifecycle
//!
//! | State | Entered when |
//! |-------|--------------|
//! | `STOPPED` | Initially, and whenever the transport closes |
//! | `OPENING` | `connect()` constructed the transport |
//! | `AUTHENTICATING` | The transport opened; the credential frame is being sent |
//! | `RUNNING` | The service answered with `CONNECT` |
//! | `ERROR` | Any failure was reported to the listener |
//!
//! Every failure is delivered to [`RealtimeListener::on_error`]; session
//! operations never return errors.

mod base;
pub mod client;
pub mod config;
pub mod messages;


// Re-export public types
pub use base::{CloseEvent, OpenEvent, RealtimeError, RealtimeListener, SessionState};
pub use client::RealtimeSpeechClient;
pub use config::{
    CustomizationInference, ModelDomain, Punctuation, RealtimeParameters, StabilizePartialResults,
    TRANSCRIBE_STREAM_PATH,
};
pub use messages::{
    AckAudioDetails, AckAudioMessage, ConnectMessage, ErrorMessage, RealtimeMessage,
    ResultMessage, SendFinalResultMessage, Transcription, TranscriptionToken,
};

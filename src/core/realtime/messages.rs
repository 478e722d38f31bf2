//! WebSocket message types for the realtime transcription protocol.
//!
//! - **Incoming messages**: JSON text frames discriminated by `event`
//!   - [`ConnectMessage`]: Session accepted (`CONNECT`)
//!   - [`ResultMessage`]: Transcription results (`RESULT`)
//!   - [`AckAudioMessage`]: Audio chunk acknowledgement (`ACKAUDIO`)
//!   - [`ErrorMessage`]: Error notice (`ERROR`)
//!
//! - **Outgoing messages**
//!   - Binary audio data (sent directly, no JSON wrapper)
//!   - The credential frame (see [`crate::core::credentials::RealtimeCredential`])
//!   - [`SendFinalResultMessage`]: Request a final result for buffered audio

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Event Discriminants
// =============================================================================

pub const EVENT_CONNECT: &str = "CONNECT";
pub const EVENT_RESULT: &str = "RESULT";
pub const EVENT_ACK_AUDIO: &str = "ACKAUDIO";
pub const EVENT_ERROR: &str = "ERROR";
pub const EVENT_SEND_FINAL_RESULT: &str = "SENDFINALRESULT";

// =============================================================================
// Incoming Messages (Server to Client)
// =============================================================================

/// Sent by the service once the credential frame has been accepted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectMessage {
    /// Identifier the service assigned to this session
    pub session_id: Option<String>,
}

/// A single token of a transcription.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptionToken {
    pub token: String,
    pub start_time_in_ms: i64,
    pub end_time_in_ms: i64,
    pub confidence: f64,
    /// Token kind, e.g. `WORD` or `PUNCTUATION`
    #[serde(rename = "type")]
    pub token_type: Option<String>,
}

/// A transcript fragment for one span of audio.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transcription {
    /// Transcribed text
    pub transcription: String,
    /// `false` for interim results that may still be revised
    pub is_final: bool,
    pub start_time_in_ms: i64,
    pub end_time_in_ms: i64,
    /// Confidence score (0.0 to 1.0)
    pub confidence: f64,
    pub trace: Option<String>,
    pub tokens: Vec<TranscriptionToken>,
}

/// Transcription results, in the order the service produced them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResultMessage {
    pub session_id: Option<String>,
    pub transcriptions: Vec<Transcription>,
}

impl ResultMessage {
    /// Whether any fragment in this message is final.
    #[inline]
    pub fn has_final(&self) -> bool {
        self.transcriptions.iter().any(|t| t.is_final)
    }
}

/// Position of an acknowledged audio chunk in the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AckAudioDetails {
    pub sequence_number: Option<u64>,
    /// Chunk length in bytes
    pub length: Option<u64>,
    /// Byte offset of the chunk
    pub offset: Option<u64>,
}

/// Sent for every audio chunk when acknowledgements are enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AckAudioMessage {
    pub session_id: Option<String>,
    pub details: Option<AckAudioDetails>,
}

/// Error notice sent by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorMessage {
    pub session_id: Option<String>,
    /// Error code. The service sends either a string or a number.
    #[serde(deserialize_with = "deserialize_code")]
    pub code: String,
    /// Human readable description
    pub message: String,
}

fn deserialize_code<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(code)) => code,
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}

// =============================================================================
// Outgoing Messages (Client to Server)
// =============================================================================

/// Asks the service to emit a final result for the audio buffered so far.
#[derive(Debug, Clone, Serialize)]
pub struct SendFinalResultMessage {
    event: &'static str,
}

impl Default for SendFinalResultMessage {
    fn default() -> Self {
        Self {
            event: EVENT_SEND_FINAL_RESULT,
        }
    }
}

impl SendFinalResultMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Message Enum
// =============================================================================

/// All inbound message types.
///
/// Use [`RealtimeMessage::parse`] to decode a text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeMessage {
    Connect(ConnectMessage),
    Result(ResultMessage),
    AckAudio(AckAudioMessage),
    Error(ErrorMessage),
    /// Frame without a known `event` (for forward compatibility)
    Unknown(String),
}

impl RealtimeMessage {
    /// Parse a text frame.
    ///
    /// Reads the `event` discriminant first, then decodes the matching
    /// payload. A frame with an unknown or absent discriminant parses as
    /// [`RealtimeMessage::Unknown`]; only malformed JSON is an error.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct EventPeek {
            #[serde(default)]
            event: Option<String>,
        }

        let peek: EventPeek = serde_json::from_str(text)?;

        match peek.event.as_deref() {
            Some(EVENT_CONNECT) => Ok(RealtimeMessage::Connect(serde_json::from_str(text)?)),
            Some(EVENT_RESULT) => Ok(RealtimeMessage::Result(serde_json::from_str(text)?)),
            Some(EVENT_ACK_AUDIO) => Ok(RealtimeMessage::AckAudio(serde_json::from_str(text)?)),
            Some(EVENT_ERROR) => Ok(RealtimeMessage::Error(serde_json::from_str(text)?)),
            _ => Ok(RealtimeMessage::Unknown(text.to_string())),
        }
    }

    /// The `event` name of this message, if known.
    pub fn event(&self) -> Option<&'static str> {
        match self {
            RealtimeMessage::Connect(_) => Some(EVENT_CONNECT),
            RealtimeMessage::Result(_) => Some(EVENT_RESULT),
            RealtimeMessage::AckAudio(_) => Some(EVENT_ACK_AUDIO),
            RealtimeMessage::Error(_) => Some(EVENT_ERROR),
            RealtimeMessage::Unknown(_) => None,
        }
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, RealtimeMessage::Error(_))
    }
}

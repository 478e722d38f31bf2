//! Realtime session parameters.
//!
//! This module defines the tuning options sent to the transcription service
//! as query parameters of the websocket URL, and the deterministic builder
//! that turns them into a query string.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

// =============================================================================
// Constants
// =============================================================================

/// Path appended to the service endpoint for streaming transcription.
pub const TRANSCRIBE_STREAM_PATH: &str = "/ws/transcribe/stream";

/// Model type the service selects when none is given. Never sent.
pub const DEFAULT_MODEL_TYPE: &str = "ORACLE";

/// Encoding used by [`RealtimeParameters::standard`].
pub const DEFAULT_ENCODING: &str = "audio/raw;rate=16000";

/// Language used by [`RealtimeParameters::standard`].
pub const DEFAULT_LANGUAGE_CODE: &str = "en-US";

// =============================================================================
// Enumerated Options
// =============================================================================

/// How aggressively partial results are stabilized before being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StabilizePartialResults {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl StabilizePartialResults {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

/// Domain the recognition model is tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModelDomain {
    #[default]
    Generic,
    Medical,
}

impl ModelDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "GENERIC",
            Self::Medical => "MEDICAL",
        }
    }
}

/// Punctuation mode applied to transcripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Punctuation {
    /// Server default. Never sent.
    #[default]
    None,
    /// Punctuation spoken as words is converted to symbols
    Spoken,
    /// Punctuation is inferred
    Auto,
}

impl Punctuation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Spoken => "SPOKEN",
            Self::Auto => "AUTO",
        }
    }
}

/// Reference to a custom vocabulary applied during recognition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationInference {
    /// Identifier of the customization resource
    pub customization_id: String,
    /// Compartment owning the customization, if different from the session's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compartment_id: Option<String>,
    /// Alias the customization is referenced by
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customization_alias: Option<String>,
}

impl CustomizationInference {
    pub fn new(customization_id: impl Into<String>) -> Self {
        Self {
            customization_id: customization_id.into(),
            compartment_id: None,
            customization_alias: None,
        }
    }
}

// =============================================================================
// Realtime Parameters
// =============================================================================

/// Flat bag of session tuning options.
///
/// Every field is optional. Only fields that are set end up in the query
/// string, in a fixed order, so two equal parameter bags always produce the
/// same URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeParameters {
    /// Ask the service to acknowledge every audio chunk
    pub is_ack_enabled: Option<bool>,
    /// Audio encoding, e.g. `audio/raw;rate=16000`
    pub encoding: Option<String>,
    /// Ignore invalid customizations instead of failing the session
    pub should_ignore_invalid_customizations: Option<bool>,
    /// Silence after which a partial result is emitted
    pub partial_silence_threshold_in_ms: Option<u32>,
    /// Silence after which a final result is emitted
    pub final_silence_threshold_in_ms: Option<u32>,
    pub stabilize_partial_results: Option<StabilizePartialResults>,
    /// BCP-47 language code, e.g. `en-US`
    pub language_code: Option<String>,
    pub model_domain: Option<ModelDomain>,
    /// Recognition model family. `ORACLE` is the server default and is never sent.
    pub model_type: Option<String>,
    /// Punctuation mode. `NONE` is the server default and is never sent.
    pub punctuation: Option<Punctuation>,
    /// Custom vocabularies. Sent only when non-empty.
    pub customizations: Option<Vec<CustomizationInference>>,
}

impl RealtimeParameters {
    /// Parameters used when a session is created without any.
    pub fn standard() -> Self {
        Self {
            is_ack_enabled: Some(false),
            encoding: Some(DEFAULT_ENCODING.to_string()),
            should_ignore_invalid_customizations: Some(false),
            partial_silence_threshold_in_ms: None,
            final_silence_threshold_in_ms: None,
            stabilize_partial_results: Some(StabilizePartialResults::None),
            language_code: Some(DEFAULT_LANGUAGE_CODE.to_string()),
            model_domain: Some(ModelDomain::Generic),
            model_type: Some(DEFAULT_MODEL_TYPE.to_string()),
            punctuation: Some(Punctuation::None),
            customizations: None,
        }
    }

    /// Build the `key=value&...` query string, without the leading `?`.
    ///
    /// Values are written verbatim except the customization list, which is
    /// serialized to JSON and percent-encoded.
    pub fn to_query_string(&self) -> String {
        let mut params: Vec<String> = Vec::new();

        if let Some(ack) = self.is_ack_enabled {
            params.push(format!("isAckEnabled={ack}"));
        }
        if let Some(ref encoding) = self.encoding {
            params.push(format!("encoding={encoding}"));
        }
        if let Some(ignore) = self.should_ignore_invalid_customizations {
            params.push(format!("shouldIgnoreInvalidCustomizations={ignore}"));
        }
        if let Some(ms) = self.partial_silence_threshold_in_ms {
            params.push(format!("partialSilenceThresholdInMs={ms}"));
        }
        if let Some(ms) = self.final_silence_threshold_in_ms {
            params.push(format!("finalSilenceThresholdInMs={ms}"));
        }
        if let Some(stabilize) = self.stabilize_partial_results {
            params.push(format!("stabilizePartialResults={}", stabilize.as_str()));
        }
        if let Some(ref language) = self.language_code {
            params.push(format!("languageCode={language}"));
        }
        if let Some(domain) = self.model_domain {
            params.push(format!("modelDomain={}", domain.as_str()));
        }
        if let Some(ref model_type) = self.model_type {
            if model_type != DEFAULT_MODEL_TYPE {
                params.push(format!("modelType={model_type}"));
            }
        }
        if let Some(punctuation) = self.punctuation {
            if punctuation != Punctuation::None {
                params.push(format!("punctuation={}", punctuation.as_str()));
            }
        }
        if let Some(ref customizations) = self.customizations {
            if !customizations.is_empty() {
                // Plain structs of strings always serialize
                let json = serde_json::to_string(customizations).unwrap_or_default();
                params.push(format!("customizations={}", encode_component(&json)));
            }
        }

        params.join("&")
    }

    /// Build the full session URL for `endpoint`.
    ///
    /// A trailing `/` on the endpoint is dropped, and the `?` is omitted when
    /// no parameter is set.
    pub fn build_url(&self, endpoint: &str) -> String {
        let base = format!("{}{}", endpoint.trim_end_matches('/'), TRANSCRIBE_STREAM_PATH);
        let query = self.to_query_string();
        if query.is_empty() {
            base
        } else {
            format!("{base}?{query}")
        }
    }
}

/// Percent-encode a query component, leaving the same characters
/// unescaped as a browser's `encodeURIComponent`.
///
/// `byte_serialize` yields runs of unescaped text, `+` for a space, or one
/// `%XX` escape per byte, so each piece can be rewritten on its own.
fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .map(|piece| match piece {
            "+" => "%20",
            "%21" => "!",
            "%27" => "'",
            "%28" => "(",
            "%29" => ")",
            "%7E" => "~",
            other => other,
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

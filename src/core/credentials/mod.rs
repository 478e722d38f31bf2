//! Credentials for authenticating realtime sessions.
//!
//! A session authenticates by sending a signed-request credential as its
//! first frame. Producing one means signing an HTTP `GET` against the
//! service endpoint, which is worth sharing between sessions opened close
//! together, so credentials are produced and cached by a
//! [`CredentialCache`] that callers share via `Arc`.
//!
//! The identity provider is pluggable through [`RequestSigner`];
//! [`ApiKeySigner`] signs with an API key read from a PEM file.

mod cache;
mod signer;

pub use cache::{CredentialCache, CredentialState, DEFAULT_FRESHNESS};
pub use signer::{ApiKeySigner, RequestSigner, SignedHeaders};

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::SystemTime;
use thiserror::Error;
use url::Url;

/// Authentication kind sent in the credential frame.
pub const AUTHENTICATION_TYPE: &str = "CREDENTIALS";

/// Errors raised while producing a credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// The endpoint cannot be turned into a request URI
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The signer failed to sign the request
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// The signing key could not be loaded
    #[error("Key load failed: {0}")]
    KeyLoad(String),

    /// The generation task ended without producing a result
    #[error("Credential generation aborted: {0}")]
    GenerationAborted(String),
}

/// What a credential is produced for.
///
/// A cached credential is only reused for the same endpoint and compartment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialScope {
    /// Service endpoint, e.g. `wss://realtime.aiservice.us-phoenix-1.oci.oraclecloud.com`
    pub endpoint: String,
    /// Compartment the session is billed to
    pub compartment_id: String,
}

impl CredentialScope {
    pub fn new(endpoint: impl Into<String>, compartment_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            compartment_id: compartment_id.into(),
        }
    }

    /// Parse the endpoint into the URI to sign and its `host[:port]`.
    ///
    /// The URI is `<scheme>://<host[:port]><path>`; any query or fragment
    /// on the endpoint is dropped.
    pub fn request_target(&self) -> Result<(String, String), CredentialError> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| CredentialError::InvalidEndpoint(format!("{}: {e}", self.endpoint)))?;

        let host = url
            .host_str()
            .ok_or_else(|| CredentialError::InvalidEndpoint(format!("{}: no host", self.endpoint)))?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let uri = format!("{}://{}{}", url.scheme(), host, url.path());

        Ok((uri, host))
    }
}

/// Signed-request payload sent as the first frame of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeCredential {
    /// Always [`AUTHENTICATION_TYPE`]
    pub authentication_type: String,
    pub compartment_id: String,
    /// Signed request headers plus `host` and `uri`, sorted by name
    pub headers: BTreeMap<String, String>,
    #[serde(skip)]
    pub created_at: SystemTime,
    #[serde(skip)]
    pub(crate) endpoint: String,
}

impl RealtimeCredential {
    pub fn scope(&self) -> CredentialScope {
        CredentialScope::new(self.endpoint.clone(), self.compartment_id.clone())
    }

    /// Serialize to the credential frame sent over the transport.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

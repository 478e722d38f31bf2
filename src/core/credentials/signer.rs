//! Request signing.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::debug;
use zeroize::Zeroizing;

use super::CredentialError;

/// Header name to value, sorted by name.
pub type SignedHeaders = BTreeMap<String, String>;

/// Identity provider capable of signing an HTTP request.
///
/// Implementations return the headers that authenticate the request. The
/// request is a `GET` with no body whose URI is the service endpoint.
#[async_trait]
pub trait RequestSigner: Send + Sync {
    async fn sign(&self, request: &http::Request<()>) -> Result<SignedHeaders, CredentialError>;
}

/// Headers covered by the signature, in signing order.
const SIGNED_HEADER_NAMES: &str = "date (request-target) host";

/// Signs requests with an API key using the HTTP-signature scheme
/// (`rsa-sha256` over `date`, `(request-target)` and `host`).
#[derive(Clone)]
pub struct ApiKeySigner {
    key_id: String,
    key: EncodingKey,
}

impl fmt::Debug for ApiKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeySigner")
            .field("key_id", &self.key_id)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl ApiKeySigner {
    /// Build a signer from an RSA private key in PEM form (PKCS#1 or PKCS#8).
    pub fn new(
        tenancy_id: &str,
        user_id: &str,
        fingerprint: &str,
        private_key_pem: &[u8],
    ) -> Result<Self, CredentialError> {
        let key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| CredentialError::KeyLoad(e.to_string()))?;

        Ok(Self {
            key_id: format!("{tenancy_id}/{user_id}/{fingerprint}"),
            key,
        })
    }

    /// Build a signer from a PEM file. The file contents are wiped from
    /// memory once the key is parsed.
    pub fn from_pem_file(
        tenancy_id: &str,
        user_id: &str,
        fingerprint: &str,
        path: impl AsRef<Path>,
    ) -> Result<Self, CredentialError> {
        let path = path.as_ref();
        let pem = Zeroizing::new(std::fs::read(path).map_err(|e| {
            CredentialError::KeyLoad(format!("{}: {e}", path.display()))
        })?);
        Self::new(tenancy_id, user_id, fingerprint, &pem)
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    fn sign_at(
        &self,
        request: &http::Request<()>,
        now: OffsetDateTime,
    ) -> Result<SignedHeaders, CredentialError> {
        let uri = request.uri();
        let host = uri
            .authority()
            .map(|a| a.as_str().to_string())
            .ok_or_else(|| CredentialError::SigningFailed(format!("no host in {uri}")))?;
        let target = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        let date = format_http_date(now)?;

        let signing_string = format!(
            "date: {date}\n(request-target): {} {target}\nhost: {host}",
            request.method().as_str().to_lowercase()
        );

        let signature = jsonwebtoken::crypto::sign(signing_string.as_bytes(), &self.key, Algorithm::RS256)
            .map_err(|e| CredentialError::SigningFailed(e.to_string()))?;
        // The JWT encoding is URL-safe without padding; the header wants standard base64
        let raw = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| CredentialError::SigningFailed(e.to_string()))?;

        let authorization = format!(
            "Signature version=\"1\",headers=\"{SIGNED_HEADER_NAMES}\",keyId=\"{}\",algorithm=\"rsa-sha256\",signature=\"{}\"",
            self.key_id,
            STANDARD.encode(raw)
        );

        debug!(key_id = %self.key_id, %host, "Signed credential request");

        let mut headers = SignedHeaders::new();
        headers.insert("date".to_string(), date);
        headers.insert("authorization".to_string(), authorization);
        Ok(headers)
    }
}

#[async_trait]
impl RequestSigner for ApiKeySigner {
    async fn sign(&self, request: &http::Request<()>) -> Result<SignedHeaders, CredentialError> {
        self.sign_at(request, OffsetDateTime::now_utc())
    }
}

/// RFC 7231 `IMF-fixdate`, e.g. `Thu, 01 Jan 2026 00:00:00 GMT`.
fn format_http_date(now: OffsetDateTime) -> Result<String, CredentialError> {
    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    now.to_offset(time::UtcOffset::UTC)
        .format(&format)
        .map_err(|e| CredentialError::SigningFailed(e.to_string()))
}

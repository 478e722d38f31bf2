//! Configuration for the bundled command-line client
//!
//! Configuration comes from .env files, YAML files, and environment variables.
//! Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Example
//! ```rust,no_run
//! use speech_realtime::config::ClientConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ClientConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config = ClientConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Connecting to {}", config.endpoint()?);
//! # Ok(())
//! # }
//! ```

use std::env;
use std::path::PathBuf;

mod yaml;

pub use yaml::{IdentityYaml, ServiceYaml, YamlConfig};

use crate::core::credentials::ApiKeySigner;
use crate::core::realtime::RealtimeParameters;

pub const ENV_REGION: &str = "REALTIME_REGION";
pub const ENV_ENDPOINT: &str = "REALTIME_ENDPOINT";
pub const ENV_COMPARTMENT_ID: &str = "REALTIME_COMPARTMENT_ID";
pub const ENV_TENANCY_ID: &str = "OCI_TENANCY_ID";
pub const ENV_USER_ID: &str = "OCI_USER_ID";
pub const ENV_FINGERPRINT: &str = "OCI_FINGERPRINT";
pub const ENV_PRIVATE_KEY_PATH: &str = "OCI_PRIVATE_KEY_PATH";

/// Client configuration
///
/// Where the service lives, which compartment sessions are billed to, the
/// API key identity used to sign credentials, and the session parameters.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub region: Option<String>,
    /// Explicit endpoint. Takes precedence over `region`.
    pub endpoint: Option<String>,
    pub compartment_id: Option<String>,

    // API key identity
    pub tenancy_id: Option<String>,
    pub user_id: Option<String>,
    pub fingerprint: Option<String>,
    pub private_key_path: Option<PathBuf>,

    pub parameters: RealtimeParameters,
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// The .env file is loaded by `main` before this is called, so actual
    /// environment variables override .env values. Session parameters start
    /// from [`RealtimeParameters::standard`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            region: env_var(ENV_REGION),
            endpoint: env_var(ENV_ENDPOINT),
            compartment_id: env_var(ENV_COMPARTMENT_ID),
            tenancy_id: env_var(ENV_TENANCY_ID),
            user_id: env_var(ENV_USER_ID),
            fingerprint: env_var(ENV_FINGERPRINT),
            private_key_path: env_var(ENV_PRIVATE_KEY_PATH).map(|p| expand_home(&p)),
            parameters: RealtimeParameters::standard(),
        })
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// Session parameters set in YAML override the defaults one by one.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = YamlConfig::from_file(path)?;
        let mut config = Self::from_env()?;
        config.apply_yaml(yaml_config);
        Ok(config)
    }

    fn apply_yaml(&mut self, yaml: YamlConfig) {
        if let Some(service) = yaml.service {
            if service.region.is_some() {
                self.region = service.region;
            }
            if service.endpoint.is_some() {
                self.endpoint = service.endpoint;
            }
            if service.compartment_id.is_some() {
                self.compartment_id = service.compartment_id;
            }
        }

        if let Some(identity) = yaml.identity {
            if identity.tenancy_id.is_some() {
                self.tenancy_id = identity.tenancy_id;
            }
            if identity.user_id.is_some() {
                self.user_id = identity.user_id;
            }
            if identity.fingerprint.is_some() {
                self.fingerprint = identity.fingerprint;
            }
            if let Some(path) = identity.private_key_path {
                self.private_key_path = Some(expand_home(&path));
            }
        }

        if let Some(parameters) = yaml.parameters {
            overlay_parameters(&mut self.parameters, parameters);
        }
    }

    /// Resolve the service endpoint
    ///
    /// An explicit endpoint wins; otherwise it is derived from the region.
    pub fn endpoint(&self) -> Result<String, String> {
        if let Some(endpoint) = &self.endpoint {
            return Ok(endpoint.clone());
        }
        match &self.region {
            Some(region) => Ok(format!("wss://realtime.aiservice.{region}.oci.oraclecloud.com")),
            None => Err(format!(
                "Either {ENV_ENDPOINT} or {ENV_REGION} must be set"
            )),
        }
    }

    /// Check that a session can be created from this configuration
    pub fn validate(&self) -> Result<(), String> {
        match &self.compartment_id {
            Some(id) if !id.trim().is_empty() => {}
            _ => return Err(format!("{ENV_COMPARTMENT_ID} is required")),
        }
        self.endpoint()?;
        Ok(())
    }

    /// Build the API key signer from the identity settings
    pub fn signer(&self) -> Result<ApiKeySigner, Box<dyn std::error::Error>> {
        let tenancy_id = required(&self.tenancy_id, ENV_TENANCY_ID)?;
        let user_id = required(&self.user_id, ENV_USER_ID)?;
        let fingerprint = required(&self.fingerprint, ENV_FINGERPRINT)?;
        let key_path = self
            .private_key_path
            .as_ref()
            .ok_or_else(|| format!("{ENV_PRIVATE_KEY_PATH} is required"))?;

        Ok(ApiKeySigner::from_pem_file(
            tenancy_id,
            user_id,
            fingerprint,
            key_path,
        )?)
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, String> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| format!("{name} is required"))
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), env::var("HOME")) {
        (Some(rest), Ok(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

fn overlay_parameters(base: &mut RealtimeParameters, over: RealtimeParameters) {
    if over.is_ack_enabled.is_some() {
        base.is_ack_enabled = over.is_ack_enabled;
    }
    if over.encoding.is_some() {
        base.encoding = over.encoding;
    }
    if over.should_ignore_invalid_customizations.is_some() {
        base.should_ignore_invalid_customizations = over.should_ignore_invalid_customizations;
    }
    if over.partial_silence_threshold_in_ms.is_some() {
        base.partial_silence_threshold_in_ms = over.partial_silence_threshold_in_ms;
    }
    if over.final_silence_threshold_in_ms.is_some() {
        base.final_silence_threshold_in_ms = over.final_silence_threshold_in_ms;
    }
    if over.stabilize_partial_results.is_some() {
        base.stabilize_partial_results = over.stabilize_partial_results;
    }
    if over.language_code.is_some() {
        base.language_code = over.language_code;
    }
    if over.model_domain.is_some() {
        base.model_domain = over.model_domain;
    }
    if over.model_type.is_some() {
        base.model_type = over.model_type;
    }
    if over.punctuation.is_some() {
        base.punctuation = over.punctuation;
    }
    if over.customizations.is_some() {
        base.customizations = over.customizations;
    }
}

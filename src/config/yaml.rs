use serde::Deserialize;
use std::path::PathBuf;

use crate::core::realtime::RealtimeParameters;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present
/// here override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// service:
///   region: "us-phoenix-1"
///   endpoint: "wss://realtime.aiservice.us-phoenix-1.oci.oraclecloud.com"
///   compartment_id: "ocid1.compartment.oc1..example"
///
/// identity:
///   tenancy_id: "ocid1.tenancy.oc1..example"
///   user_id: "ocid1.user.oc1..example"
///   fingerprint: "12:34:56:78:90:ab:cd:ef"
///   private_key_path: "~/.oci/oci_api_key.pem"
///
/// parameters:
///   isAckEnabled: false
///   encoding: "audio/raw;rate=16000"
///   languageCode: "en-US"
///   partialSilenceThresholdInMs: 0
///   finalSilenceThresholdInMs: 2000
///   punctuation: AUTO
///   customizations:
///     - customizationId: "ocid1.aispeechcustomization.oc1..example"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub service: Option<ServiceYaml>,
    pub identity: Option<IdentityYaml>,
    /// Session parameters, using the service's camelCase names
    pub parameters: Option<RealtimeParameters>,
}

/// Service location from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServiceYaml {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub compartment_id: Option<String>,
}

/// API key identity from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct IdentityYaml {
    pub tenancy_id: Option<String>,
    pub user_id: Option<String>,
    pub fingerprint: Option<String>,
    pub private_key_path: Option<String>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

//! Venue and signer configuration sections.

use std::path::PathBuf;

use oracle_core::Network;
use serde::{Deserialize, Serialize};

use crate::signer::KeySource;

/// Venue endpoint and action target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Master switch. When false, cycles stop after the pipeline gates.
    #[serde(default = "default_publish_enabled")]
    pub publish_enabled: bool,
    /// Venue REST base URL. Defaults per network when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Action endpoint path appended to `base_url`.
    #[serde(default = "default_action_path")]
    pub action_path: String,
    /// HIP-3 dex name the oracle belongs to (e.g. "XAU").
    #[serde(default)]
    pub dex: String,
    /// Perp symbol priced by the oracle (e.g. "XAU-TEST").
    #[serde(default)]
    pub coin: String,
    /// Optional vault the deployer acts for.
    #[serde(default)]
    pub vault_address: Option<String>,
    /// Signature validity window; `expiresAfter = now + window` when set.
    #[serde(default)]
    pub expires_after_ms: Option<u64>,
    /// POST timeout (ms).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_publish_enabled() -> bool {
    true
}

fn default_action_path() -> String {
    "/exchange".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            publish_enabled: default_publish_enabled(),
            base_url: None,
            action_path: default_action_path(),
            dex: String::new(),
            coin: String::new(),
            vault_address: None,
            expires_after_ms: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl VenueConfig {
    /// Base URL, falling back to the public endpoint of `network`.
    pub fn resolved_base_url(&self, network: Network) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None if network.is_mainnet() => "https://api.hyperliquid.xyz".to_string(),
            None => "https://api.hyperliquid-testnet.xyz".to_string(),
        }
    }

    /// Full action endpoint URL.
    pub fn action_url(&self, network: Network) -> String {
        format!("{}{}", self.resolved_base_url(network), self.action_path)
    }
}

/// Where the signing key comes from. The key itself never lives in config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Environment variable holding the hex key.
    #[serde(default = "default_key_env")]
    pub key_env: String,
    /// Key file; takes precedence over `key_env` when set.
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    /// Address the loaded key must derive to.
    #[serde(default)]
    pub expected_address: Option<String>,
}

fn default_key_env() -> String {
    "HL_API_PRIVATE_KEY".to_string()
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            key_env: default_key_env(),
            key_file: None,
            expected_address: None,
        }
    }
}

impl SignerConfig {
    pub fn key_source(&self) -> KeySource {
        match &self.key_file {
            Some(path) => KeySource::File { path: path.clone() },
            None => KeySource::EnvVar {
                var_name: self.key_env.clone(),
            },
        }
    }
}

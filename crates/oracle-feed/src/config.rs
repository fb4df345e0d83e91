//! Feed client configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the Hermes price feed client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Hermes REST base URL (without trailing `/latest_price_feeds`).
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Feed id (hex, `0x` prefix optional).
    #[serde(default)]
    pub feed_id: String,
    /// Optional Hermes cluster parameter (e.g. "pythtest").
    #[serde(default)]
    pub cluster: Option<String>,
    /// Attempts per fetch, including the first. Default: 3.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Linear backoff base: attempt N waits `N * base` before attempt N+1.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Per-request timeout (ms).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_api_url() -> String {
    "https://hermes.pyth.network/api".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            feed_id: String::new(),
            cluster: None,
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

//! Application configuration.

use std::path::Path;

use oracle_core::{Network, PipelineParams};
use oracle_executor::{parse_address, SignerConfig, VenueConfig};
use oracle_feed::FeedConfig;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Periodic driver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Cycle interval (ms). Default: 3,000.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// How long shutdown waits for an in-flight cycle (ms). Default: 5,000.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_interval_ms() -> u64 {
    3_000
}

fn default_shutdown_grace_ms() -> u64 {
    5_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log the Prometheus text summary when the service stops.
    #[serde(default = "default_log_metrics_on_shutdown")]
    pub log_metrics_on_shutdown: bool,
}

fn default_log_metrics_on_shutdown() -> bool {
    true
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_metrics_on_shutdown: default_log_metrics_on_shutdown(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Venue network. Selects the phantom agent source and default endpoint.
    #[serde(default = "default_network")]
    pub network: Network,
    /// Required to run against mainnet.
    #[serde(default)]
    pub allow_mainnet: bool,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub pipeline: PipelineParams,
    #[serde(default)]
    pub venue: VenueConfig,
    #[serde(default)]
    pub signer: SignerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_network() -> Network {
    Network::Testnet
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            allow_mainnet: false,
            feed: FeedConfig::default(),
            pipeline: PipelineParams::default(),
            venue: VenueConfig::default(),
            signer: SignerConfig::default(),
            scheduler: SchedulerConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the service must not start with.
    pub fn validate(&self) -> AppResult<()> {
        self.pipeline
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        if self.network.is_mainnet() && !self.allow_mainnet {
            return Err(AppError::Config(
                "network = \"mainnet\" requires allow_mainnet = true".to_string(),
            ));
        }
        if self.feed.feed_id.trim().is_empty() {
            return Err(AppError::Config("feed.feed_id must be set".to_string()));
        }
        if self.feed.max_attempts == 0 {
            return Err(AppError::Config(
                "feed.max_attempts must be > 0".to_string(),
            ));
        }
        if self.scheduler.interval_ms == 0 {
            return Err(AppError::Config(
                "scheduler.interval_ms must be > 0".to_string(),
            ));
        }
        if self.venue.publish_enabled {
            let expected = self.signer.expected_address.as_deref().ok_or_else(|| {
                AppError::Config(
                    "signer.expected_address is required when publishing is enabled".to_string(),
                )
            })?;
            parse_address(expected)?;
        }
        if let Some(vault) = self.venue.vault_address.as_deref() {
            parse_address(vault)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [feed]
        feed_id = "0x44465e17d2e9d390e70c999d5a11fda4f092847fcd2e3e5aa089d96c98a30e67"

        [venue]
        publish_enabled = false
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.network, Network::Testnet);
        assert!(!config.allow_mainnet);
        assert_eq!(config.scheduler.interval_ms, 3_000);
        assert_eq!(config.scheduler.shutdown_grace_ms, 5_000);
        assert_eq!(config.pipeline.index_scale, 40.0);
        assert_eq!(config.feed.max_attempts, 3);
        assert_eq!(config.signer.key_env, "HL_API_PRIVATE_KEY");
        assert!(config.telemetry.log_metrics_on_shutdown);
    }

    #[test]
    fn test_full_config_parses() {
        let toml = r#"
            network = "testnet"

            [feed]
            api_url = "http://127.0.0.1:8080"
            feed_id = "abc"
            cluster = "pythtest"
            max_attempts = 5

            [pipeline]
            index_scale = 40.0
            stale_threshold_ms = 15000
            max_jump_fraction = 0.1
            price_change_epsilon = 0.05
            min_publish_interval_ms = 60000

            [venue]
            dex = "XAU"
            coin = "XAU-TEST"
            expires_after_ms = 30000

            [signer]
            expected_address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"

            [scheduler]
            interval_ms = 1000
        "#;
        let config = AppConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.feed.cluster.as_deref(), Some("pythtest"));
        assert_eq!(config.feed.max_attempts, 5);
        assert_eq!(config.pipeline.max_jump_fraction, 0.1);
        assert_eq!(config.venue.coin, "XAU-TEST");
        assert_eq!(config.venue.expires_after_ms, Some(30_000));
        assert_eq!(config.scheduler.interval_ms, 1_000);
    }

    #[test]
    fn test_rejects_non_positive_scale() {
        let toml = format!("{MINIMAL}\n[pipeline]\nindex_scale = 0.0\n");
        assert!(matches!(
            AppConfig::from_toml_str(&toml),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_nan_jump_fraction() {
        for value in ["nan", "inf"] {
            let toml = format!("{MINIMAL}\n[pipeline]\nmax_jump_fraction = {value}\n");
            assert!(matches!(
                AppConfig::from_toml_str(&toml),
                Err(AppError::Config(_))
            ));
        }
    }

    #[test]
    fn test_rejects_mainnet_without_opt_in() {
        let toml = format!("network = \"mainnet\"\n{MINIMAL}");
        let err = AppConfig::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("allow_mainnet"));

        let toml = format!("network = \"mainnet\"\nallow_mainnet = true\n{MINIMAL}");
        assert!(AppConfig::from_toml_str(&toml).is_ok());
    }

    #[test]
    fn test_publishing_requires_expected_address() {
        let mut config = AppConfig::from_toml_str(MINIMAL).unwrap();
        config.venue.publish_enabled = true;
        assert!(config.validate().is_err());

        config.signer.expected_address = Some("not-an-address".to_string());
        assert!(matches!(config.validate(), Err(AppError::Key(_))));

        config.signer.expected_address =
            Some("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_interval_and_attempts() {
        let mut config = AppConfig::from_toml_str(MINIMAL).unwrap();
        config.scheduler.interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::from_toml_str(MINIMAL).unwrap();
        config.feed.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::from_toml_str(MINIMAL).unwrap();
        config.feed.feed_id = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        assert!(matches!(
            AppConfig::from_file("/nonexistent/oracle.toml"),
            Err(AppError::Config(_))
        ));
    }
}

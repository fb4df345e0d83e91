//! Main application orchestration.
//!
//! Wires configuration into the feed client, the signing publisher and the
//! cycle driver, then hands the driver to the scheduler until shutdown.

use std::sync::Arc;
use std::time::Duration;

use oracle_core::{Clock, SystemClock};
use oracle_executor::{
    parse_address, ActionSigner, HttpVenueTransport, KeyManager, PublishTarget, Publisher,
};
use oracle_feed::HermesClient;
use oracle_telemetry::Metrics;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::cycle::{CycleDriver, CycleError, CycleOutcome};
use crate::error::{AppError, AppResult};
use crate::scheduler::{Scheduler, SchedulerReport};
use crate::state::StateReader;

/// Main application.
pub struct Application {
    config: AppConfig,
    driver: CycleDriver,
    shutdown: CancellationToken,
}

impl Application {
    /// Create the application with the system clock.
    ///
    /// Fails before any publish if the configuration is invalid, the key
    /// cannot be loaded, or the key does not derive the expected address.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> AppResult<Self> {
        config.validate()?;

        let source = HermesClient::with_clock(config.feed.clone(), clock.clone())?;
        let publisher = if config.venue.publish_enabled {
            Some(build_publisher(&config)?)
        } else {
            None
        };

        log_startup(&config, publisher.as_ref());

        let driver = CycleDriver::new(Arc::new(source), publisher, config.pipeline.clone(), clock);

        Ok(Self {
            config,
            driver,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Read-only handle on the publish state.
    pub fn reader(&self) -> StateReader {
        self.driver.reader()
    }

    /// Token that stops [`Self::run`] when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run cycles until Ctrl-C or the shutdown token is cancelled.
    pub async fn run(mut self) -> AppResult<SchedulerReport> {
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => {
                        info!("Shutdown signal received");
                        token.cancel();
                    }
                    Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
                },
                _ = token.cancelled() => {}
            }
        });

        let scheduler = Scheduler::new(&self.config.scheduler);
        let report = scheduler.run(&mut self.driver, self.shutdown.clone()).await;

        self.log_summary();
        Ok(report)
    }

    /// Run one cycle now, outside the scheduler.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, CycleError> {
        self.driver.execute().await
    }

    /// Run exactly one cycle, log the summary and stop.
    pub async fn run_once(mut self) -> AppResult<CycleOutcome> {
        let outcome = self.run_cycle().await;
        self.log_summary();
        Ok(outcome?)
    }

    fn log_summary(&self) {
        let state = self.driver.state();
        info!(
            total_cycles = state.total_cycles,
            total_publishes = state.total_publishes,
            total_skips = state.total_skips,
            total_failures = state.total_failures,
            last_published_value = ?state.last_published_value,
            last_error = ?state.last_error,
            "Final summary"
        );

        if self.config.telemetry.log_metrics_on_shutdown {
            match Metrics::encode_text() {
                Ok(text) => info!(metrics = %text, "Final metrics"),
                Err(e) => warn!(error = %e, "Failed to encode metrics"),
            }
        }
    }
}

/// Load and verify the key, then assemble the publisher.
fn build_publisher(config: &AppConfig) -> AppResult<Publisher> {
    let expected = config
        .signer
        .expected_address
        .as_deref()
        .ok_or_else(|| AppError::Config("signer.expected_address is not set".to_string()))?;
    let expected = parse_address(expected)?;

    let key = KeyManager::load(&config.signer.key_source(), Some(expected))?;
    info!(address = %key.address(), "Signing key loaded");

    let signer = ActionSigner::new(Arc::new(key.into_signer()), expected, config.network)?;
    let target = PublishTarget::from_config(&config.venue)?;
    let transport = HttpVenueTransport::new(
        config.venue.action_url(config.network),
        Duration::from_millis(config.venue.request_timeout_ms),
    )?;

    Ok(Publisher::new(target, signer, Arc::new(transport)))
}

fn log_startup(config: &AppConfig, publisher: Option<&Publisher>) {
    let publish = if publisher.is_some() { "ENABLED" } else { "DISABLED" };
    info!(
        network = %config.network,
        feed_id = %config.feed.feed_id,
        feed_url = %config.feed.api_url,
        index_scale = config.pipeline.index_scale,
        interval_ms = config.scheduler.interval_ms,
        publish,
        "Oracle relay configured"
    );

    if let Some(publisher) = publisher {
        let target = publisher.target();
        info!(
            dex = %target.dex,
            coin = %target.coin,
            signer = %publisher.signer().address(),
            venue_url = %config.venue.action_url(config.network),
            "Publishing setOracle"
        );
        if target.dex.trim().is_empty() || target.coin.trim().is_empty() {
            warn!("venue.dex or venue.coin is empty, cycles will be skipped");
        }
    }
}

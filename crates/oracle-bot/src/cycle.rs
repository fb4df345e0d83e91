//! One publish cycle: fetch, gate, publish, record.
//!
//! The [`CycleDriver`] owns the [`PublishState`] and the last accepted index
//! value. Every cycle either publishes, skips with a [`SkipReason`], or fails
//! with a [`CycleError`]; none of them stop the relay.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use oracle_core::{
    check_staleness, sanity_check_jump, scale_to_index, should_publish, Clock, CoreError,
    PipelineParams, NO_MATERIAL_CHANGE,
};
use oracle_executor::{PublishError, PublishReceipt, Publisher};
use oracle_feed::PriceSource;
use oracle_telemetry::Metrics;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::state::{PublishState, StateReader};

/// Why a cycle ended without publishing.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The feed spent all its attempts.
    FeedUnavailable(String),
    Stale { age_ms: i64, threshold_ms: i64 },
    /// Jump check rejected the value.
    Jump(String),
    NoMaterialChange,
    PublishingDisabled,
    /// Target dex or coin is not configured.
    NotConfigured(&'static str),
}

impl SkipReason {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::FeedUnavailable(_) => "feed_unavailable",
            Self::Stale { .. } => "stale",
            Self::Jump(_) => "jump",
            Self::NoMaterialChange => "no_change",
            Self::PublishingDisabled => "disabled",
            Self::NotConfigured(_) => "not_configured",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FeedUnavailable(e) => write!(f, "Feed unavailable: {e}"),
            Self::Stale {
                age_ms,
                threshold_ms,
            } => write!(f, "Stale price: age {age_ms}ms > {threshold_ms}ms"),
            Self::Jump(reason) => f.write_str(reason),
            Self::NoMaterialChange => f.write_str(NO_MATERIAL_CHANGE),
            Self::PublishingDisabled => f.write_str("Publishing disabled"),
            Self::NotConfigured(what) => write!(f, "Missing {what}"),
        }
    }
}

/// A cycle that got past the gates and then failed.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] CoreError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl CycleError {
    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pipeline(_) => "pipeline",
            Self::Publish(PublishError::Rejected { .. }) => "rejected",
            Self::Publish(PublishError::Transport(_)) => "transport",
            Self::Publish(PublishError::Signing(_)) => "signing",
            Self::Publish(PublishError::Action(_) | PublishError::Price(_)) => "action",
            Self::Publish(PublishError::Config(_)) => "config",
        }
    }
}

#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Published(PublishReceipt),
    Skipped(SkipReason),
}

impl CycleOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published(_))
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Self::Skipped(reason) => Some(reason),
            Self::Published(_) => None,
        }
    }
}

/// Runs cycles and owns everything they mutate.
pub struct CycleDriver {
    source: Arc<dyn PriceSource>,
    /// `None` when publishing is disabled.
    publisher: Option<Publisher>,
    params: PipelineParams,
    clock: Arc<dyn Clock>,
    state: PublishState,
    last_accepted_index: Option<f64>,
    state_tx: watch::Sender<PublishState>,
}

impl CycleDriver {
    pub fn new(
        source: Arc<dyn PriceSource>,
        publisher: Option<Publisher>,
        params: PipelineParams,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state_tx, _) = watch::channel(PublishState::default());
        Self {
            source,
            publisher,
            params,
            clock,
            state: PublishState::default(),
            last_accepted_index: None,
            state_tx,
        }
    }

    /// Current state as seen by the driver.
    pub fn state(&self) -> &PublishState {
        &self.state
    }

    /// New read-only handle on the state snapshots.
    pub fn reader(&self) -> StateReader {
        StateReader::new(self.state_tx.subscribe())
    }

    /// Run one cycle, record its outcome and publish a state snapshot.
    ///
    /// The cycle works on a copy of the state that is committed only when it
    /// finishes, so dropping this future leaves the driver untouched.
    /// Errors are already logged and recorded when this returns.
    pub async fn execute(&mut self) -> Result<CycleOutcome, CycleError> {
        let started = Instant::now();
        let mut work = CycleWork {
            state: self.state.clone(),
            baseline: self.last_accepted_index,
        };
        let result = self.run_cycle(&mut work).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        let CycleWork { mut state, baseline } = work;

        match &result {
            Ok(CycleOutcome::Published(receipt)) => {
                Metrics::published(receipt.index_value);
                Metrics::cycle("published", latency_ms);
                info!(
                    index = receipt.index_value,
                    px = %receipt.price_wire,
                    nonce = receipt.nonce,
                    total_publishes = state.total_publishes,
                    "Published oracle price"
                );
            }
            Ok(CycleOutcome::Skipped(reason)) => {
                Metrics::skip(reason.label());
                Metrics::cycle("skipped", latency_ms);
                match reason {
                    SkipReason::NoMaterialChange | SkipReason::PublishingDisabled => {
                        debug!(reason = %reason, "Cycle skipped")
                    }
                    _ => warn!(reason = %reason, "Cycle skipped"),
                }
            }
            Err(e) => {
                state.last_error = Some(e.to_string());
                state.total_failures += 1;
                Metrics::publish_failed(e.kind());
                if let CycleError::Publish(PublishError::Rejected { status, .. }) = e {
                    Metrics::venue_rejected(*status);
                }
                Metrics::cycle("failed", latency_ms);
                error!(error = %e, kind = e.kind(), "Cycle failed");
            }
        }

        self.last_accepted_index = baseline;
        self.state = state;
        self.state_tx.send_replace(self.state.clone());
        result
    }

    /// The cycle itself, without outcome bookkeeping.
    async fn run_cycle(&self, work: &mut CycleWork) -> Result<CycleOutcome, CycleError> {
        work.state.total_cycles += 1;

        let sample = match self.source.fetch_latest().await {
            Ok(sample) => {
                Metrics::feed_attempts(1);
                sample
            }
            Err(e) => {
                Metrics::feed_attempts(e.attempts());
                Metrics::feed_failure();
                work.state.stale = true;
                return Ok(work.skip(SkipReason::FeedUnavailable(e.to_string())));
            }
        };

        let now_ms = self.clock.now_ms();
        match check_staleness(&sample, now_ms, self.params.stale_threshold_ms) {
            Ok(()) => work.state.stale = false,
            Err(CoreError::StaleSample {
                age_ms,
                threshold_ms,
            }) => {
                work.state.stale = true;
                return Ok(work.skip(SkipReason::Stale {
                    age_ms,
                    threshold_ms,
                }));
            }
            Err(e) => return Err(e.into()),
        }

        let index = scale_to_index(sample.value, self.params.index_scale)?;

        let verdict = sanity_check_jump(
            work.baseline,
            index.inner(),
            self.params.max_jump_fraction,
        );
        if !verdict.ok {
            let reason = verdict.reason.unwrap_or_else(|| "Jump too large".to_string());
            return Ok(work.skip(SkipReason::Jump(reason)));
        }

        // Accepted: becomes the jump baseline whether or not it is published.
        work.baseline = Some(index.inner());
        work.state.last_index_value = Some(index.inner());
        work.state.last_observed_at_ms = Some(sample.observed_at_ms);
        work.state.last_error = None;

        debug!(
            raw = sample.value,
            index = index.inner(),
            observed_at_ms = sample.observed_at_ms,
            "Sample accepted"
        );

        let Some(publisher) = self.publisher.as_ref() else {
            return Ok(work.skip(SkipReason::PublishingDisabled));
        };

        let decision = should_publish(
            index.inner(),
            work.state.last_published_value,
            work.state.last_publish_timestamp_ms,
            now_ms,
            self.params.price_change_epsilon,
            self.params.min_publish_interval_ms,
        );
        if !decision.publish {
            return Ok(work.skip(SkipReason::NoMaterialChange));
        }

        if publisher.target().coin.trim().is_empty() {
            return Ok(work.skip(SkipReason::NotConfigured("coin symbol")));
        }
        if publisher.target().dex.trim().is_empty() {
            return Ok(work.skip(SkipReason::NotConfigured("dex name")));
        }

        let receipt = publisher.publish_price(index, now_ms).await?;

        work.state.last_published_value = Some(receipt.index_value);
        work.state.last_publish_timestamp_ms = receipt.published_at_ms;
        work.state.total_publishes += 1;

        Ok(CycleOutcome::Published(receipt))
    }
}

/// State a cycle mutates before it is committed.
struct CycleWork {
    state: PublishState,
    /// Last accepted index value, the jump check baseline.
    baseline: Option<f64>,
}

impl CycleWork {
    fn skip(&mut self, reason: SkipReason) -> CycleOutcome {
        self.state.total_skips += 1;
        self.state.last_error = Some(reason.to_string());
        CycleOutcome::Skipped(reason)
    }
}

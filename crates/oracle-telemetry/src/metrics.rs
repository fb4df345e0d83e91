//! Prometheus metrics for the oracle relay.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec, Encoder,
    Gauge, Histogram, IntCounter, IntCounterVec, TextEncoder,
};

use crate::error::TelemetryResult;

/// Cycles by outcome.
/// Labels: outcome (published/skipped/failed)
pub static CYCLES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "oracle_cycles_total",
        "Total publish cycles by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Skipped cycles by reason.
/// Labels: reason (stale/jump/no_change/disabled/not_configured/feed_unavailable)
pub static SKIPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "oracle_skips_total",
        "Total skipped cycles by reason",
        &["reason"]
    )
    .unwrap()
});

/// Feed fetch attempts consumed (including retries).
pub static FEED_ATTEMPTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "oracle_feed_attempts_total",
        "Total upstream feed fetch attempts"
    )
    .unwrap()
});

/// Feed fetches that exhausted all attempts.
pub static FEED_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "oracle_feed_failures_total",
        "Total feed fetches that exhausted retries"
    )
    .unwrap()
});

/// Accepted setOracle publishes.
pub static PUBLISHES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("oracle_publishes_total", "Total accepted setOracle publishes").unwrap()
});

/// Failed publishes by kind.
/// Labels: kind (rejected/transport/signing/action/config/pipeline)
pub static PUBLISH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "oracle_publish_failures_total",
        "Total failed publish attempts by kind",
        &["kind"]
    )
    .unwrap()
});

/// Venue rejections by HTTP status.
pub static VENUE_REJECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "oracle_venue_rejections_total",
        "Total venue rejections by HTTP status",
        &["status"]
    )
    .unwrap()
});

/// Scheduler ticks dropped because a cycle was still in flight.
pub static DROPPED_TICKS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "oracle_dropped_ticks_total",
        "Total scheduler ticks dropped while a cycle was in flight"
    )
    .unwrap()
});

/// End-to-end cycle latency in milliseconds.
pub static CYCLE_LATENCY_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "oracle_cycle_latency_ms",
        "Publish cycle latency in milliseconds",
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap()
});

/// Last published index value.
pub static LAST_PUBLISHED_INDEX: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "oracle_last_published_index",
        "Index value of the last accepted publish"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a finished cycle.
    pub fn cycle(outcome: &str, latency_ms: f64) {
        CYCLES_TOTAL.with_label_values(&[outcome]).inc();
        CYCLE_LATENCY_MS.observe(latency_ms);
    }

    /// Record a skipped cycle.
    pub fn skip(reason: &str) {
        SKIPS_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record attempts consumed by one fetch.
    pub fn feed_attempts(attempts: u32) {
        FEED_ATTEMPTS_TOTAL.inc_by(u64::from(attempts));
    }

    /// Record a fetch that exhausted its retries.
    pub fn feed_failure() {
        FEED_FAILURES_TOTAL.inc();
    }

    /// Record an accepted publish.
    pub fn published(index_value: f64) {
        PUBLISHES_TOTAL.inc();
        LAST_PUBLISHED_INDEX.set(index_value);
    }

    /// Record a failed publish.
    pub fn publish_failed(kind: &str) {
        PUBLISH_FAILURES_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record a venue rejection.
    pub fn venue_rejected(status: u16) {
        let status = status.to_string();
        VENUE_REJECTIONS_TOTAL
            .with_label_values(&[status.as_str()])
            .inc();
    }

    pub fn tick_dropped() {
        DROPPED_TICKS_TOTAL.inc();
    }

    /// Text exposition of the default registry.
    pub fn encode_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

//! Prometheus metrics and structured logging for the oracle relay.
//!
//! - Prometheus counters for cycle outcomes, skips, feed retries and publishes
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;

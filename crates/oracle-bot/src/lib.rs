//! Oracle price relay.
//!
//! Periodically reads a reference price from Pyth Hermes, runs it through the
//! decision gates and publishes it to a Hyperliquid HIP-3 dex as a signed
//! `perpDeploy.setOracle` action.

pub mod app;
pub mod config;
pub mod cycle;
pub mod error;
pub mod scheduler;
pub mod state;

pub use app::Application;
pub use config::{AppConfig, SchedulerConfig, TelemetryConfig};
pub use cycle::{CycleDriver, CycleError, CycleOutcome, SkipReason};
pub use error::{AppError, AppResult};
pub use scheduler::{Scheduler, SchedulerReport};
pub use state::{PublishState, StateReader};

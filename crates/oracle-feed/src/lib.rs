//! Upstream price feed for the oracle relay.
//!
//! Fetches one observation per call from the Pyth Hermes REST API,
//! retrying transient failures with linear backoff and validating
//! every decoded sample before handing it to the decision pipeline.

pub mod client;
pub mod config;
pub mod error;
pub mod parser;

pub use client::{HermesClient, PriceSource};
pub use config::FeedConfig;
pub use error::{FeedError, FeedResult};
pub use parser::{decode_latest, validate_sample, HermesPrice, HermesPriceFeed, MAX_FUTURE_SKEW_MS};

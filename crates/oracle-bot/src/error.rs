//! Application error types.

use oracle_executor::{KeyError, PublishError, SignerError};
use thiserror::Error;

use crate::cycle::CycleError;

/// Errors that stop the process before or while starting up.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),

    #[error("Feed error: {0}")]
    Feed(#[from] oracle_feed::FeedError),

    #[error("Publisher error: {0}")]
    Publish(#[from] PublishError),

    #[error("Cycle failed: {0}")]
    Cycle(#[from] CycleError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] oracle_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

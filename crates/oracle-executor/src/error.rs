//! Executor error types.

use oracle_core::CoreError;
use thiserror::Error;

use crate::signer::SignerError;

/// Rejected action construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("dex name must not be empty")]
    EmptyDex,

    #[error("price symbol must not be empty")]
    EmptySymbol,

    #[error("duplicate price symbol: {0}")]
    DuplicateSymbol(String),

    #[error("invalid price {px:?} for {symbol}")]
    InvalidPrice { symbol: String, px: String },

    #[error("setOracle requires at least one oracle price")]
    NoOraclePrices,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Action construction failed: {0}")]
    Action(#[from] ActionError),

    #[error("Price formatting failed: {0}")]
    Price(#[from] CoreError),

    #[error("Signing failed: {0}")]
    Signing(#[from] SignerError),

    #[error("Venue rejected action (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl PublishError {
    /// Whether the venue answered and refused the action.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

pub type PublishResult<T> = Result<T, PublishError>;

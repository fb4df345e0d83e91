//! Domain types shared by the feed, pipeline and publisher.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Venue network selection.
///
/// The network only influences the signed payload through the phantom agent
/// `source` field and chooses default endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
}

impl Network {
    pub fn is_mainnet(&self) -> bool {
        matches!(self, Self::Mainnet)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
        }
    }
}

/// Which field of the upstream feed entry a sample was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    /// Spot aggregate price.
    Price,
    /// Exponential moving average, used when `price` is missing.
    EmaPrice,
}

/// One price observation from the upstream feed.
///
/// Immutable once returned by the price source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    /// Feed identifier the sample belongs to.
    pub feed_id: String,
    /// Decoded price (`price × 10^expo`).
    pub value: f64,
    /// Publish time reported by the feed, in Unix milliseconds.
    pub observed_at_ms: i64,
    /// Field the value was decoded from.
    pub field: PriceField,
}

impl PriceSample {
    pub fn new(feed_id: impl Into<String>, value: f64, observed_at_ms: i64) -> Self {
        Self {
            feed_id: feed_id.into(),
            value,
            observed_at_ms,
            field: PriceField::Price,
        }
    }

    /// Age of the sample relative to `now_ms` (negative if in the future).
    #[inline]
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.observed_at_ms
    }
}

/// Feed price rescaled into venue index units.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexValue(pub f64);

impl IndexValue {
    #[inline]
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of comparing a new index value against the previously accepted one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpVerdict {
    pub ok: bool,
    pub reason: Option<String>,
}

impl JumpVerdict {
    pub fn ok() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

/// Result of the debounce gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishDecision {
    pub publish: bool,
    pub reason: Option<String>,
}

impl PublishDecision {
    pub fn publish() -> Self {
        Self {
            publish: true,
            reason: None,
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            publish: false,
            reason: Some(reason.into()),
        }
    }
}

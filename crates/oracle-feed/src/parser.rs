//! Hermes response parsing and sample validation.
//!
//! `GET /latest_price_feeds?ids[]=<id>` returns:
//!
//! ```json
//! [{"id": "…", "price": {"price": "420012345", "conf": "…", "expo": -5, "publish_time": 1700000000},
//!   "ema_price": {…}}]
//! ```
//!
//! The decoded value is `price × 10^expo` and the timestamp `publish_time × 1000`.

use oracle_core::{PriceField, PriceSample};
use serde::Deserialize;

use crate::error::{FeedError, FeedResult};

/// Maximum tolerated lead of the feed publish time over the local clock (ms).
pub const MAX_FUTURE_SKEW_MS: i64 = 1_000;

/// One entry of the `latest_price_feeds` array.
#[derive(Debug, Clone, Deserialize)]
pub struct HermesPriceFeed {
    pub id: String,
    #[serde(default)]
    pub price: Option<HermesPrice>,
    #[serde(default)]
    pub ema_price: Option<HermesPrice>,
}

/// Fixed-point price as published by Hermes.
#[derive(Debug, Clone, Deserialize)]
pub struct HermesPrice {
    /// Integer mantissa as a string.
    pub price: String,
    /// Confidence interval (same exponent), unused by the relay.
    #[serde(default)]
    pub conf: Option<String>,
    pub expo: i32,
    /// Unix seconds.
    pub publish_time: i64,
}

impl HermesPrice {
    /// `price × 10^expo`.
    pub fn value(&self) -> FeedResult<f64> {
        let mantissa: f64 = self
            .price
            .trim()
            .parse()
            .map_err(|e| FeedError::ParseError(format!("price {:?}: {e}", self.price)))?;
        Ok(mantissa * 10f64.powi(self.expo))
    }

    pub fn publish_time_ms(&self) -> FeedResult<i64> {
        self.publish_time.checked_mul(1000).ok_or_else(|| {
            FeedError::InvalidData(format!("publish_time {} out of range", self.publish_time))
        })
    }
}

fn normalize_id(id: &str) -> String {
    id.trim().trim_start_matches("0x").to_ascii_lowercase()
}

/// Decode the response body for `feed_id`.
///
/// Picks the entry whose id matches (with or without `0x`, any case),
/// falling back to the first entry. Uses `price`, then `ema_price`.
pub fn decode_latest(body: &str, feed_id: &str) -> FeedResult<PriceSample> {
    let feeds: Vec<HermesPriceFeed> = serde_json::from_str(body)
        .map_err(|e| FeedError::ParseError(format!("latest_price_feeds body: {e}")))?;

    let wanted = normalize_id(feed_id);
    let entry = feeds
        .iter()
        .find(|f| normalize_id(&f.id) == wanted)
        .or_else(|| feeds.first())
        .ok_or_else(|| FeedError::InvalidData("empty latest_price_feeds response".to_string()))?;

    let (field, price) = match (&entry.price, &entry.ema_price) {
        (Some(p), _) => (PriceField::Price, p),
        (None, Some(ema)) => (PriceField::EmaPrice, ema),
        (None, None) => {
            return Err(FeedError::InvalidData(format!(
                "feed {} has neither price nor ema_price",
                entry.id
            )))
        }
    };

    Ok(PriceSample {
        feed_id: entry.id.clone(),
        value: price.value()?,
        observed_at_ms: price.publish_time_ms()?,
        field,
    })
}

/// Validate a decoded sample against the local clock.
///
/// The value must be finite and strictly positive, and the publish time may
/// lead `now_ms` by at most [`MAX_FUTURE_SKEW_MS`].
pub fn validate_sample(sample: &PriceSample, now_ms: i64) -> FeedResult<()> {
    if !sample.value.is_finite() || sample.value <= 0.0 {
        return Err(FeedError::InvalidData(format!(
            "price must be finite and > 0, got {}",
            sample.value
        )));
    }

    let lead_ms = sample.observed_at_ms - now_ms;
    if lead_ms > MAX_FUTURE_SKEW_MS {
        return Err(FeedError::InvalidData(format!(
            "publish time {}ms ahead of local clock",
            lead_ms
        )));
    }

    Ok(())
}

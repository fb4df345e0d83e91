//! Publish decision pipeline.
//!
//! Pure gate functions applied to every observed price, in order:
//!
//! 1. [`check_staleness`] - reject samples older than the stale threshold
//! 2. [`scale_to_index`] - raw feed price -> venue index units
//! 3. [`sanity_check_jump`] - reject implausible jumps vs. the last accepted index
//! 4. [`should_publish`] - debounce (material change or heartbeat)
//!
//! None of these functions touch shared state; the cycle driver owns the
//! previous values and passes them in.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::{IndexValue, JumpVerdict, PriceSample, PublishDecision};

/// Floor for the jump denominator so a zero baseline cannot divide by zero.
pub const JUMP_EPSILON: f64 = 1e-9;

/// Debounce skip reason.
pub const NO_MATERIAL_CHANGE: &str = "No material change";

/// Decimal places used before trailing zeros are stripped from a wire price.
const PRICE_WIRE_DECIMALS: usize = 8;

/// Parameters for the decision gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineParams {
    /// Divisor applied to the raw feed price. Must be > 0.
    /// Example: XAUT ~4200 / 40 ~= 105.
    #[serde(default = "default_index_scale")]
    pub index_scale: f64,
    /// Samples older than this are not published (ms).
    #[serde(default = "default_stale_threshold_ms")]
    pub stale_threshold_ms: i64,
    /// Maximum accepted relative move between consecutive index values.
    /// 0 disables the check.
    #[serde(default = "default_max_jump_fraction")]
    pub max_jump_fraction: f64,
    /// Absolute index change that counts as material.
    #[serde(default = "default_price_change_epsilon")]
    pub price_change_epsilon: f64,
    /// Heartbeat: publish at least this often even without material change (ms).
    #[serde(default = "default_min_publish_interval_ms")]
    pub min_publish_interval_ms: i64,
}

fn default_index_scale() -> f64 {
    40.0
}

fn default_stale_threshold_ms() -> i64 {
    30_000
}

fn default_max_jump_fraction() -> f64 {
    0.2
}

fn default_price_change_epsilon() -> f64 {
    0.01
}

fn default_min_publish_interval_ms() -> i64 {
    10_000
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            index_scale: default_index_scale(),
            stale_threshold_ms: default_stale_threshold_ms(),
            max_jump_fraction: default_max_jump_fraction(),
            price_change_epsilon: default_price_change_epsilon(),
            min_publish_interval_ms: default_min_publish_interval_ms(),
        }
    }
}

impl PipelineParams {
    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.index_scale.is_finite() && self.index_scale > 0.0) {
            return Err(CoreError::InvalidConfig(format!(
                "index_scale must be > 0, got {}",
                self.index_scale
            )));
        }
        if self.stale_threshold_ms <= 0 {
            return Err(CoreError::InvalidConfig(
                "stale_threshold_ms must be > 0".to_string(),
            ));
        }
        // NaN fails every comparison and would silently disable the jump check.
        if !self.max_jump_fraction.is_finite() {
            return Err(CoreError::InvalidConfig(format!(
                "max_jump_fraction must be finite, got {}",
                self.max_jump_fraction
            )));
        }
        if self.price_change_epsilon < 0.0 || !self.price_change_epsilon.is_finite() {
            return Err(CoreError::InvalidConfig(
                "price_change_epsilon must be >= 0".to_string(),
            ));
        }
        if self.min_publish_interval_ms < 0 {
            return Err(CoreError::InvalidConfig(
                "min_publish_interval_ms must be >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reject a sample whose age exceeds `stale_threshold_ms`.
pub fn check_staleness(sample: &PriceSample, now_ms: i64, stale_threshold_ms: i64) -> Result<()> {
    let age_ms = sample.age_ms(now_ms);
    if age_ms > stale_threshold_ms {
        return Err(CoreError::StaleSample {
            age_ms,
            threshold_ms: stale_threshold_ms,
        });
    }
    Ok(())
}

/// Rescale a raw feed price into index units: `raw / scale`.
///
/// # Errors
/// `CoreError::InvalidConfig` if `scale <= 0`.
pub fn scale_to_index(raw: f64, scale: f64) -> Result<IndexValue> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(CoreError::InvalidConfig(format!(
            "indexScale must be > 0, got {scale}"
        )));
    }
    Ok(IndexValue::new(raw / scale))
}

/// Compare `next` against the previously accepted index value.
///
/// Without a baseline, or with `max_jump_fraction <= 0`, everything passes.
pub fn sanity_check_jump(
    previous: Option<f64>,
    next: f64,
    max_jump_fraction: f64,
) -> JumpVerdict {
    let Some(previous) = previous else {
        return JumpVerdict::ok();
    };

    if max_jump_fraction <= 0.0 {
        return JumpVerdict::ok();
    }

    let fraction = (next - previous).abs() / previous.abs().max(JUMP_EPSILON);
    if fraction > max_jump_fraction {
        return JumpVerdict::rejected(format!(
            "Jump too large: {:.2}% > {:.2}%",
            fraction * 100.0,
            max_jump_fraction * 100.0
        ));
    }

    JumpVerdict::ok()
}

/// Debounce gate.
///
/// Publishes on cold start, on a material change (`|next - last| >= epsilon`),
/// or when `min_interval_ms` has elapsed since the last publish (heartbeat).
pub fn should_publish(
    next: f64,
    last_published: Option<f64>,
    last_published_at_ms: i64,
    now_ms: i64,
    epsilon: f64,
    min_interval_ms: i64,
) -> PublishDecision {
    let Some(last) = last_published else {
        return PublishDecision::publish();
    };

    if (next - last).abs() >= epsilon {
        return PublishDecision::publish();
    }

    if now_ms - last_published_at_ms >= min_interval_ms {
        return PublishDecision::publish();
    }

    PublishDecision::skip(NO_MATERIAL_CHANGE)
}

/// Render an index value as a venue price string.
///
/// Rounds to 8 decimal places, then strips trailing zeros:
/// `105.0 -> "105"`, `1924.55 -> "1924.55"`.
pub fn format_price_wire(value: f64) -> Result<String> {
    if !value.is_finite() || value < 0.0 {
        return Err(CoreError::InvalidPrice(format!(
            "cannot format {value} as a wire price"
        )));
    }
    let rounded = format!("{value:.prec$}", prec = PRICE_WIRE_DECIMALS);
    let decimal = Decimal::from_str(&rounded)?;
    Ok(decimal.normalize().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn test_scale_round_trip() {
        for (raw, scale) in [(4200.0, 40.0), (1.2345, 0.001), (98765.4321, 3.7)] {
            let index = scale_to_index(raw, scale).unwrap();
            assert!((index.inner() * scale - raw).abs() < 1e-9 * raw.abs().max(1.0));
        }
    }

    #[test]
    fn test_scale_rejects_non_positive() {
        assert!(matches!(
            scale_to_index(100.0, 0.0),
            Err(CoreError::InvalidConfig(_))
        ));
        assert!(matches!(
            scale_to_index(100.0, -1.0),
            Err(CoreError::InvalidConfig(_))
        ));
        assert!(scale_to_index(100.0, f64::NAN).is_err());
    }

    #[test]
    fn test_scale_xaut_example() {
        let index = scale_to_index(4200.0, 40.0).unwrap();
        assert_eq!(index.inner(), 105.0);
    }

    #[test]
    fn test_jump_without_baseline_is_ok() {
        for next in [0.0, 1.0, 1e12, -5.0] {
            for fraction in [0.0, 0.2, -1.0] {
                assert!(sanity_check_jump(None, next, fraction).ok);
            }
        }
    }

    #[test]
    fn test_jump_within_limit() {
        let verdict = sanity_check_jump(Some(100.0), 119.0, 0.2);
        assert!(verdict.ok);
        assert!(verdict.reason.is_none());
    }

    #[test]
    fn test_jump_too_large() {
        let verdict = sanity_check_jump(Some(100.0), 121.0, 0.2);
        assert!(!verdict.ok);
        let reason = verdict.reason.unwrap();
        assert!(reason.contains("Jump too large"), "reason: {reason}");
        assert_eq!(reason, "Jump too large: 21.00% > 20.00%");
    }

    #[test]
    fn test_jump_check_disabled() {
        assert!(sanity_check_jump(Some(100.0), 1000.0, 0.0).ok);
    }

    #[test]
    fn test_jump_zero_baseline_does_not_divide_by_zero() {
        let verdict = sanity_check_jump(Some(0.0), 1.0, 0.2);
        assert!(!verdict.ok);
        assert!(sanity_check_jump(Some(0.0), 0.0, 0.2).ok);
    }

    #[test]
    fn test_debounce_no_material_change() {
        let decision = should_publish(100.0, Some(100.0), T0, T0 + 1, 0.01, 10_000);
        assert!(!decision.publish);
        assert_eq!(decision.reason.as_deref(), Some(NO_MATERIAL_CHANGE));
    }

    #[test]
    fn test_debounce_material_change() {
        let decision = should_publish(100.0, Some(98.9), T0, T0 + 1, 0.01, 10_000);
        assert!(decision.publish);
    }

    #[test]
    fn test_debounce_heartbeat() {
        let decision = should_publish(100.0, Some(99.999), T0, T0 + 10_001, 0.01, 10_000);
        assert!(decision.publish);
    }

    #[test]
    fn test_debounce_cold_start() {
        let decision = should_publish(105.0, None, 0, T0, 1e9, i64::MAX);
        assert!(decision.publish);
    }

    #[test]
    fn test_staleness_gate() {
        let sample = PriceSample::new("feed", 4200.0, T0);
        assert!(check_staleness(&sample, T0 + 5_000, 5_000).is_ok());
        assert!(matches!(
            check_staleness(&sample, T0 + 5_001, 5_000),
            Err(CoreError::StaleSample {
                age_ms: 5_001,
                threshold_ms: 5_000
            })
        ));
    }

    #[test]
    fn test_format_price_wire() {
        assert_eq!(format_price_wire(105.0).unwrap(), "105");
        assert_eq!(format_price_wire(1924.55).unwrap(), "1924.55");
        assert_eq!(format_price_wire(105.005).unwrap(), "105.005");
        assert_eq!(format_price_wire(0.123456789).unwrap(), "0.12345679");
        assert_eq!(format_price_wire(0.0).unwrap(), "0");
    }

    #[test]
    fn test_format_price_wire_rejects_bad_values() {
        assert!(format_price_wire(f64::NAN).is_err());
        assert!(format_price_wire(f64::INFINITY).is_err());
        assert!(format_price_wire(-1.0).is_err());
    }

    #[test]
    fn test_params_validate() {
        assert!(PipelineParams::default().validate().is_ok());

        let bad_scale = PipelineParams {
            index_scale: 0.0,
            ..Default::default()
        };
        assert!(bad_scale.validate().is_err());

        let bad_stale = PipelineParams {
            stale_threshold_ms: 0,
            ..Default::default()
        };
        assert!(bad_stale.validate().is_err());
    }

    #[test]
    fn test_params_reject_non_finite_jump_fraction() {
        for fraction in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let params = PipelineParams {
                max_jump_fraction: fraction,
                ..Default::default()
            };
            assert!(
                matches!(params.validate(), Err(CoreError::InvalidConfig(_))),
                "{fraction} accepted"
            );
        }

        let disabled = PipelineParams {
            max_jump_fraction: 0.0,
            ..Default::default()
        };
        assert!(disabled.validate().is_ok());
    }
}

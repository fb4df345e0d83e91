//! Core domain types for the oracle relay.
//!
//! This crate provides the pieces every other crate agrees on:
//! - `PriceSample`, `IndexValue`: feed observations and their venue-scaled form
//! - `JumpVerdict`, `PublishDecision`: results of the decision gates
//! - `pipeline`: pure gate functions (staleness, scaling, jump sanity, debounce)
//! - `Clock`: injectable wall clock for deterministic tests

use std::future::Future;
use std::pin::Pin;

pub mod clock;
pub mod error;
pub mod pipeline;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, Result};
pub use pipeline::{
    check_staleness, format_price_wire, sanity_check_jump, scale_to_index, should_publish,
    PipelineParams, JUMP_EPSILON, NO_MATERIAL_CHANGE,
};
pub use types::{IndexValue, JumpVerdict, Network, PriceField, PriceSample, PublishDecision};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

//! Integration tests for oracle-bot.
//!
//! Local HTTP servers stand in for the Hermes feed and the venue:
//! - End-to-end publish and debounce
//! - Startup failures that must never publish
//! - Venue rejections and feed outages

pub mod common;

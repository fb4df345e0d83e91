//! Publish state read model.
//!
//! The cycle driver is the only writer. Everything else holds a
//! [`StateReader`] and reads cloned snapshots.

use serde::Serialize;
use tokio::sync::watch;

/// Outcome history of the relay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishState {
    /// Last index value the venue accepted.
    pub last_published_value: Option<f64>,
    /// When that value was accepted (ms, 0 before the first publish).
    pub last_publish_timestamp_ms: i64,
    pub total_publishes: u64,
    pub last_error: Option<String>,
    /// True until a fresh sample is seen, and again after any feed failure.
    pub stale: bool,
    /// Last index value that passed the sanity gates.
    pub last_index_value: Option<f64>,
    /// Feed timestamp of that value.
    pub last_observed_at_ms: Option<i64>,
    pub total_cycles: u64,
    pub total_skips: u64,
    pub total_failures: u64,
}

impl Default for PublishState {
    fn default() -> Self {
        Self {
            last_published_value: None,
            last_publish_timestamp_ms: 0,
            total_publishes: 0,
            last_error: None,
            stale: true,
            last_index_value: None,
            last_observed_at_ms: None,
            total_cycles: 0,
            total_skips: 0,
            total_failures: 0,
        }
    }
}

/// Read-only handle on the latest [`PublishState`].
#[derive(Debug, Clone)]
pub struct StateReader {
    rx: watch::Receiver<PublishState>,
}

impl StateReader {
    pub(crate) fn new(rx: watch::Receiver<PublishState>) -> Self {
        Self { rx }
    }

    /// Clone of the most recently published state.
    pub fn snapshot(&self) -> PublishState {
        self.rx.borrow().clone()
    }

    /// Wait until the writer publishes a new snapshot.
    ///
    /// Returns `false` once the writer is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

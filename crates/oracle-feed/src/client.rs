//! Hermes REST client.
//!
//! One call to [`PriceSource::fetch_latest`] yields one validated
//! [`PriceSample`] or an error after all attempts are spent.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use oracle_core::{BoxFuture, Clock, PriceSample, SystemClock};
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::FeedConfig;
use crate::error::{FeedError, FeedResult};
use crate::parser::{decode_latest, validate_sample};

/// Source of price observations.
///
/// Uses `BoxFuture` so the trait stays dyn-compatible.
pub trait PriceSource: Send + Sync {
    /// Fetch one validated observation, retrying transient failures.
    fn fetch_latest(&self) -> BoxFuture<'_, FeedResult<PriceSample>>;

    /// Feed identifier this source serves.
    fn feed_id(&self) -> &str;
}

/// Pyth Hermes price source.
pub struct HermesClient {
    client: Client,
    config: FeedConfig,
    clock: Arc<dyn Clock>,
}

impl HermesClient {
    /// Create a client using the system clock.
    pub fn new(config: FeedConfig) -> FeedResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a client with an injected clock (used for validation).
    pub fn with_clock(config: FeedConfig, clock: Arc<dyn Clock>) -> FeedResult<Self> {
        if config.feed_id.trim().is_empty() {
            return Err(FeedError::InvalidData("feed_id must not be empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| FeedError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            clock,
        })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/latest_price_feeds",
            self.config.api_url.trim_end_matches('/')
        )
    }

    /// Single attempt: request, decode, validate.
    async fn fetch_once(&self) -> FeedResult<PriceSample> {
        let mut query = vec![("ids[]", self.config.feed_id.as_str())];
        if let Some(cluster) = self.config.cluster.as_deref() {
            query.push(("cluster", cluster));
        }

        let response = self
            .client
            .get(self.endpoint())
            .query(&query)
            .send()
            .await
            .map_err(|e| FeedError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FeedError::HttpClient(format!("Failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(FeedError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let sample = decode_latest(&body, &self.config.feed_id)?;
        validate_sample(&sample, self.clock.now_ms())?;

        debug!(
            feed_id = %sample.feed_id,
            value = sample.value,
            observed_at_ms = sample.observed_at_ms,
            field = ?sample.field,
            "Decoded price sample"
        );

        Ok(sample)
    }

    async fn fetch_with_retry(&self) -> FeedResult<PriceSample> {
        let base = Duration::from_millis(self.config.retry_base_delay_ms);
        retry_linear(&self.config.feed_id, self.config.max_attempts, base, || {
            self.fetch_once()
        })
        .await
    }
}

/// Retry loop with linear backoff: attempt N failing waits `N * base`.
/// No wait follows the last attempt.
async fn retry_linear<T, F, Fut>(
    feed_id: &str,
    max_attempts: u32,
    base: Duration,
    mut op: F,
) -> FeedResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FeedResult<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                warn!(
                    feed_id,
                    attempts = attempt,
                    error = %e,
                    "Price fetch failed, giving up"
                );
                return Err(FeedError::RetriesExhausted {
                    attempts: attempt,
                    last_error: Box::new(e),
                });
            }
            Err(e) => {
                let delay = base * attempt;
                warn!(
                    feed_id,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Price fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

impl PriceSource for HermesClient {
    fn fetch_latest(&self) -> BoxFuture<'_, FeedResult<PriceSample>> {
        Box::pin(self.fetch_with_retry())
    }

    fn feed_id(&self) -> &str {
        &self.config.feed_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use oracle_core::ManualClock;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    const FEED: &str = "0xabc123";
    const PUBLISH_TIME_S: i64 = 1_700_000_000;

    #[derive(Clone)]
    struct ServerState {
        calls: Arc<AtomicU32>,
        failures_before_success: u32,
        queries: Arc<Mutex<Vec<String>>>,
    }

    async fn latest(
        State(state): State<ServerState>,
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, String) {
        let n = state.calls.fetch_add(1, Ordering::SeqCst) + 1;
        state
            .queries
            .lock()
            .push(params.get("ids[]").cloned().unwrap_or_default());
        if n <= state.failures_before_success {
            return (StatusCode::SERVICE_UNAVAILABLE, "upstream busy".to_string());
        }
        (
            StatusCode::OK,
            format!(
                r#"[{{"id":"abc123","price":{{"price":"420000","conf":"10","expo":-2,"publish_time":{PUBLISH_TIME_S}}}}}]"#
            ),
        )
    }

    async fn spawn_server(failures_before_success: u32) -> (String, ServerState) {
        let state = ServerState {
            calls: Arc::new(AtomicU32::new(0)),
            failures_before_success,
            queries: Arc::new(Default::default()),
        };
        let app = Router::new()
            .route("/api/latest_price_feeds", get(latest))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/api"), state)
    }

    fn client(api_url: String, max_attempts: u32) -> HermesClient {
        let config = FeedConfig {
            api_url,
            feed_id: FEED.to_string(),
            max_attempts,
            retry_base_delay_ms: 1,
            request_timeout_ms: 2_000,
            ..Default::default()
        };
        let clock = Arc::new(ManualClock::new(PUBLISH_TIME_S * 1000 + 500));
        HermesClient::with_clock(config, clock).unwrap()
    }

    #[test]
    fn test_rejects_empty_feed_id() {
        assert!(HermesClient::new(FeedConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_fetch_success_first_attempt() {
        let (url, state) = spawn_server(0).await;
        let sample = client(url, 3).fetch_latest().await.unwrap();

        assert!((sample.value - 4200.0).abs() < 1e-9);
        assert_eq!(sample.observed_at_ms, PUBLISH_TIME_S * 1000);
        assert_eq!(state.calls.load(Ordering::SeqCst), 1);
        let log = state.queries.lock();
        assert_eq!(log.as_slice(), &[FEED.to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_recovers_after_transient_failures() {
        let (url, state) = spawn_server(2).await;
        let sample = client(url, 3).fetch_latest().await.unwrap();

        assert!((sample.value - 4200.0).abs() < 1e-9);
        assert_eq!(state.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_exhausts_attempts() {
        let (url, state) = spawn_server(u32::MAX).await;
        let err = client(url, 3).fetch_latest().await.unwrap_err();

        assert_eq!(err.attempts(), 3);
        match err {
            FeedError::RetriesExhausted { last_error, .. } => {
                assert!(matches!(
                    *last_error,
                    FeedError::HttpStatus { status: 503, .. }
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(state.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_future_sample_consumes_attempts() {
        let (url, state) = spawn_server(0).await;
        let config = FeedConfig {
            api_url: url,
            feed_id: FEED.to_string(),
            max_attempts: 2,
            retry_base_delay_ms: 1,
            ..Default::default()
        };
        // Local clock 5s behind the feed publish time.
        let clock = Arc::new(ManualClock::new(PUBLISH_TIME_S * 1000 - 5_000));
        let client = HermesClient::with_clock(config, clock).unwrap();

        let err = client.fetch_latest().await.unwrap_err();
        assert_eq!(err.attempts(), 2);
        assert_eq!(state.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_linear_without_trailing_wait() {
        let started = tokio::time::Instant::now();
        let mut attempt_offsets = Vec::new();

        let err = retry_linear(FEED, 3, Duration::from_millis(200), || {
            attempt_offsets.push(started.elapsed());
            async { Err::<(), _>(FeedError::HttpClient("connection refused".to_string())) }
        })
        .await
        .unwrap_err();

        assert_eq!(err.attempts(), 3);
        assert_eq!(
            attempt_offsets,
            vec![
                Duration::ZERO,
                Duration::from_millis(200),
                Duration::from_millis(600),
            ]
        );
        // 1 x base + 2 x base, nothing after the last attempt
        assert_eq!(started.elapsed(), Duration::from_millis(600));
    }
}

//! Price publisher: build `setOracle`, sign, post.
//!
//! The publisher is stateless with respect to the publish history; the
//! cycle driver applies the returned [`PublishReceipt`] to its own state.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use oracle_core::{format_price_wire, BoxFuture, IndexValue};
use parking_lot::Mutex;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::action::{Action, SetOracle};
use crate::config::VenueConfig;
use crate::envelope::SignedEnvelope;
use crate::error::{PublishError, PublishResult};
use crate::nonce::NonceManager;
use crate::signer::{parse_address, ActionSigner, SigningInput};

// =============================================================================
// Transport
// =============================================================================

/// Raw venue answer to an accepted POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueResponse {
    pub status: u16,
    pub body: String,
}

/// Delivers a signed envelope to the venue.
///
/// Uses `BoxFuture` so the trait stays dyn-compatible.
pub trait VenueTransport: Send + Sync {
    /// POST the envelope. Non-2xx answers are `PublishError::Rejected`.
    fn post(&self, envelope: SignedEnvelope) -> BoxFuture<'_, PublishResult<VenueResponse>>;
}

/// Arc wrapper for VenueTransport trait objects.
pub type DynVenueTransport = Arc<dyn VenueTransport>;

/// `{"status":"err","response":"..."}` returned with HTTP 200.
fn venue_error(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    if value.get("status").and_then(|s| s.as_str()) == Some("err") {
        let detail = value
            .get("response")
            .map(|r| r.as_str().map(str::to_string).unwrap_or_else(|| r.to_string()))
            .unwrap_or_default();
        return Some(detail);
    }
    None
}

/// JSON-over-HTTPS transport.
pub struct HttpVenueTransport {
    client: Client,
    url: String,
}

impl HttpVenueTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> PublishResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post_envelope(&self, envelope: SignedEnvelope) -> PublishResult<VenueResponse> {
        let response = self
            .client
            .post(&self.url)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| PublishError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Transport(format!("Failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        if let Some(detail) = venue_error(&body) {
            warn!(nonce = envelope.nonce, detail = %detail, "Venue returned status=err");
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(VenueResponse {
            status: status.as_u16(),
            body,
        })
    }
}

impl VenueTransport for HttpVenueTransport {
    fn post(&self, envelope: SignedEnvelope) -> BoxFuture<'_, PublishResult<VenueResponse>> {
        Box::pin(self.post_envelope(envelope))
    }
}

/// Reply the mock transport gives to the next post.
#[derive(Debug, Clone)]
pub enum MockReply {
    Accept,
    Reject { status: u16, body: String },
    Fail(String),
}

/// Mock venue transport for testing.
#[derive(Debug)]
pub struct MockVenueTransport {
    /// Recorded posts for verification.
    posts: Mutex<Vec<SignedEnvelope>>,
    /// Reply to return.
    reply: Mutex<MockReply>,
    /// Artificial latency per post.
    delay: Mutex<Option<Duration>>,
}

impl Default for MockVenueTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVenueTransport {
    pub fn new() -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            reply: Mutex::new(MockReply::Accept),
            delay: Mutex::new(None),
        }
    }

    pub fn set_reply(&self, reply: MockReply) {
        *self.reply.lock() = reply;
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    pub fn posts(&self) -> Vec<SignedEnvelope> {
        self.posts.lock().clone()
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().len()
    }
}

impl VenueTransport for MockVenueTransport {
    fn post(&self, envelope: SignedEnvelope) -> BoxFuture<'_, PublishResult<VenueResponse>> {
        Box::pin(async move {
            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.posts.lock().push(envelope);
            let reply = self.reply.lock().clone();
            match reply {
                MockReply::Accept => Ok(VenueResponse {
                    status: 200,
                    body: r#"{"status":"ok","response":{"type":"default"}}"#.to_string(),
                }),
                MockReply::Reject { status, body } => Err(PublishError::Rejected { status, body }),
                MockReply::Fail(msg) => Err(PublishError::Transport(msg)),
            }
        })
    }
}

// =============================================================================
// Publisher
// =============================================================================

/// What the publisher writes and on whose behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    pub dex: String,
    pub coin: String,
    pub vault_address: Option<Address>,
    pub expires_after_ms: Option<u64>,
}

impl PublishTarget {
    pub fn from_config(config: &VenueConfig) -> PublishResult<Self> {
        let vault_address = config
            .vault_address
            .as_deref()
            .map(parse_address)
            .transpose()
            .map_err(|e| PublishError::Config(e.to_string()))?;

        Ok(Self {
            dex: config.dex.clone(),
            coin: config.coin.clone(),
            vault_address,
            expires_after_ms: config.expires_after_ms,
        })
    }
}

/// Result of one accepted publish.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub index_value: f64,
    /// Price string sent on the wire.
    pub price_wire: String,
    pub nonce: u64,
    pub expires_after: Option<u64>,
    pub published_at_ms: i64,
    pub response: VenueResponse,
}

pub struct Publisher {
    target: PublishTarget,
    signer: ActionSigner,
    nonces: NonceManager,
    transport: DynVenueTransport,
}

impl Publisher {
    pub fn new(target: PublishTarget, signer: ActionSigner, transport: DynVenueTransport) -> Self {
        Self {
            target,
            signer,
            nonces: NonceManager::new(),
            transport,
        }
    }

    pub fn target(&self) -> &PublishTarget {
        &self.target
    }

    pub fn signer(&self) -> &ActionSigner {
        &self.signer
    }

    /// `setOracle` for the configured dex/coin at `index`.
    pub fn build_action(&self, index: IndexValue) -> PublishResult<(Action, String)> {
        let price_wire = format_price_wire(index.inner())?;
        let action =
            SetOracle::single_price(&self.target.dex, &self.target.coin, price_wire.clone())?;
        Ok((action.into(), price_wire))
    }

    /// Assign a nonce, sign and assemble the envelope.
    pub async fn sign_envelope(&self, action: Action, now_ms: i64) -> PublishResult<SignedEnvelope> {
        let nonce = self.nonces.next(now_ms);
        let expires_after = self
            .target
            .expires_after_ms
            .map(|window| nonce.saturating_add(window));

        let input = SigningInput {
            action,
            nonce,
            vault_address: self.target.vault_address,
            expires_after,
        };
        let signature = self.signer.sign_action(&input).await?;

        Ok(SignedEnvelope::new(
            input.action,
            nonce,
            signature,
            input.vault_address,
            expires_after,
        ))
    }

    /// Build, sign and post a price update.
    ///
    /// # Errors
    /// Action construction, signing, transport failure or venue rejection.
    pub async fn publish_price(&self, index: IndexValue, now_ms: i64) -> PublishResult<PublishReceipt> {
        let (action, price_wire) = self.build_action(index)?;
        let envelope = self.sign_envelope(action, now_ms).await?;
        let nonce = envelope.nonce;
        let expires_after = envelope.expires_after;

        debug!(
            dex = %self.target.dex,
            coin = %self.target.coin,
            px = %price_wire,
            nonce,
            "Posting setOracle"
        );

        let response = self.transport.post(envelope).await?;

        info!(
            dex = %self.target.dex,
            coin = %self.target.coin,
            px = %price_wire,
            nonce,
            status = response.status,
            "setOracle accepted"
        );

        Ok(PublishReceipt {
            index_value: index.inner(),
            price_wire,
            nonce,
            expires_after,
            published_at_ms: now_ms,
            response,
        })
    }
}

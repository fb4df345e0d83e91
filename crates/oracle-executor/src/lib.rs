//! Oracle price publishing for HIP-3 perp deployers.
//!
//! Turns an accepted index value into a signed `perpDeploy.setOracle`
//! action and delivers it to the venue.
//!
//! # Key Components
//!
//! - [`Action`] / [`SetOracle`] / [`SortedPxs`]: closed action set with
//!   canonical (msgpack-stable) ordering
//! - [`ActionSigner`]: action hash, phantom agent and EIP-712 signature
//! - [`DigestSigner`]: signing capability; [`LocalKeySigner`] holds the key
//! - [`KeyManager`]: key loading and address verification
//! - [`NonceManager`]: strictly increasing millisecond nonces
//! - [`Publisher`]: build, sign and post through a [`VenueTransport`]
//!
//! # Signing pipeline
//!
//! 1. msgpack(action) ‖ nonce ‖ vault tag ‖ expiry tag
//! 2. keccak256 -> connection id
//! 3. phantom agent `{source, connectionId}` -> EIP-712 digest
//! 4. secp256k1 signature, v normalized to 27/28

pub mod action;
pub mod config;
pub mod envelope;
pub mod error;
pub mod nonce;
pub mod publisher;
pub mod signer;

// Actions
pub use action::{Action, SetOracle, SortedPxs, PERP_DEPLOY_TYPE};

// Configuration
pub use config::{SignerConfig, VenueConfig};

// Envelope
pub use envelope::{SignatureParts, SignedEnvelope};

// Error types
pub use error::{ActionError, PublishError, PublishResult};

// Nonce management
pub use nonce::NonceManager;

// Publishing
pub use publisher::{
    DynVenueTransport, HttpVenueTransport, MockReply, MockVenueTransport, PublishReceipt,
    PublishTarget, Publisher, VenueResponse, VenueTransport,
};

// Signing
pub use signer::{
    parse_address, ActionSigner, DigestSigner, KeyError, KeyManager, KeySource, LocalKeySigner,
    PhantomAgent, SignerError, SigningInput,
};

pub use alloy::primitives::Address;

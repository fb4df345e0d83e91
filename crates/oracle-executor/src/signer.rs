//! L1 action signing for `setOracle` publishes.
//!
//! Two stages:
//! 1. connection id = keccak256 over the msgpack action and transport fields
//! 2. EIP-712 signature over the phantom agent carrying that id
//!
//! The private key sits behind [`DigestSigner`], so signing can be swapped
//! without touching the encoding rules.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{keccak256, Address, PrimitiveSignature, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as AlloySigner;
use alloy::sol;
use alloy::sol_types::eip712_domain;
use alloy::sol_types::SolStruct;
use oracle_core::{BoxFuture, Network};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::action::Action;
use crate::envelope::SignatureParts;

// =============================================================================
// KeySource and KeyManager
// =============================================================================

/// Source of the private key.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Hex key in an environment variable.
    EnvVar { var_name: String },
    /// Hex key in a file, e.g. a mounted secret.
    File { path: PathBuf },
}

/// Loads the signing key and verifies its address.
///
/// Security notes:
/// - Secret bytes are held in `Zeroizing` buffers until handed to `PrivateKeySigner`.
/// - Keys are loaded once at startup; no runtime key rotation.
/// - Never log private key material.
pub struct KeyManager {
    signer: PrivateKeySigner,
}

impl KeyManager {
    /// Load the key from `source` and verify the derived address.
    ///
    /// # Errors
    /// Returns `KeyError` if:
    /// - Environment variable not found
    /// - File read fails
    /// - Hex decoding fails
    /// - Private key is invalid
    /// - Address mismatch
    pub fn load(source: &KeySource, expected_address: Option<Address>) -> Result<Self, KeyError> {
        let hex_str: Zeroizing<String> = match source {
            KeySource::EnvVar { var_name } => Zeroizing::new(
                std::env::var(var_name).map_err(|_| KeyError::EnvVarNotFound(var_name.clone()))?,
            ),
            KeySource::File { path } => Zeroizing::new(std::fs::read_to_string(path)?),
        };

        Self::from_hex(&hex_str, expected_address)
    }

    /// Load from a hex-encoded key (`0x` prefix and surrounding whitespace allowed).
    pub fn from_hex(hex_str: &str, expected_address: Option<Address>) -> Result<Self, KeyError> {
        let trimmed = hex_str.trim().trim_start_matches("0x");
        let secret_bytes = Zeroizing::new(hex::decode(trimmed)?);

        let signer = PrivateKeySigner::from_slice(&secret_bytes)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;

        if let Some(expected) = expected_address {
            if signer.address() != expected {
                return Err(KeyError::AddressMismatch {
                    expected,
                    actual: signer.address(),
                });
            }
        }

        Ok(Self { signer })
    }

    /// Address derived from the loaded key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Hand the key over to a [`LocalKeySigner`].
    pub fn into_signer(self) -> LocalKeySigner {
        LocalKeySigner { inner: self.signer }
    }
}

/// Parse a `0x` address string from configuration.
pub fn parse_address(value: &str) -> Result<Address, KeyError> {
    Address::from_str(value.trim()).map_err(|e| KeyError::InvalidAddress(format!("{value}: {e}")))
}

/// Key management errors.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Failed to decode hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: Address, actual: Address },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// DigestSigner
// =============================================================================

/// Signing capability: a 32-byte digest in, a 65-byte signature out.
pub trait DigestSigner: Send + Sync {
    /// Address the signatures recover to.
    fn address(&self) -> Address;

    /// Sign a prehashed digest. Output is `r(32) ‖ s(32) ‖ v(1)`.
    fn sign_digest(&self, digest: B256) -> BoxFuture<'_, Result<[u8; 65], SignerError>>;
}

/// [`DigestSigner`] over an in-process secp256k1 key.
pub struct LocalKeySigner {
    inner: PrivateKeySigner,
}

impl LocalKeySigner {
    pub fn new(inner: PrivateKeySigner) -> Self {
        Self { inner }
    }
}

impl DigestSigner for LocalKeySigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    fn sign_digest(&self, digest: B256) -> BoxFuture<'_, Result<[u8; 65], SignerError>> {
        Box::pin(async move {
            let signature = self.inner.sign_hash(&digest).await?;
            Ok(signature_to_bytes(&signature))
        })
    }
}

/// `r ‖ s ‖ v` with the raw recovery id (0/1) in the last byte.
fn signature_to_bytes(signature: &PrimitiveSignature) -> [u8; 65] {
    let mut bytes = [0u8; 65];
    bytes[0..32].copy_from_slice(&signature.r().to_be_bytes::<32>());
    bytes[32..64].copy_from_slice(&signature.s().to_be_bytes::<32>());
    bytes[64] = u8::from(signature.v());
    bytes
}

// =============================================================================
// SigningInput and action_hash
// =============================================================================

/// Signing input parameters.
#[derive(Debug, Clone)]
pub struct SigningInput {
    pub action: Action,
    pub nonce: u64,
    /// None = sign as the key owner, Some = act for a vault
    pub vault_address: Option<Address>,
    /// Signature expiration (optional)
    pub expires_after: Option<u64>,
}

impl SigningInput {
    /// Bytes hashed into the connection id.
    ///
    /// ```text
    /// msgpack(action) ‖ nonce(8, BE) ‖ (0x00 | 0x01 ‖ vault(20)) ‖ [0x00 ‖ expires_after(8, BE)]
    /// ```
    pub fn preimage(&self) -> Result<Vec<u8>, SignerError> {
        // Named (map) format: keys in declaration order
        let mut data = rmp_serde::to_vec_named(&self.action)
            .map_err(|e| SignerError::SerializationFailed(e.to_string()))?;

        data.extend_from_slice(&self.nonce.to_be_bytes());

        // NOTE: even None carries the 0x00 tag
        match &self.vault_address {
            None => data.push(0x00),
            Some(addr) => {
                data.push(0x01);
                data.extend_from_slice(addr.as_slice());
            }
        }

        // Unlike the vault tag, an absent expiry adds nothing
        if let Some(expires) = self.expires_after {
            data.push(0x00);
            data.extend_from_slice(&expires.to_be_bytes());
        }

        Ok(data)
    }

    /// Keccak-256 of [`Self::preimage`] (the phantom agent connection id).
    ///
    /// # Errors
    /// Returns `SignerError::SerializationFailed` if msgpack serialization fails.
    pub fn action_hash(&self) -> Result<B256, SignerError> {
        Ok(keccak256(self.preimage()?))
    }
}

// =============================================================================
// PhantomAgent and EIP-712 digest
// =============================================================================

/// Fixed domain the venue verifies L1 actions against.
pub const EIP712_DOMAIN_NAME: &str = "Exchange";
pub const EIP712_DOMAIN_VERSION: &str = "1";
pub const EIP712_CHAIN_ID: u64 = 1337;
pub const EIP712_VERIFYING_CONTRACT: Address = Address::ZERO;

sol! {
    #[derive(Debug)]
    struct Agent {
        string source;
        bytes32 connectionId;
    }
}

/// Typed-data payload that is actually signed.
#[derive(Debug, Clone)]
pub struct PhantomAgent {
    /// `"a"` on mainnet, `"b"` on testnet.
    pub source: String,
    pub connection_id: B256,
}

impl PhantomAgent {
    pub fn new(action_hash: B256, network: Network) -> Self {
        let source = if network.is_mainnet() { "a" } else { "b" };
        Self {
            source: source.to_string(),
            connection_id: action_hash,
        }
    }

    /// `keccak256(0x1901 ‖ domain_separator ‖ struct_hash)`.
    pub fn signing_hash(&self) -> B256 {
        let domain = eip712_domain! {
            name: EIP712_DOMAIN_NAME,
            version: EIP712_DOMAIN_VERSION,
            chain_id: EIP712_CHAIN_ID,
            verifying_contract: EIP712_VERIFYING_CONTRACT,
        };

        let agent = Agent {
            source: self.source.clone(),
            connectionId: self.connection_id,
        };

        agent.eip712_signing_hash(&domain)
    }
}

// =============================================================================
// ActionSigner
// =============================================================================

/// Signing errors.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Signing failed: {0}")]
    SigningFailed(#[from] alloy::signers::Error),

    #[error("Action serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Signer address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: Address, actual: Address },
}

/// Signer for venue L1 actions.
///
/// Bound at construction to one verified address and one network.
pub struct ActionSigner {
    signer: Arc<dyn DigestSigner>,
    network: Network,
}

impl ActionSigner {
    /// # Errors
    /// `SignerError::AddressMismatch` if `signer` does not own `expected_address`.
    pub fn new(
        signer: Arc<dyn DigestSigner>,
        expected_address: Address,
        network: Network,
    ) -> Result<Self, SignerError> {
        let actual = signer.address();
        if actual != expected_address {
            return Err(SignerError::AddressMismatch {
                expected: expected_address,
                actual,
            });
        }
        Ok(Self { signer, network })
    }

    /// EIP-712 digest for `input`.
    pub fn digest(&self, input: &SigningInput) -> Result<B256, SignerError> {
        let action_hash = input.action_hash()?;
        Ok(PhantomAgent::new(action_hash, self.network).signing_hash())
    }

    /// Sign an action.
    ///
    /// # Errors
    /// Returns `SignerError` if signing fails or action serialization fails.
    pub async fn sign_action(&self, input: &SigningInput) -> Result<SignatureParts, SignerError> {
        let digest = self.digest(input)?;
        // NOTE: Do not log signature as it contains sensitive information
        let bytes = self.signer.sign_digest(digest).await?;
        Ok(SignatureParts::from_bytes(&bytes))
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn network(&self) -> Network {
        self.network
    }
}

// =============================================================================
// Tests
// =============================================================================

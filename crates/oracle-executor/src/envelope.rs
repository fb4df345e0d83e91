//! Signed envelope posted to the venue action endpoint.

use alloy::primitives::Address;
use serde::Serialize;

use crate::action::Action;

/// EIP-712 signature components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureParts {
    /// r component (hex with 0x prefix, e.g., "0x1a2b...").
    pub r: String,
    /// s component (hex with 0x prefix, e.g., "0x3c4d...").
    pub s: String,
    /// v component (recovery id, 27 or 28).
    pub v: u8,
}

impl SignatureParts {
    /// Create from raw signature bytes (65 bytes: r(32) + s(32) + v(1)).
    ///
    /// Normalizes v value from EIP-2098 format (0/1) to EIP-155 format (27/28).
    pub fn from_bytes(bytes: &[u8; 65]) -> Self {
        let v_raw = bytes[64];
        let v = if v_raw < 27 { v_raw + 27 } else { v_raw };
        Self {
            r: format!("0x{}", hex::encode(&bytes[0..32])),
            s: format!("0x{}", hex::encode(&bytes[32..64])),
            v,
        }
    }
}

/// `{action, nonce, signature, vaultAddress?, expiresAfter}`.
///
/// `vaultAddress` is omitted when unset; `expiresAfter` is always present
/// (`null` when unset).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedEnvelope {
    pub action: Action,
    pub nonce: u64,
    pub signature: SignatureParts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault_address: Option<String>,
    pub expires_after: Option<u64>,
}

impl SignedEnvelope {
    pub fn new(
        action: Action,
        nonce: u64,
        signature: SignatureParts,
        vault_address: Option<Address>,
        expires_after: Option<u64>,
    ) -> Self {
        Self {
            action,
            nonce,
            signature,
            vault_address: vault_address.map(|addr| format!("0x{}", hex::encode(addr.as_slice()))),
            expires_after,
        }
    }
}

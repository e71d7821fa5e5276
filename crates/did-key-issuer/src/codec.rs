//! Key codec: generate keys and build `did:key` identifiers.
//!
//! A `did:key` identifier for Ed25519 is
//! `did:key:z` + base58btc(`0xed 0x01` ‖ raw public key), where `z` is the
//! multibase marker for base58btc and `0xed 0x01` is the multicodec varint
//! for an Ed25519 public key.

use ed25519_dalek::PUBLIC_KEY_LENGTH;

use crate::crypto::keys::Ed25519KeyPair;
use crate::crypto::multicodec;
use crate::error::{IssuerError, Result};

/// Method prefix of every identifier issued here.
pub const DID_KEY_PREFIX: &str = "did:key:";

/// Multibase marker for base58btc.
pub const MULTIBASE_BASE58BTC: char = 'z';

/// Generate a fresh Ed25519 key pair.
pub fn generate_keypair() -> Ed25519KeyPair {
    Ed25519KeyPair::generate()
}

/// Encode a raw Ed25519 public key as a multibase string.
///
/// # Errors
///
/// Returns `IssuerError::InvalidKeyLength` unless `public_key` is exactly
/// 32 bytes.
pub fn encode_public_key(public_key: &[u8]) -> Result<String> {
    if public_key.len() != PUBLIC_KEY_LENGTH {
        return Err(IssuerError::InvalidKeyLength {
            expected: PUBLIC_KEY_LENGTH,
            actual: public_key.len(),
        });
    }
    let prefixed = multicodec::prefix_ed25519_pub(public_key);
    let encoded = bs58::encode(prefixed)
        .with_alphabet(bs58::Alphabet::BITCOIN)
        .into_string();
    Ok(format!("{MULTIBASE_BASE58BTC}{encoded}"))
}

/// Build the `did:key` identifier for a multibase-encoded public key.
pub fn build_identifier(public_key_multibase: &str) -> String {
    format!("{DID_KEY_PREFIX}{public_key_multibase}")
}

/// Decode a base58btc multibase string back to its bytes, multicodec prefix
/// included.
pub fn decode_public_key_multibase(public_key_multibase: &str) -> Result<Vec<u8>> {
    let body = public_key_multibase
        .strip_prefix(MULTIBASE_BASE58BTC)
        .ok_or_else(|| {
            IssuerError::InvalidMultibase(format!(
                "expected base58btc marker '{MULTIBASE_BASE58BTC}'"
            ))
        })?;
    bs58::decode(body)
        .with_alphabet(bs58::Alphabet::BITCOIN)
        .into_vec()
        .map_err(|e| IssuerError::InvalidMultibase(format!("base58btc: {e}")))
}

/// Recover the raw Ed25519 public key from a `did:key` identifier.
pub fn public_key_from_identifier(identifier: &str) -> Result<[u8; PUBLIC_KEY_LENGTH]> {
    let multibase = identifier.strip_prefix(DID_KEY_PREFIX).ok_or_else(|| {
        IssuerError::InvalidRequest(format!("identifier must start with {DID_KEY_PREFIX}"))
    })?;
    let decoded = decode_public_key_multibase(multibase)?;
    let raw = multicodec::strip_ed25519_pub(&decoded).ok_or_else(|| {
        IssuerError::InvalidMultibase("not an Ed25519 public key multicodec".to_string())
    })?;
    raw.try_into().map_err(|_| IssuerError::InvalidKeyLength {
        expected: PUBLIC_KEY_LENGTH,
        actual: raw.len(),
    })
}

//! Keccak-256 hashing primitives shared by the builder and the verifier.

use crate::address::Address;
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// Errors from parsing a 32-byte hash from hex.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashParseError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Keccak-256 of arbitrary bytes.
#[must_use]
pub fn keccak256(data: impl AsRef<[u8]>) -> [u8; 32] {
    Keccak256::digest(data.as_ref()).into()
}

/// Leaf for an address: `keccak256(abi.encodePacked(address))`.
#[must_use]
pub fn leaf_hash(address: &Address) -> [u8; 32] {
    keccak256(address.as_bytes())
}

/// Combine two nodes order-independently: the smaller hash goes first.
#[must_use]
pub fn hash_sorted_pair(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    Keccak256::new()
        .chain_update(first)
        .chain_update(second)
        .finalize()
        .into()
}

/// Format a hash as `0x`-prefixed lowercase hex.
#[must_use]
pub fn format_hash(hash: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(hash))
}

/// Parse a 32-byte hash from hex, with or without a `0x`/`0X` prefix.
///
/// # Errors
/// Returns an error on invalid hex or a length other than 32 bytes.
pub fn parse_hash(s: &str) -> Result<[u8; 32], HashParseError> {
    let s = s.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| HashParseError::InvalidHex(e.to_string()))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| HashParseError::InvalidLength(len))
}

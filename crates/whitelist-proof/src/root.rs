//! Agreement between the locally built root and the contract's root.
//!
//! The contract's root is authoritative. A mismatch means every proof built
//! here will be rejected on chain.

use crate::hashing::format_hash;
use serde::Serialize;

/// Outcome of comparing the local root with the on-chain root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RootStatus {
    /// On-chain root not fetched (yet)
    Unknown,
    /// Both roots agree
    Match,
    /// Roots disagree
    Mismatch {
        #[serde(with = "crate::proof::hash_serde")]
        local: [u8; 32],
        #[serde(with = "crate::proof::hash_serde")]
        onchain: [u8; 32],
    },
}

impl RootStatus {
    /// Compare a local root with an optional on-chain root.
    #[must_use]
    pub fn compare(local: &[u8; 32], onchain: Option<&[u8; 32]>) -> Self {
        match onchain {
            None => Self::Unknown,
            Some(onchain) if onchain == local => Self::Match,
            Some(onchain) => Self::Mismatch {
                local: *local,
                onchain: *onchain,
            },
        }
    }

    #[must_use]
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Self::Mismatch { .. })
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Match => "match",
            Self::Mismatch { .. } => "mismatch",
        }
    }

    /// Human readable description for logs and CLI output.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Unknown => "on-chain root unknown".to_string(),
            Self::Match => "local root matches on-chain root".to_string(),
            Self::Mismatch { local, onchain } => format!(
                "local root {} does not match on-chain root {}",
                format_hash(local),
                format_hash(onchain)
            ),
        }
    }
}

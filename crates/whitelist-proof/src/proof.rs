//! Membership proofs and their tree-independent verification.
//!
//! Verification must match the contract bit-for-bit: starting at the
//! address leaf, fold each sibling in with sort-then-hash and compare the
//! result to the root.

use crate::address::Address;
use crate::hashing::{format_hash, hash_sorted_pair, leaf_hash};
use serde::{Deserialize, Serialize};

/// Which side of the running node a sibling sat on in the unsorted tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// One level of a membership proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// Sibling hash at this level
    #[serde(with = "hash_serde")]
    pub sibling: [u8; 32],
    /// Position of the sibling relative to the path node
    pub side: Side,
}

/// Evidence that an address is a leaf of a membership tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipProof {
    /// Address being proven
    pub address: Address,

    /// Leaf hash of the address
    #[serde(with = "hash_serde")]
    pub leaf: [u8; 32],

    /// Index of the leaf in the whitelist
    pub leaf_index: usize,

    /// Sibling steps from the leaf up to the root
    pub steps: Vec<ProofStep>,
}

impl MembershipProof {
    /// Sibling hashes in leaf-to-root order, as passed to `mint(bytes32[])`.
    #[must_use]
    pub fn siblings(&self) -> Vec<[u8; 32]> {
        self.steps.iter().map(|step| step.sibling).collect()
    }

    /// Siblings as `0x`-prefixed hex strings.
    #[must_use]
    pub fn hex_siblings(&self) -> Vec<String> {
        self.steps.iter().map(|step| format_hash(&step.sibling)).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True for a single-member whitelist, where the leaf is the root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Root implied by this proof.
    #[must_use]
    pub fn compute_root(&self) -> [u8; 32] {
        fold_siblings(leaf_hash(&self.address), self.steps.iter().map(|s| &s.sibling))
    }

    /// Check this proof against a root.
    #[must_use]
    pub fn verify(&self, root: &[u8; 32]) -> bool {
        self.compute_root() == *root
    }
}

/// Verify that `address` is committed under `root` using `siblings`.
///
/// Needs no tree: this is the same check the contract performs.
#[must_use]
pub fn verify_membership(address: &Address, siblings: &[[u8; 32]], root: &[u8; 32]) -> bool {
    fold_siblings(leaf_hash(address), siblings.iter()) == *root
}

fn fold_siblings<'a>(leaf: [u8; 32], siblings: impl Iterator<Item = &'a [u8; 32]>) -> [u8; 32] {
    siblings.fold(leaf, |running, sibling| hash_sorted_pair(&running, sibling))
}

/// Serde for a single `[u8; 32]` as a hex string
pub mod hash_serde {
    use crate::hashing::{format_hash, parse_hash};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_hash(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_hash(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde for `Vec<[u8; 32]>` as hex strings
pub mod hash_vec_serde {
    use crate::hashing::{format_hash, parse_hash};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S>(data: &Vec<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let hex_strings: Vec<String> = data.iter().map(format_hash).collect();
        hex_strings.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_strings: Vec<String> = Vec::deserialize(deserializer)?;
        hex_strings
            .iter()
            .map(|s| parse_hash(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

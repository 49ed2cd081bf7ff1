//! Membership tree over a fixed whitelist.
//!
//! The tree is built once from an ordered address list and is read-only
//! afterwards. Parents are `keccak256(sort(left, right))`, so a verifier only
//! needs the sibling hashes, never their positions.

use crate::address::Address;
use crate::hashing::{format_hash, hash_sorted_pair, leaf_hash};
use crate::proof::{MembershipProof, ProofStep, Side};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while building a tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Cannot build a membership tree from an empty whitelist")]
    EmptyWhitelist,
}

/// What to do with the unpaired last node of an odd-length level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OddNodePolicy {
    /// Pair the node with itself; its proof carries a self-sibling step.
    #[default]
    Duplicate,
    /// Carry the node up unchanged; its proof skips the level.
    Promote,
}

impl OddNodePolicy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Promote => "promote",
        }
    }
}

impl fmt::Display for OddNodePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OddNodePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "duplicate" => Ok(Self::Duplicate),
            "promote" => Ok(Self::Promote),
            other => Err(format!(
                "unknown odd node policy '{other}' (expected 'duplicate' or 'promote')"
            )),
        }
    }
}

/// Merkle tree committing to an ordered whitelist.
#[derive(Debug, Clone)]
pub struct MembershipTree {
    /// `layers[0]` holds the leaves, the last layer holds only the root
    layers: Vec<Vec<[u8; 32]>>,
    addresses: Vec<Address>,
    /// Leaf hash -> index of its first occurrence
    positions: HashMap<[u8; 32], usize>,
    policy: OddNodePolicy,
}

impl MembershipTree {
    /// Build a tree with the default odd-node policy.
    ///
    /// # Errors
    /// Returns an error if `addresses` is empty.
    pub fn build(addresses: &[Address]) -> Result<Self, TreeError> {
        Self::build_with_policy(addresses, OddNodePolicy::default())
    }

    /// Build a tree with an explicit odd-node policy.
    ///
    /// # Errors
    /// Returns an error if `addresses` is empty.
    pub fn build_with_policy(
        addresses: &[Address],
        policy: OddNodePolicy,
    ) -> Result<Self, TreeError> {
        if addresses.is_empty() {
            return Err(TreeError::EmptyWhitelist);
        }

        let leaves: Vec<[u8; 32]> = addresses.iter().map(leaf_hash).collect();

        let mut positions = HashMap::with_capacity(leaves.len());
        for (index, leaf) in leaves.iter().enumerate() {
            positions.entry(*leaf).or_insert(index);
        }

        let layers = build_layers(leaves, policy);
        let tree = Self {
            layers,
            addresses: addresses.to_vec(),
            positions,
            policy,
        };

        debug!(
            leaves = tree.len(),
            unique = tree.positions.len(),
            depth = tree.depth(),
            policy = %policy,
            root = %format_hash(&tree.root()),
            "Built membership tree"
        );

        Ok(tree)
    }

    /// The committed root.
    #[must_use]
    pub fn root(&self) -> [u8; 32] {
        // build_layers always ends with a single-node layer
        self.layers
            .last()
            .and_then(|layer| layer.first())
            .copied()
            .unwrap_or_default()
    }

    /// Number of leaves, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Always false: an empty tree cannot be built.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Number of hashing levels above the leaves.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.layers.len() - 1
    }

    #[must_use]
    pub fn policy(&self) -> OddNodePolicy {
        self.policy
    }

    /// Whitelisted addresses in build order.
    #[must_use]
    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    /// Leaf hashes in build order.
    #[must_use]
    pub fn leaves(&self) -> &[[u8; 32]] {
        &self.layers[0]
    }

    /// Whether `address` is whitelisted.
    #[must_use]
    pub fn contains(&self, address: &Address) -> bool {
        self.positions.contains_key(&leaf_hash(address))
    }

    /// Index of the first leaf for `address`, if whitelisted.
    #[must_use]
    pub fn leaf_index(&self, address: &Address) -> Option<usize> {
        self.positions.get(&leaf_hash(address)).copied()
    }

    /// Build the membership proof for `address`.
    ///
    /// Returns `None` when the address is not whitelisted.
    #[must_use]
    pub fn prove(&self, address: &Address) -> Option<MembershipProof> {
        let leaf = leaf_hash(address);
        let leaf_index = *self.positions.get(&leaf)?;

        let mut steps = Vec::with_capacity(self.depth());
        let mut pos = leaf_index;

        for layer in &self.layers[..self.depth()] {
            let sibling_pos = pos ^ 1;
            if let Some(sibling) = layer.get(sibling_pos) {
                let side = if pos % 2 == 0 { Side::Right } else { Side::Left };
                steps.push(ProofStep {
                    sibling: *sibling,
                    side,
                });
            } else if self.policy == OddNodePolicy::Duplicate {
                // Unpaired last node, hashed with itself
                steps.push(ProofStep {
                    sibling: layer[pos],
                    side: Side::Right,
                });
            }
            pos /= 2;
        }

        Some(MembershipProof {
            address: *address,
            leaf,
            leaf_index,
            steps,
        })
    }

    /// Verify `proof` against this tree's root.
    #[must_use]
    pub fn verify(&self, proof: &MembershipProof) -> bool {
        proof.verify(&self.root())
    }
}

/// Hash `leaves` upward until a single node remains.
fn build_layers(leaves: Vec<[u8; 32]>, policy: OddNodePolicy) -> Vec<Vec<[u8; 32]>> {
    let mut layers = vec![leaves];

    loop {
        let level = &layers[layers.len() - 1];
        if level.len() <= 1 {
            break;
        }

        let mut next_level = Vec::with_capacity(level.len().div_ceil(2));
        for chunk in level.chunks(2) {
            let left = &chunk[0];
            let parent = match (chunk.get(1), policy) {
                (Some(right), _) => hash_sorted_pair(left, right),
                (None, OddNodePolicy::Duplicate) => hash_sorted_pair(left, left),
                (None, OddNodePolicy::Promote) => *left,
            };
            next_level.push(parent);
        }

        layers.push(next_level);
    }

    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::verify_membership;

    fn addr(last: u8) -> Address {
        let mut bytes = [0xAA; 20];
        bytes[19] = last;
        Address::from_bytes(bytes)
    }

    #[test]
    fn test_empty_whitelist_rejected() {
        assert_eq!(
            MembershipTree::build(&[]).unwrap_err(),
            TreeError::EmptyWhitelist
        );
    }

    #[test]
    fn test_single_leaf_root_is_leaf() {
        let tree = MembershipTree::build(&[addr(1)]).unwrap();
        assert_eq!(tree.root(), leaf_hash(&addr(1)));
        assert_eq!(tree.depth(), 0);

        let proof = tree.prove(&addr(1)).unwrap();
        assert!(proof.is_empty());
        assert!(tree.verify(&proof));
    }

    #[test]
    fn test_two_leaves_root() {
        let tree = MembershipTree::build(&[addr(1), addr(2)]).unwrap();
        let expected = hash_sorted_pair(&leaf_hash(&addr(1)), &leaf_hash(&addr(2)));
        assert_eq!(tree.root(), expected);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn test_three_leaves_duplicate_policy() {
        let tree = MembershipTree::build(&[addr(1), addr(2), addr(3)]).unwrap();
        let (l1, l2, l3) = (leaf_hash(&addr(1)), leaf_hash(&addr(2)), leaf_hash(&addr(3)));
        let expected = hash_sorted_pair(&hash_sorted_pair(&l1, &l2), &hash_sorted_pair(&l3, &l3));
        assert_eq!(tree.root(), expected);

        // The odd leaf's first step is its own hash
        let proof = tree.prove(&addr(3)).unwrap();
        assert_eq!(proof.len(), 2);
        assert_eq!(proof.steps[0].sibling, l3);
        assert_eq!(proof.steps[1].sibling, hash_sorted_pair(&l1, &l2));
        assert_eq!(proof.steps[1].side, Side::Left);
    }

    #[test]
    fn test_three_leaves_promote_policy() {
        let tree =
            MembershipTree::build_with_policy(&[addr(1), addr(2), addr(3)], OddNodePolicy::Promote)
                .unwrap();
        let (l1, l2, l3) = (leaf_hash(&addr(1)), leaf_hash(&addr(2)), leaf_hash(&addr(3)));
        assert_eq!(tree.root(), hash_sorted_pair(&hash_sorted_pair(&l1, &l2), &l3));

        // The promoted leaf skips the bottom level
        let proof = tree.prove(&addr(3)).unwrap();
        assert_eq!(proof.len(), 1);
        assert!(tree.verify(&proof));
    }

    #[test]
    fn test_policies_agree_on_power_of_two() {
        let list: Vec<Address> = (1..=8).map(addr).collect();
        let dup = MembershipTree::build_with_policy(&list, OddNodePolicy::Duplicate).unwrap();
        let promote = MembershipTree::build_with_policy(&list, OddNodePolicy::Promote).unwrap();
        assert_eq!(dup.root(), promote.root());
    }

    #[test]
    fn test_prove_records_sides() {
        let tree = MembershipTree::build(&[addr(1), addr(2), addr(3), addr(4)]).unwrap();
        let proof = tree.prove(&addr(2)).unwrap();
        assert_eq!(proof.leaf_index, 1);
        assert_eq!(proof.steps[0].side, Side::Left);
        assert_eq!(proof.steps[0].sibling, leaf_hash(&addr(1)));
        assert_eq!(proof.steps[1].side, Side::Right);
    }

    #[test]
    fn test_prove_not_found() {
        let tree = MembershipTree::build(&[addr(1), addr(2), addr(3)]).unwrap();
        assert!(tree.prove(&addr(4)).is_none());
        assert!(!tree.contains(&addr(4)));
        assert_eq!(tree.leaf_index(&addr(4)), None);
    }

    #[test]
    fn test_duplicates_prove_first_occurrence() {
        let tree = MembershipTree::build(&[addr(1), addr(2), addr(1)]).unwrap();
        assert_eq!(tree.len(), 3);
        let proof = tree.prove(&addr(1)).unwrap();
        assert_eq!(proof.leaf_index, 0);
        assert!(tree.verify(&proof));
    }

    #[test]
    fn test_every_member_verifies_for_many_sizes() {
        for policy in [OddNodePolicy::Duplicate, OddNodePolicy::Promote] {
            for size in 1..=17u8 {
                let list: Vec<Address> = (0..size).map(addr).collect();
                let tree = MembershipTree::build_with_policy(&list, policy).unwrap();
                for member in &list {
                    let proof = tree.prove(member).unwrap();
                    assert!(
                        verify_membership(member, &proof.siblings(), &tree.root()),
                        "size {size} policy {policy} member {member}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_policy_parse_and_display() {
        assert_eq!("duplicate".parse::<OddNodePolicy>(), Ok(OddNodePolicy::Duplicate));
        assert_eq!("PROMOTE".parse::<OddNodePolicy>(), Ok(OddNodePolicy::Promote));
        assert!("sideways".parse::<OddNodePolicy>().is_err());
        assert_eq!(OddNodePolicy::Promote.to_string(), "promote");
    }

    #[test]
    fn test_tree_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MembershipTree>();
    }
}

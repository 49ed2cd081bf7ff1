//! # Whitelist Proof Library
//!
//! Membership proofs for a whitelist-only NFT sale.
//! Commits to a fixed list of addresses with a Keccak-256 Merkle tree
//! (sorted pairs, as verified by OpenZeppelin's `MerkleProof`) and produces:
//! - the root to compare against the contract's published root
//! - per-address sibling proofs passed to `mint(bytes32[])`
//! - a tree-independent verifier matching the on-chain check

pub mod address;
pub mod hashing;
pub mod proof;
pub mod root;
pub mod tree;
pub mod whitelist;

pub use address::{Address, AddressError};
pub use hashing::{
    format_hash, hash_sorted_pair, keccak256, leaf_hash, parse_hash, HashParseError,
};
pub use proof::{verify_membership, MembershipProof, ProofStep, Side};
pub use root::RootStatus;
pub use tree::{MembershipTree, OddNodePolicy, TreeError};
pub use whitelist::{
    load_whitelist, parse_whitelist, sample_whitelist, WhitelistError, SAMPLE_WHITELIST,
};

//! Test Vector Generator
//!
//! Generates JSON test vectors for the whitelist sale contract's Solidity tests.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use whitelist_proof::{
    format_hash, load_whitelist, sample_whitelist, Address, MembershipTree, OddNodePolicy,
};

#[derive(Parser, Debug)]
#[command(name = "generate-test-vectors")]
#[command(about = "Generate test vectors for whitelist mint Solidity tests")]
struct Args {
    /// Output directory for test vectors
    #[arg(short, long, default_value = "../../contracts/test-vectors")]
    output: PathBuf,

    /// Whitelist file; the built-in sample is used if unset
    #[arg(long, env = "WHITELIST_PATH")]
    whitelist: Option<PathBuf>,

    /// How an unpaired node is carried to the next level
    #[arg(long, default_value_t = OddNodePolicy::Duplicate)]
    odd_node_policy: OddNodePolicy,
}

/// Test vector file format
#[derive(Debug, Serialize)]
struct TestVectorFile {
    /// Root to deploy the contract with
    root: String,
    /// Odd-node policy the root was built with
    odd_node_policy: OddNodePolicy,
    /// Number of whitelist entries, duplicates included
    members: usize,
    /// Valid claims with proofs
    claims: Vec<TestClaim>,
    /// Invalid claims for negative testing
    invalid_claims: Vec<InvalidTestClaim>,
}

/// A valid test claim
#[derive(Debug, Serialize)]
struct TestClaim {
    account: String,
    leaf: String,
    leaf_index: usize,
    proof: Vec<String>,
}

/// An invalid test claim for negative testing
#[derive(Debug, Serialize)]
struct InvalidTestClaim {
    description: String,
    account: String,
    proof: Vec<String>,
    expected_error: String,
}

const INVALID_PROOF: &str = "InvalidProof";

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    tracing::info!(
        output = %args.output.display(),
        policy = %args.odd_node_policy,
        "Generating test vectors"
    );

    let addresses = match &args.whitelist {
        Some(path) => load_whitelist(path)?,
        None => sample_whitelist()?,
    };
    let tree = MembershipTree::build_with_policy(&addresses, args.odd_node_policy)?;
    let vectors = generate(&tree);

    let output_path = write_vectors(&args.output, &vectors)?;

    tracing::info!(
        path = %output_path.display(),
        claims = vectors.claims.len(),
        invalid_claims = vectors.invalid_claims.len(),
        root = %vectors.root,
        "Wrote test vectors"
    );

    Ok(())
}

fn generate(tree: &MembershipTree) -> TestVectorFile {
    let mut seen = HashSet::new();
    let claims: Vec<TestClaim> = tree
        .addresses()
        .iter()
        .filter(|address| seen.insert(**address))
        .filter_map(|address| tree.prove(address))
        .map(|proof| TestClaim {
            account: proof.address.to_string(),
            leaf: format_hash(&proof.leaf),
            leaf_index: proof.leaf_index,
            proof: proof.hex_siblings(),
        })
        .collect();

    TestVectorFile {
        root: format_hash(&tree.root()),
        odd_node_policy: tree.policy(),
        members: tree.len(),
        invalid_claims: invalid_claims(tree, &claims),
        claims,
    }
}

fn invalid_claims(tree: &MembershipTree, claims: &[TestClaim]) -> Vec<InvalidTestClaim> {
    let mut invalid = Vec::new();
    let Some(first) = claims.first() else {
        return invalid;
    };

    invalid.push(InvalidTestClaim {
        description: "Non-member presenting a member's proof".to_string(),
        account: outsider(tree).to_string(),
        proof: first.proof.clone(),
        expected_error: INVALID_PROOF.to_string(),
    });

    // Trees of one member have empty proofs; nothing to tamper with
    if let Some(claim) = claims.iter().find(|c| !c.proof.is_empty()) {
        let mut tampered = claim.proof.clone();
        tampered[0] = flip_last_nibble(&tampered[0]);
        invalid.push(InvalidTestClaim {
            description: "Member with one sibling altered".to_string(),
            account: claim.account.clone(),
            proof: tampered,
            expected_error: INVALID_PROOF.to_string(),
        });

        let mut truncated = claim.proof.clone();
        truncated.pop();
        invalid.push(InvalidTestClaim {
            description: "Member with the last sibling dropped".to_string(),
            account: claim.account.clone(),
            proof: truncated,
            expected_error: INVALID_PROOF.to_string(),
        });
    }

    invalid
}

/// First address counting down from all-ones that is not whitelisted
///
/// Ends within `tree.len() + 1` steps.
fn outsider(tree: &MembershipTree) -> Address {
    let mut bytes = [0xff; 20];
    while tree.contains(&Address::from_bytes(bytes)) {
        decrement(&mut bytes);
    }
    Address::from_bytes(bytes)
}

/// Big-endian decrement with borrow
fn decrement(bytes: &mut [u8; 20]) {
    for byte in bytes.iter_mut().rev() {
        let (value, borrow) = byte.overflowing_sub(1);
        *byte = value;
        if !borrow {
            break;
        }
    }
}

fn flip_last_nibble(hash: &str) -> String {
    let mut chars: Vec<char> = hash.chars().collect();
    if let Some(last) = chars.last_mut() {
        *last = if *last == '0' { '1' } else { '0' };
    }
    chars.into_iter().collect()
}

fn write_vectors(dir: &Path, vectors: &TestVectorFile) -> Result<PathBuf> {
    // Ensure output directory exists
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let output_path = dir.join("test_vectors.json");
    let json = serde_json::to_string_pretty(vectors)?;
    std::fs::write(&output_path, json)?;
    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use whitelist_proof::{parse_hash, verify_membership};

    fn decode(proof: &[String]) -> Vec<[u8; 32]> {
        proof.iter().map(|h| parse_hash(h).unwrap()).collect()
    }

    fn sample_tree() -> MembershipTree {
        MembershipTree::build(&sample_whitelist().unwrap()).unwrap()
    }

    #[test]
    fn test_valid_claims_verify() {
        let tree = sample_tree();
        let vectors = generate(&tree);

        assert_eq!(vectors.claims.len(), 15);
        assert_eq!(vectors.root, format_hash(&tree.root()));
        for claim in &vectors.claims {
            let account = Address::parse(&claim.account).unwrap();
            assert!(verify_membership(&account, &decode(&claim.proof), &tree.root()));
        }
    }

    #[test]
    fn test_invalid_claims_fail() {
        let tree = sample_tree();
        let vectors = generate(&tree);

        assert_eq!(vectors.invalid_claims.len(), 3);
        for claim in &vectors.invalid_claims {
            let account = Address::parse(&claim.account).unwrap();
            assert!(
                !verify_membership(&account, &decode(&claim.proof), &tree.root()),
                "{}",
                claim.description
            );
        }
    }

    #[test]
    fn test_duplicates_yield_one_claim() {
        let a = Address::from_bytes([0x01; 20]);
        let b = Address::from_bytes([0x02; 20]);
        let tree = MembershipTree::build(&[a, b, a]).unwrap();
        let vectors = generate(&tree);

        assert_eq!(vectors.members, 3);
        assert_eq!(vectors.claims.len(), 2);
        assert_eq!(vectors.claims[0].leaf_index, 0);
    }

    #[test]
    fn test_single_member_has_only_borrowed_proof_case() {
        let tree = MembershipTree::build(&[Address::from_bytes([0xff; 20])]).unwrap();
        let vectors = generate(&tree);

        assert_eq!(vectors.claims.len(), 1);
        assert!(vectors.claims[0].proof.is_empty());
        assert_eq!(vectors.invalid_claims.len(), 1);
        assert_ne!(vectors.invalid_claims[0].account, vectors.claims[0].account);
    }

    #[test]
    fn test_outsider_borrows_across_bytes() {
        // Every address ending in 0xff..ff00 through 0xff..ffff is whitelisted
        let list: Vec<Address> = (0..=255u8)
            .map(|last| {
                let mut bytes = [0xff; 20];
                bytes[19] = last;
                Address::from_bytes(bytes)
            })
            .collect();
        let tree = MembershipTree::build(&list).unwrap();

        let mut expected = [0xff; 20];
        expected[18] = 0xfe;
        assert_eq!(outsider(&tree), Address::from_bytes(expected));
        assert!(!tree.contains(&outsider(&tree)));
    }

    #[test]
    fn test_write_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let vectors = generate(&sample_tree());

        let path = write_vectors(&dir.path().join("out"), &vectors).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written["root"], vectors.root.as_str());
        assert_eq!(written["odd_node_policy"], "duplicate");
    }
}

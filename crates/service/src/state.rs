//! Shared Application State
//!
//! The membership tree is built once at startup and shared read-only.
//! Only the on-chain root and bookkeeping counters change at runtime.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use whitelist_proof::{Address, MembershipProof, MembershipTree, RootStatus};

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

#[derive(Debug)]
struct AppStateInner {
    /// Immutable whitelist commitment
    tree: Arc<MembershipTree>,
    /// Root last read from the contract
    onchain_root: RwLock<Option<[u8; 32]>>,
    /// Proofs handed out
    proofs_served: AtomicU64,
    /// Lookups for addresses outside the whitelist
    not_found: AtomicU64,
    /// Service start time
    start_time: std::time::Instant,
    /// Last error message
    last_error: RwLock<Option<String>>,
}

impl AppState {
    /// Create new application state around a built tree
    #[must_use]
    pub fn new(tree: Arc<MembershipTree>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                tree,
                onchain_root: RwLock::new(None),
                proofs_served: AtomicU64::new(0),
                not_found: AtomicU64::new(0),
                start_time: std::time::Instant::now(),
                last_error: RwLock::new(None),
            }),
        }
    }

    /// The whitelist tree
    #[must_use]
    pub fn tree(&self) -> &MembershipTree {
        &self.inner.tree
    }

    /// Locally computed root
    #[must_use]
    pub fn local_root(&self) -> [u8; 32] {
        self.inner.tree.root()
    }

    /// Root last read from the contract
    #[must_use]
    pub fn onchain_root(&self) -> Option<[u8; 32]> {
        *self.inner.onchain_root.read()
    }

    /// Record the root read from the contract
    pub fn set_onchain_root(&self, root: Option<[u8; 32]>) {
        *self.inner.onchain_root.write() = root;
        let mismatch = self.root_status().is_mismatch();
        metrics::gauge!("whitelist_root_mismatch").set(if mismatch { 1.0 } else { 0.0 });
    }

    /// Agreement between local and on-chain roots
    #[must_use]
    pub fn root_status(&self) -> RootStatus {
        RootStatus::compare(&self.local_root(), self.onchain_root().as_ref())
    }

    /// Healthy unless the contract holds a different root
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        !self.root_status().is_mismatch()
    }

    /// Look up a proof and count the outcome
    #[must_use]
    pub fn prove(&self, address: &Address) -> Option<MembershipProof> {
        let proof = self.inner.tree.prove(address);
        if proof.is_some() {
            self.inner.proofs_served.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("whitelist_proofs_served_total").increment(1);
        } else {
            self.inner.not_found.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("whitelist_proof_not_found_total").increment(1);
        }
        proof
    }

    /// Proof lookup counts
    #[must_use]
    pub fn lookup_counts(&self) -> LookupCounts {
        LookupCounts {
            proofs_served: self.inner.proofs_served.load(Ordering::Relaxed),
            not_found: self.inner.not_found.load(Ordering::Relaxed),
        }
    }

    /// Get uptime in seconds
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    /// Set last error
    pub fn set_error(&self, error: Option<String>) {
        *self.inner.last_error.write() = error;
    }

    /// Get last error
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.read().clone()
    }
}

/// Counts of proof lookups by outcome
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LookupCounts {
    pub proofs_served: u64,
    pub not_found: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        let list: Vec<Address> = (1..=3u8)
            .map(|i| {
                let mut bytes = [0xAA; 20];
                bytes[19] = i;
                Address::from_bytes(bytes)
            })
            .collect();
        AppState::new(Arc::new(MembershipTree::build(&list).unwrap()))
    }

    #[test]
    fn test_app_state_root_status() {
        let state = test_state();
        assert_eq!(state.root_status(), RootStatus::Unknown);
        assert!(state.is_healthy());

        state.set_onchain_root(Some(state.local_root()));
        assert_eq!(state.root_status(), RootStatus::Match);
        assert!(state.is_healthy());

        state.set_onchain_root(Some([0u8; 32]));
        assert!(state.root_status().is_mismatch());
        assert!(!state.is_healthy());
    }

    #[test]
    fn test_lookup_counting() {
        let state = test_state();
        let member = state.tree().addresses()[0];

        assert!(state.prove(&member).is_some());
        assert!(state.prove(&member).is_some());
        assert!(state.prove(&Address::ZERO).is_none());

        let counts = state.lookup_counts();
        assert_eq!(counts.proofs_served, 2);
        assert_eq!(counts.not_found, 1);
    }

    #[test]
    fn test_clones_share_state() {
        let state = test_state();
        let clone = state.clone();
        clone.set_error(Some("rpc down".to_string()));
        assert_eq!(state.last_error().as_deref(), Some("rpc down"));
    }
}

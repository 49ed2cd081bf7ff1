//! On-chain Root Watcher
//!
//! Periodically reads the contract's whitelist root and flags disagreement
//! with the locally built tree.

use crate::minter::Minter;
use crate::state::AppState;
use anyhow::Result;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use whitelist_proof::{format_hash, RootStatus};

/// Watcher configuration
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Polling interval
    pub poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
        }
    }
}

/// Contract root watcher
pub struct RootWatcher {
    config: WatcherConfig,
    minter: Minter,
    state: AppState,
}

impl RootWatcher {
    /// Create a new watcher
    pub fn new(config: WatcherConfig, minter: Minter, state: AppState) -> Self {
        Self {
            config,
            minter,
            state,
        }
    }

    /// Run the watcher loop
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<()> {
        info!(
            interval_secs = self.config.poll_interval.as_secs(),
            "Starting on-chain root watcher"
        );

        loop {
            self.tick().await;
            sleep(self.config.poll_interval).await;
        }
    }

    /// One loop iteration: poll and record the outcome in shared state
    pub async fn tick(&self) -> Option<RootStatus> {
        match self.poll_once().await {
            Ok(status) => {
                self.state.set_error(None);
                Some(status)
            }
            Err(e) => {
                error!(error = %e, "Root poll failed");
                self.state.set_error(Some(e.to_string()));
                None
            }
        }
    }

    /// Single poll iteration
    pub async fn poll_once(&self) -> Result<RootStatus> {
        let onchain = self.minter.onchain_root().await?;
        let previous = self.state.root_status();
        self.state.set_onchain_root(Some(onchain));

        let status = self.state.root_status();
        if status != previous {
            match status {
                RootStatus::Mismatch { local, onchain } => warn!(
                    local = %format_hash(&local),
                    onchain = %format_hash(&onchain),
                    "Local whitelist root disagrees with contract; proofs will be rejected"
                ),
                _ => info!(status = status.as_str(), "On-chain root checked"),
            }
        }

        Ok(status)
    }
}

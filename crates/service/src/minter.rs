//! Whitelist Minter
//!
//! Reads claim state and the published root from the sale contract and
//! submits `mint(proof)` for the configured signer.

use alloy::{
    network::EthereumWallet,
    primitives::{Address, FixedBytes, B256, U256},
    providers::{Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    sol,
};
use anyhow::{Context, Result};
use std::fmt;
use tracing::{debug, info, instrument, warn};
use whitelist_proof::{format_hash, MembershipTree, RootStatus};

// Generate contract bindings from ABI
sol! {
    #[sol(rpc)]
    contract WhitelistNft {
        function mint(bytes32[] calldata proof) external payable;
        function claimed(address account) external view returns (bool);
        function merkleRoot() external view returns (bytes32);
    }
}

/// Minter configuration
#[derive(Debug, Clone)]
pub struct MinterConfig {
    /// JSON-RPC URL
    pub rpc_url: String,
    /// Sale contract address
    pub contract_address: String,
    /// Private key for signing transactions (hex, 0x prefix optional)
    pub private_key: Option<String>,
    /// Required chain id, if any
    pub expected_chain_id: Option<u64>,
    /// Value sent with `mint` in wei
    pub mint_price_wei: u128,
    /// Max gas price in Gwei
    pub max_gas_price_gwei: u64,
    /// Wait for confirmations (0 = don't wait)
    pub confirmations: u64,
}

/// Result of a mint attempt that reached the contract or was ruled out before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintOutcome {
    /// Transaction sent (and confirmed, if confirmations were requested)
    Minted { tx_hash: B256 },
    /// The signer already used its whitelist mint
    AlreadyClaimed,
    /// The signer is not in the whitelist
    NotWhitelisted,
    /// The contract holds a different root, so the proof would be rejected
    RootMismatch { local: [u8; 32], onchain: [u8; 32] },
}

impl fmt::Display for MintOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minted { tx_hash } => write!(f, "Minted whitelist NFT in transaction {tx_hash}"),
            Self::AlreadyClaimed => f.write_str("Whitelist mint already claimed for this address"),
            Self::NotWhitelisted => f.write_str("Address is not in the whitelist"),
            Self::RootMismatch { local, onchain } => write!(
                f,
                "Local whitelist root {} does not match contract root {}",
                format_hash(local),
                format_hash(onchain)
            ),
        }
    }
}

/// Sale contract client
pub struct Minter {
    config: MinterConfig,
    contract_address: Address,
    rpc_url: reqwest::Url,
    signer: Option<PrivateKeySigner>,
}

impl Minter {
    /// Create a new minter (read-only, no signer)
    pub fn new(config: MinterConfig) -> Result<Self> {
        let contract_address: Address = config
            .contract_address
            .parse()
            .context("Invalid contract address")?;
        let rpc_url: reqwest::Url = config.rpc_url.parse().context("Invalid RPC URL")?;

        Ok(Self {
            config,
            contract_address,
            rpc_url,
            signer: None,
        })
    }

    /// Create a minter with a signer (can submit transactions)
    pub fn with_signer(config: MinterConfig) -> Result<Self> {
        let private_key = config
            .private_key
            .clone()
            .context("Private key required for signing")?;

        let mut minter = Self::new(config)?;

        let key_hex = private_key.strip_prefix("0x").unwrap_or(&private_key);
        let signer: PrivateKeySigner = key_hex.parse().context("Invalid private key")?;

        info!(
            address = %signer.address(),
            "Minter initialized with signer"
        );

        minter.signer = Some(signer);
        Ok(minter)
    }

    /// Get the signer address (if configured)
    pub fn signer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    /// Reject the RPC endpoint if it serves a chain other than the expected one
    #[instrument(skip(self))]
    pub async fn check_chain(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());
        let chain_id = provider.get_chain_id().await.context("Failed to read chain id")?;

        if let Some(expected) = self.config.expected_chain_id {
            if chain_id != expected {
                anyhow::bail!("Connected to chain {chain_id}, expected chain {expected}");
            }
        }

        debug!(chain_id, "Chain check passed");
        Ok(chain_id)
    }

    /// Check if an address has already claimed its whitelist mint
    #[instrument(skip(self))]
    pub async fn is_claimed(&self, account: Address) -> Result<bool> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());

        let contract = WhitelistNft::new(self.contract_address, &provider);
        let claimed: bool = contract
            .claimed(account)
            .call()
            .await
            .context("Failed to read claimed status")?;

        debug!(%account, claimed, "Checked claim status");
        Ok(claimed)
    }

    /// Read the whitelist root published by the contract
    #[instrument(skip(self))]
    pub async fn onchain_root(&self) -> Result<[u8; 32]> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());

        let contract = WhitelistNft::new(self.contract_address, &provider);
        let root: B256 = contract
            .merkleRoot()
            .call()
            .await
            .context("Failed to read merkle root")?;

        Ok(root.0)
    }

    /// Run the whitelist mint for the configured signer
    ///
    /// Non-eligibility is reported as a [`MintOutcome`], not an error.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Minter not configured with signer
    /// - Chain id differs from the expected one
    /// - Gas price exceeds configured maximum
    /// - An RPC call fails or the transaction reverts
    #[instrument(skip(self, tree))]
    pub async fn mint(&self, tree: &MembershipTree) -> Result<MintOutcome> {
        let signer = self
            .signer
            .as_ref()
            .context("Minter not configured with signer")?;
        let account = signer.address();

        self.check_chain().await?;

        if self.is_claimed(account).await? {
            info!(%account, "Whitelist mint already claimed");
            return Ok(MintOutcome::AlreadyClaimed);
        }

        let Some(proof) = tree.prove(&whitelist_proof::Address::from_bytes(account.0 .0)) else {
            info!(%account, "Address not whitelisted");
            return Ok(MintOutcome::NotWhitelisted);
        };

        // Contracts without a root getter are not an error; the mint itself decides
        match self.onchain_root().await {
            Ok(onchain) => {
                if let RootStatus::Mismatch { local, onchain } =
                    RootStatus::compare(&tree.root(), Some(&onchain))
                {
                    warn!(
                        local = %format_hash(&local),
                        onchain = %format_hash(&onchain),
                        "Whitelist root mismatch, not sending mint"
                    );
                    return Ok(MintOutcome::RootMismatch { local, onchain });
                }
            }
            Err(e) => warn!(error = %e, "Could not read on-chain root, skipping root check"),
        }

        // Build provider with wallet
        let wallet = EthereumWallet::from(signer.clone());
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(self.rpc_url.clone());

        // Check current gas price
        let gas_price = provider.get_gas_price().await?;
        let max_gas_price_wei =
            U256::from(self.config.max_gas_price_gwei) * U256::from(1_000_000_000);
        if U256::from(gas_price) > max_gas_price_wei {
            anyhow::bail!(
                "Gas price {} gwei exceeds maximum {} gwei",
                gas_price / 1_000_000_000,
                self.config.max_gas_price_gwei
            );
        }

        let contract = WhitelistNft::new(self.contract_address, &provider);
        let proof_words: Vec<FixedBytes<32>> = proof
            .siblings()
            .into_iter()
            .map(FixedBytes::<32>::from)
            .collect();

        info!(
            %account,
            leaf_index = proof.leaf_index,
            proof_len = proof_words.len(),
            "Submitting whitelist mint"
        );

        let pending_tx = contract
            .mint(proof_words)
            .value(U256::from(self.config.mint_price_wei))
            .send()
            .await
            .context("Failed to send transaction")?;
        let tx_hash = *pending_tx.tx_hash();

        info!(tx_hash = %tx_hash, "Transaction submitted");
        metrics::counter!("whitelist_mints_submitted_total").increment(1);

        // Wait for confirmations if configured
        if self.config.confirmations > 0 {
            debug!(
                confirmations = self.config.confirmations,
                "Waiting for confirmations"
            );
            let receipt = pending_tx
                .with_required_confirmations(self.config.confirmations)
                .get_receipt()
                .await
                .context("Failed to get transaction receipt")?;

            if !receipt.status() {
                anyhow::bail!("Transaction reverted: {}", tx_hash);
            }

            info!(
                tx_hash = %tx_hash,
                gas_used = receipt.gas_used,
                "Transaction confirmed"
            );
        }

        Ok(MintOutcome::Minted { tx_hash })
    }
}

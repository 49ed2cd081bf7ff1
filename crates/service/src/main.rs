//! Whitelist Mint Service
//!
//! Proof-serving API, on-chain root watcher, and whitelist minter.

mod api;
mod minter;
mod state;
mod watcher;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use whitelist_proof::{
    format_hash, load_whitelist, sample_whitelist, Address, MembershipTree, OddNodePolicy,
    RootStatus,
};

#[derive(Parser, Debug)]
#[command(name = "whitelist-service")]
#[command(about = "Merkle whitelist proofs and minting for the NFT sale contract")]
struct Args {
    /// Whitelist file (JSON array or one address per line); built-in sample if unset
    #[arg(long, env = "WHITELIST_PATH")]
    whitelist_path: Option<PathBuf>,

    /// How an unpaired node is carried to the next level
    #[arg(long, env = "ODD_NODE_POLICY", default_value_t = OddNodePolicy::Duplicate)]
    odd_node_policy: OddNodePolicy,

    /// Ethereum RPC URL
    #[arg(long, env = "RPC_URL", default_value = "http://localhost:8545")]
    rpc_url: String,

    /// Sale contract address
    #[arg(long, env = "CONTRACT_ADDRESS")]
    contract_address: Option<String>,

    /// Private key for transaction signing (hex, 0x prefix optional)
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Refuse to talk to any other chain
    #[arg(long, env = "CHAIN_ID")]
    chain_id: Option<u64>,

    /// Value sent with the mint call, in wei
    #[arg(long, env = "MINT_PRICE_WEI", default_value_t = 0)]
    mint_price_wei: u128,

    /// Max gas price in Gwei
    #[arg(long, env = "MAX_GAS_PRICE_GWEI", default_value_t = 100)]
    max_gas_price_gwei: u64,

    /// Confirmations to wait for after sending (0 = don't wait)
    #[arg(long, env = "CONFIRMATIONS", default_value_t = 1)]
    confirmations: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve proofs over HTTP and watch the contract root
    Serve {
        /// API listen address
        #[arg(long, default_value = "0.0.0.0:8080")]
        listen: String,

        /// Metrics listen address
        #[arg(long, default_value = "0.0.0.0:9090")]
        metrics_listen: SocketAddr,

        /// Seconds between on-chain root reads
        #[arg(long, env = "ROOT_POLL_SECS", default_value_t = 30)]
        root_poll_secs: u64,
    },
    /// Mint with the configured signer
    Mint,
    /// Print the local root and compare it with the contract
    Root,
    /// Print the proof for an address as JSON
    Prove {
        /// Address to prove
        address: Address,
    },
}

impl Args {
    fn minter_config(&self) -> Option<minter::MinterConfig> {
        let contract_address = self.contract_address.clone()?;
        Some(minter::MinterConfig {
            rpc_url: self.rpc_url.clone(),
            contract_address,
            private_key: self.private_key.clone(),
            expected_chain_id: self.chain_id,
            mint_price_wei: self.mint_price_wei,
            max_gas_price_gwei: self.max_gas_price_gwei,
            confirmations: self.confirmations,
        })
    }

    fn build_tree(&self) -> Result<MembershipTree> {
        let addresses = match &self.whitelist_path {
            Some(path) => load_whitelist(path)
                .with_context(|| format!("Failed to load whitelist from {}", path.display()))?,
            None => {
                tracing::warn!("WHITELIST_PATH not set, using built-in sample whitelist");
                sample_whitelist()?
            }
        };

        let tree = MembershipTree::build_with_policy(&addresses, self.odd_node_policy)?;
        tracing::info!(
            members = tree.len(),
            depth = tree.depth(),
            policy = %tree.policy(),
            root = %format_hash(&tree.root()),
            "Whitelist tree built"
        );
        Ok(tree)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let tree = Arc::new(args.build_tree()?);

    match &args.command {
        Command::Serve {
            listen,
            metrics_listen,
            root_poll_secs,
        } => serve(&args, tree, listen.clone(), *metrics_listen, *root_poll_secs).await,
        Command::Mint => {
            let config = args
                .minter_config()
                .context("CONTRACT_ADDRESS is required to mint")?;
            let minter = minter::Minter::with_signer(config)?;
            let outcome = minter.mint(&tree).await?;
            println!("{outcome}");
            Ok(())
        }
        Command::Root => {
            println!("local root:    {}", format_hash(&tree.root()));
            if let Some(config) = args.minter_config() {
                let onchain = minter::Minter::new(config)?.onchain_root().await?;
                println!("on-chain root: {}", format_hash(&onchain));
                let status = RootStatus::compare(&tree.root(), Some(&onchain));
                println!("{}", status.describe());
            }
            Ok(())
        }
        Command::Prove { address } => {
            let proof = tree
                .prove(address)
                .with_context(|| format!("{address} is not whitelisted"))?;
            println!("{}", serde_json::to_string_pretty(&proof)?);
            Ok(())
        }
    }
}

async fn serve(
    args: &Args,
    tree: Arc<MembershipTree>,
    listen: String,
    metrics_listen: SocketAddr,
    root_poll_secs: u64,
) -> Result<()> {
    tracing::info!("Starting whitelist service");
    tracing::info!(listen = %listen, "API server");

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(metrics_listen)
        .install()
        .context("Failed to install Prometheus exporter")?;
    tracing::info!(listen = %metrics_listen, "Metrics exporter");

    // Initialize application state
    let app_state = state::AppState::new(tree);

    // Start API server
    let api_handle = tokio::spawn(api::run_server(listen, app_state.clone()));

    // Watch the contract root when a contract is configured
    let watcher_handle = match args.minter_config() {
        Some(config) => {
            let minter = minter::Minter::new(config)?;
            let watcher = watcher::RootWatcher::new(
                watcher::WatcherConfig {
                    poll_interval: Duration::from_secs(root_poll_secs),
                },
                minter,
                app_state.clone(),
            );
            Some(tokio::spawn(async move { watcher.run().await }))
        }
        None => {
            tracing::warn!("CONTRACT_ADDRESS not set, on-chain root is not checked");
            None
        }
    };

    // Wait for shutdown
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
        result = api_handle => {
            match result {
                Ok(Err(e)) => tracing::error!(error = %e, "API server error"),
                Err(e) => tracing::error!(error = %e, "API server task failed"),
                Ok(Ok(())) => {}
            }
        }
    }

    if let Some(handle) = watcher_handle {
        handle.abort();
    }

    Ok(())
}

//! Privacy relay operator CLI.
//!
//! # Architecture Overview
//!
//! ```text
//!   config file / RELAY_* env
//!          │
//!          ▼
//!   ┌──────────────┐     ┌──────────────────┐     ┌─────────────┐
//!   │ config loader│────▶│ BlockchainClient │────▶│ JSON-RPC    │
//!   └──────────────┘     │ (failover)       │     │ endpoints   │
//!                        └────────┬─────────┘     └─────────────┘
//!                                 │
//!              ┌──────────────────┼──────────────────┐
//!              ▼                  ▼                  ▼
//!      ChunkedLogProvider   AlloyChainAccess    FileSessionStore
//!      (logs)               (readiness, wrap)   (session)
//! ```
//!
//! Confidential-engine operations need an engine implementation and are
//! driven through [`privacy_relay::PrivacyClient`] by embedding applications.

use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::{BlockNumberOrTag, Filter};
use clap::{Parser, Subcommand};

use privacy_relay::blockchain::{AlloyChainAccess, BlockchainClient, ChainAccess, Wallet};
use privacy_relay::config::{load_config, ConfigError, RelayConfig};
use privacy_relay::observability::logging::init_logging;
use privacy_relay::observability::metrics::init_metrics;
use privacy_relay::observability::TracingTelemetry;
use privacy_relay::rpc::ChunkedLogProvider;
use privacy_relay::session::{FileSessionStore, SessionStore};
use privacy_relay::shield::check_readiness;

#[derive(Parser)]
#[command(name = "privacy-relay")]
#[command(about = "Operator CLI for the privacy relay", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults plus RELAY_* overrides when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Raise the log filter to debug.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and print the effective configuration
    CheckConfig,
    /// Print the current block number
    BlockNumber,
    /// Fetch logs over a block range in bounded windows
    Logs {
        #[arg(long)]
        address: Address,
        #[arg(long)]
        from_block: u64,
        /// Defaults to the latest block
        #[arg(long)]
        to_block: Option<u64>,
        /// Event signature hash to match as topic 0
        #[arg(long)]
        topic0: Option<B256>,
    },
    /// Check whether the signer can shield `amount` of `token`
    Readiness {
        #[arg(long)]
        token: Address,
        #[arg(long)]
        amount: U256,
    },
    /// Wrap native currency into the configured wrapped token
    Wrap {
        #[arg(long)]
        amount: U256,
    },
    /// Inspect or clear the stored session
    Session {
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => privacy_relay::config::loader::config_from_env()?,
    };
    if cli.verbose {
        config.observability.verbose = true;
    }

    init_logging(&config.observability)?;
    tracing::info!(
        network = %config.network.name,
        chain_id = config.rpc.chain_id,
        "privacy-relay v0.1.0 starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    match cli.command {
        Commands::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::BlockNumber => {
            let client = BlockchainClient::new(config.rpc.clone()).await?;
            println!("{}", client.get_block_number().await?);
        }
        Commands::Logs {
            address,
            from_block,
            to_block,
            topic0,
        } => {
            let client = BlockchainClient::new(config.rpc.clone()).await?;
            let provider = ChunkedLogProvider::new(client, &config.log_chunker)
                .with_telemetry(Arc::new(TracingTelemetry));

            let mut filter = Filter::new()
                .address(address)
                .from_block(from_block)
                .to_block(to_block.map_or(BlockNumberOrTag::Latest, BlockNumberOrTag::Number));
            if let Some(topic) = topic0 {
                filter = filter.event_signature(topic);
            }

            let logs = provider.get_logs(&filter).await?;
            println!("{}", serde_json::to_string_pretty(&logs)?);
        }
        Commands::Readiness { token, amount } => {
            let chain = chain_access(&config).await?;
            let spender = shield_contract(&config)?;
            let readiness = check_readiness(
                &chain,
                token,
                spender,
                amount,
                U256::from(config.shield.min_gas_balance_wei),
            )
            .await?;
            println!("{:?}", readiness);
        }
        Commands::Wrap { amount } => {
            let chain = chain_access(&config).await?;
            let wrapped: Address = config
                .network
                .wrapped_token
                .parse()
                .map_err(|_| ConfigError::Missing("network.wrapped_token".to_string()))?;
            let submitted = chain
                .wrap_native(wrapped, amount, config.shield.confirmations)
                .await?;
            println!("{}", submitted.tx_hash);
        }
        Commands::Session { clear } => {
            let store = FileSessionStore::new(&config.session.storage_dir, &config.session.storage_key);
            if clear {
                store.clear()?;
                tracing::info!(path = %store.path().display(), "Stored session cleared");
            } else {
                match store.load()? {
                    Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                    None => println!("No stored session"),
                }
            }
        }
    }

    Ok(())
}

async fn chain_access(config: &RelayConfig) -> Result<AlloyChainAccess, Box<dyn std::error::Error>> {
    let client = BlockchainClient::new(config.rpc.clone()).await?;
    let wallet = Wallet::from_env(config.rpc.chain_id)?;
    Ok(AlloyChainAccess::new(client, wallet)?)
}

fn shield_contract(config: &RelayConfig) -> Result<Address, ConfigError> {
    config
        .network
        .shield_contract
        .as_deref()
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| ConfigError::Missing(format!("network.shield_contract for {}", config.network.name)))
}

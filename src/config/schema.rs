//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the privacy relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Blockchain RPC settings.
    pub rpc: BlockchainConfig,

    /// Log query chunking and retry policy.
    pub log_chunker: LogChunkerConfig,

    /// Confidential-transaction engine start parameters.
    pub engine: EngineConfig,

    /// Target network and its capability flags.
    pub network: NetworkConfig,

    /// Balance refresh debouncing.
    pub refresh: RefreshConfig,

    /// Shield transaction settings.
    pub shield: ShieldConfig,

    /// Private transfer and unshield settings.
    pub transact: TransactConfig,

    /// Persisted session location.
    pub session: SessionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Blockchain integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 11155111 for Sepolia, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 11_155_111,
            rpc_timeout_secs: 10,
        }
    }
}

/// Log query chunking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogChunkerConfig {
    /// Maximum inclusive block span of a single `eth_getLogs` request.
    pub max_range_blocks: u64,

    /// Retries per window after the first attempt.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Backoff ceiling in milliseconds (jitter is added on top).
    pub max_delay_ms: u64,

    /// Upper bound (exclusive) of the random jitter in milliseconds.
    pub jitter_ms: u64,

    /// Minimum pause between successful windows in milliseconds.
    pub pacing_min_ms: u64,

    /// Maximum pause between successful windows in milliseconds.
    pub pacing_max_ms: u64,
}

impl Default for LogChunkerConfig {
    fn default() -> Self {
        Self {
            max_range_blocks: 10,
            max_retries: 4,
            base_delay_ms: 1500,
            max_delay_ms: 8000,
            jitter_ms: 250,
            pacing_min_ms: 60,
            pacing_max_ms: 120,
        }
    }
}

/// Engine start parameters.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Wallet source tag (lowercase, no spaces, at most 16 chars).
    pub wallet_source: String,

    /// Path of the engine's encrypted wallet database.
    pub db_path: String,

    /// Proof of Innocence aggregator node URLs.
    pub poi_aggregator_urls: Vec<String>,

    /// Skip merkle-tree scans (shield-only deployments).
    pub skip_merkletree_scans: bool,

    /// Forward verbose scan logs from the engine.
    pub verbose_scan_logging: bool,

    /// Provider polling interval handed to the engine, in milliseconds.
    pub polling_interval_ms: u64,

    /// Attempts at bringing the engine up when a wallet connects.
    pub init_attempts: u32,

    /// Delay before the first initialization retry, doubling after that.
    pub init_retry_base_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wallet_source: "privacyrelay01".to_string(),
            db_path: "engine.db".to_string(),
            poi_aggregator_urls: Vec::new(),
            skip_merkletree_scans: false,
            verbose_scan_logging: false,
            polling_interval_ms: 5 * 60 * 1000,
            init_attempts: 3,
            init_retry_base_ms: 1000,
        }
    }
}

/// Target network configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Engine network name (e.g., "EthereumSepolia").
    pub name: String,

    /// Canonical shielding contract address. Shielding is refused when unset.
    pub shield_contract: Option<String>,

    /// Wrapped native token used to fund shields.
    pub wrapped_token: String,

    /// TXID tree version passed to the engine.
    pub txid_version: String,

    /// Proof of Innocence validation is incomplete on this network.
    pub poi_incomplete: bool,

    /// Secondary TXID sync is known to fail on this network.
    pub txid_sync_incomplete: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "EthereumSepolia".to_string(),
            shield_contract: Some("0xeCFCf3b4eC647c4Ca6D49108b311b7a7C9543fea".to_string()),
            wrapped_token: "0xfff9976782d46CC05630d1f6eBAb18b2324d6B14".to_string(),
            txid_version: "V2_PoseidonMerkle".to_string(),
            poi_incomplete: true,
            txid_sync_incomplete: true,
        }
    }
}

/// Balance refresh configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Minimum spacing between non-forced refreshes in milliseconds.
    pub debounce_ms: u64,

    /// Default wait for balance pushes after an engine refresh, in milliseconds.
    pub settle_delay_ms: u64,

    /// Soft watchdog on the unspent-output scan, in seconds.
    pub scan_watchdog_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 5000,
            settle_delay_ms: 2000,
            scan_watchdog_secs: 120,
        }
    }
}

/// Shield transaction configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShieldConfig {
    /// Confirmations awaited for approval and shield transactions.
    pub confirmations: u64,

    /// Delay before the diagnostic bucket re-query, in milliseconds.
    pub diagnostic_delay_ms: u64,

    /// Shield fee in basis points.
    pub fee_bps: u64,

    /// Native balance below which shielding reports insufficient gas.
    pub min_gas_balance_wei: u64,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            confirmations: 1,
            diagnostic_delay_ms: 5000,
            fee_bps: 25,
            min_gas_balance_wei: 10_000_000_000_000_000, // 0.01 ETH
        }
    }
}

/// Private transfer and unshield configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransactConfig {
    /// Confirmations awaited for transfer and unshield transactions.
    pub confirmations: u64,

    /// Leading component of payment memos.
    pub memo_prefix: String,

    /// Scan before building an unshield so spendable notes are current.
    pub preflight_refresh: bool,
}

impl Default for TransactConfig {
    fn default() -> Self {
        Self {
            confirmations: 1,
            memo_prefix: "Private-Payment".to_string(),
            preflight_refresh: true,
        }
    }
}

/// Session persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding the profile's session file.
    pub storage_dir: String,

    /// Fixed storage key of the session record.
    pub storage_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_dir: ".privacy-relay".to_string(),
            storage_key: "privacy.session".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Verbose logging toggle; raises the default filter to debug.
    pub verbose: bool,

    /// Enable Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            verbose: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

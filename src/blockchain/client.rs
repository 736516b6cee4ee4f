//! Blockchain RPC client with timeout and failover handling.
//!
//! # Responsibilities
//! - Connect to the primary JSON-RPC endpoint plus any failovers
//! - Query chain state (block number, balances, logs, eth_call)
//! - Bound every request with the configured timeout
//! - Serve as the [`LogSource`] underneath the log chunker

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::types::{BlockchainConfig, BlockchainError, BlockchainResult, ChainId};
use crate::rpc::source::LogSource;

/// Read-side JSON-RPC access, tried provider by provider.
#[derive(Clone)]
pub struct BlockchainClient {
    /// Primary first, then failovers in configured order.
    providers: Vec<Arc<dyn Provider + Send + Sync>>,
    config: BlockchainConfig,
    timeout_duration: Duration,
}

impl BlockchainClient {
    /// Connect to the primary endpoint and every parseable failover.
    ///
    /// Chain ID verification failures are logged, not returned, so the relay
    /// can start while the endpoint is briefly unreachable.
    pub async fn new(config: BlockchainConfig) -> BlockchainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(
            Arc::new(ProviderBuilder::new().connect_http(primary_url)) as Arc<dyn Provider + Send + Sync>
        );

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(
                    Arc::new(ProviderBuilder::new().connect_http(url)) as Arc<dyn Provider + Send + Sync>
                );
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        let client = Self {
            providers,
            config: config.clone(),
            timeout_duration,
        };

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    rpc_url = %config.rpc_url,
                    chain_id = config.chain_id,
                    failovers = client.providers.len() - 1,
                    "Blockchain client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Blockchain client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Fail with `ChainMismatch` unless the endpoint serves the configured chain.
    pub async fn verify_chain_id(&self) -> BlockchainResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id.0 != self.config.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.config.chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    /// Run `op` against each provider in order until one answers within
    /// the timeout. The last error is reported when all fail.
    async fn with_failover<T, E, F, Fut>(&self, method: &'static str, op: F) -> BlockchainResult<T>
    where
        F: Fn(Arc<dyn Provider + Send + Sync>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut last_error = String::from("no providers configured");
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, op(Arc::clone(provider))).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(method, provider_idx = i, error = %e, "RPC error, trying next provider");
                    last_error = e.to_string();
                }
                Err(_) => {
                    tracing::warn!(method, provider_idx = i, "RPC timeout, trying next provider");
                    last_error = format!("timeout after {}s", self.config.rpc_timeout_secs);
                }
            }
        }
        Err(BlockchainError::Rpc(format!(
            "All RPC providers failed {}: {}",
            method, last_error
        )))
    }

    pub async fn get_chain_id(&self) -> BlockchainResult<ChainId> {
        self.with_failover("eth_chainId", |p| async move { p.get_chain_id().await })
            .await
            .map(ChainId)
    }

    pub async fn get_block_number(&self) -> BlockchainResult<u64> {
        self.with_failover("eth_blockNumber", |p| async move { p.get_block_number().await })
            .await
    }

    /// Native balance of `address` at the latest block.
    pub async fn get_balance(&self, address: Address) -> BlockchainResult<U256> {
        self.with_failover("eth_getBalance", move |p| async move { p.get_balance(address).await })
            .await
    }

    /// Fetch logs for `filter` in a single request.
    ///
    /// Providers reject wide ranges; wrap the client in a
    /// [`ChunkedLogProvider`](crate::rpc::ChunkedLogProvider) for those.
    pub async fn get_logs(&self, filter: &Filter) -> BlockchainResult<Vec<Log>> {
        self.with_failover("eth_getLogs", |p| async move { p.get_logs(filter).await })
            .await
    }

    /// Read-only `eth_call`, returning the raw output.
    pub async fn call(&self, tx: TransactionRequest) -> BlockchainResult<Bytes> {
        self.with_failover("eth_call", |p| {
            let tx = tx.clone();
            async move { p.call(tx).await }
        })
        .await
    }

    pub fn config(&self) -> &BlockchainConfig {
        &self.config
    }
}

#[async_trait]
impl LogSource for BlockchainClient {
    async fn block_number(&self) -> BlockchainResult<u64> {
        self.get_block_number().await
    }

    async fn logs(&self, filter: &Filter) -> BlockchainResult<Vec<Log>> {
        self.get_logs(filter).await
    }
}

impl fmt::Debug for BlockchainClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockchainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}

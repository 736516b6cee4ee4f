//! The confidential-transaction engine interface.
//!
//! The engine owns cryptography, proof generation and merkle-tree storage.
//! The relay only drives it through this trait.

use std::sync::Arc;

use alloy::primitives::{B256, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use uuid::Uuid;

use crate::balances::types::BalanceSink;
use crate::blockchain::types::ChainId;
use crate::config::{EngineConfig, NetworkConfig};
use crate::engine::types::{EngineCall, EngineResult, ProvedTransaction, TransactKind, WalletInfo};

/// Receives proof generation progress as a fraction in `[0, 1]`.
pub type ProofProgress<'a> = &'a (dyn Fn(f64) + Send + Sync);

#[async_trait]
pub trait PrivacyEngine: Send + Sync {
    /// Identity of this engine instance. Two handles to the same engine
    /// report the same id.
    fn instance_id(&self) -> Uuid;

    async fn start(&self, config: &EngineConfig) -> EngineResult<()>;

    async fn load_network(&self, network: &NetworkConfig, chain: ChainId) -> EngineResult<()>;

    async fn create_wallet(&self, encryption_key: B256) -> EngineResult<WalletInfo>;

    async fn load_wallet_by_id(&self, wallet_id: &str, encryption_key: B256)
        -> EngineResult<WalletInfo>;

    /// Lookup of an already loaded wallet.
    fn wallet_for_id(&self, wallet_id: &str) -> EngineResult<WalletInfo>;

    /// Scan for unspent outputs and push fresh bucket snapshots to the sink.
    async fn refresh_balances(&self, chain: ChainId, wallet_ids: &[String]) -> EngineResult<()>;

    async fn gas_estimate_for_shield(&self, call: &EngineCall) -> EngineResult<U256>;

    async fn populate_shield(&self, call: &EngineCall, gas_estimate: U256)
        -> EngineResult<TransactionRequest>;

    async fn gas_estimate_for_transact(&self, kind: TransactKind, call: &EngineCall)
        -> EngineResult<U256>;

    /// Generate the zero-knowledge proof the populate step consumes. Slow;
    /// reports progress through `progress`.
    async fn generate_proof(
        &self,
        kind: TransactKind,
        call: &EngineCall,
        progress: ProofProgress<'_>,
    ) -> EngineResult<()>;

    async fn populate_proved(
        &self,
        kind: TransactKind,
        call: &EngineCall,
        gas_estimate: U256,
    ) -> EngineResult<ProvedTransaction>;

    /// Register the receiver of balance pushes. Replaces any previous sink.
    fn set_balance_sink(&self, sink: Arc<dyn BalanceSink>);
}

//! Shared doubles for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, TxHash, TxKind, B256, U256};
use alloy::rpc::types::{Filter, Log, TransactionReceipt, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signature, Signer};
use async_trait::async_trait;
use uuid::Uuid;

use privacy_relay::balances::{BalanceBucket, BalanceSink, BalanceUpdate, RawBucketKey, SkipReason, TokenAmount};
use privacy_relay::blockchain::{BlockchainError, BlockchainResult, ChainAccess, ChainId, SubmittedTx};
use privacy_relay::client::{ClientDeps, PrivacyClient};
use privacy_relay::config::{EngineConfig, NetworkConfig, RelayConfig};
use privacy_relay::engine::{
    EngineCall, EngineError, EngineRegistry, PrivacyEngine, ProofProgress, ProvedTransaction,
    TransactKind, WalletInfo,
};
use privacy_relay::observability::Telemetry;
use privacy_relay::rpc::{LogQueryWindow, LogSource};
use privacy_relay::session::{MemorySessionStore, SessionStore};
use privacy_relay::shield::ShieldStage;
use privacy_relay::transact::TransactStage;

pub const TOKEN: Address = Address::repeat_byte(0x11);

/// Defaults with no settle delay and a small log window.
pub fn test_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.rpc.chain_id = 11155111;
    config.refresh.settle_delay_ms = 0;
    config.refresh.debounce_ms = 5000;
    config.shield.diagnostic_delay_ms = 0;
    config.log_chunker.max_range_blocks = 10;
    config.log_chunker.base_delay_ms = 1000;
    config.log_chunker.max_delay_ms = 8000;
    config.log_chunker.jitter_ms = 50;
    config.log_chunker.pacing_min_ms = 0;
    config.log_chunker.pacing_max_ms = 0;
    config
}

pub fn canonical_shield_contract() -> Address {
    NetworkConfig::default()
        .shield_contract
        .and_then(|s| s.parse().ok())
        .unwrap()
}

pub fn wrapped_token() -> Address {
    NetworkConfig::default().wrapped_token.parse().unwrap()
}

// ---- engine ----

#[derive(Default)]
pub struct MockEngine {
    id: Uuid,
    pub start_calls: AtomicUsize,
    pub network_calls: AtomicUsize,
    /// Number of upcoming `start` calls that fail.
    pub start_failures: AtomicUsize,
    pub start_delay: Mutex<Duration>,
    pub created: AtomicUsize,
    pub load_calls: AtomicUsize,
    wallets: Mutex<HashMap<String, WalletInfo>>,
    pub refresh_calls: AtomicUsize,
    pub refresh_delay: Mutex<Duration>,
    pub refresh_error: Mutex<Option<EngineError>>,
    /// Buckets pushed to the sink on every refresh.
    pub pushes: Mutex<Vec<(RawBucketKey, Vec<TokenAmount>)>>,
    sink: Mutex<Option<Arc<dyn BalanceSink>>>,
    /// Reject gas estimation in the positional convention.
    pub reject_positional: AtomicBool,
    /// Reject gas estimation in the keyed convention.
    pub reject_keyed: AtomicBool,
    /// Accept positional estimation but reject positional populate.
    pub reject_positional_populate: AtomicBool,
    /// Destination the engine writes into populated shields.
    pub populate_to: Mutex<Option<Address>>,
    /// Conventions passed to gas estimation, in call order.
    pub shield_calls: Mutex<Vec<&'static str>>,
    /// Conventions passed to shield populate, in call order.
    pub populate_calls: Mutex<Vec<&'static str>>,
    /// `(kind, step, convention)` of every proved-transaction engine call.
    pub transact_calls: Mutex<Vec<(TransactKind, &'static str, &'static str)>>,
    pub last_transact_call: Mutex<Option<EngineCall>>,
    pub proof_error: Mutex<Option<EngineError>>,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            ..Default::default()
        })
    }

    pub fn set_pushes(&self, pushes: Vec<(RawBucketKey, Vec<TokenAmount>)>) {
        *self.pushes.lock().unwrap() = pushes;
    }

    fn check_estimate(&self, call: &EngineCall) -> Result<(), EngineError> {
        let rejected = match call {
            EngineCall::Positional(_) => self.reject_positional.load(Ordering::SeqCst),
            EngineCall::Keyed(_) => self.reject_keyed.load(Ordering::SeqCst),
        };
        if rejected {
            return Err(EngineError::ConventionMismatch(format!(
                "{} arguments not accepted",
                call.convention()
            )));
        }
        Ok(())
    }

    fn check_populate(&self, call: &EngineCall) -> Result<(), EngineError> {
        if matches!(call, EngineCall::Positional(_)) && self.reject_positional_populate.load(Ordering::SeqCst) {
            return Err(EngineError::ConventionMismatch("populate expects a params object".into()));
        }
        Ok(())
    }

    fn populated_to(&self) -> Address {
        self.populate_to
            .lock()
            .unwrap()
            .unwrap_or_else(canonical_shield_contract)
    }

    fn record_transact(&self, kind: TransactKind, step: &'static str, call: &EngineCall) {
        self.transact_calls.lock().unwrap().push((kind, step, call.convention()));
        *self.last_transact_call.lock().unwrap() = Some(call.clone());
    }

    pub fn transact_steps(&self) -> Vec<(&'static str, &'static str)> {
        self.transact_calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, step, convention)| (*step, *convention))
            .collect()
    }
}

pub fn nullifier() -> B256 {
    B256::repeat_byte(0xaa)
}

#[async_trait]
impl PrivacyEngine for MockEngine {
    fn instance_id(&self) -> Uuid {
        self.id
    }

    async fn start(&self, _config: &EngineConfig) -> Result<(), EngineError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.start_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .start_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(EngineError::Start("database locked".into()));
        }
        Ok(())
    }

    async fn load_network(&self, _network: &NetworkConfig, _chain: ChainId) -> Result<(), EngineError> {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_wallet(&self, _encryption_key: B256) -> Result<WalletInfo, EngineError> {
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let info = WalletInfo {
            id: format!("wallet-{}", n),
            private_address: format!("0zk{}", n),
        };
        self.wallets
            .lock()
            .unwrap()
            .insert(info.id.clone(), info.clone());
        Ok(info)
    }

    async fn load_wallet_by_id(&self, wallet_id: &str, _encryption_key: B256) -> Result<WalletInfo, EngineError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        self.wallets
            .lock()
            .unwrap()
            .get(wallet_id)
            .cloned()
            .ok_or_else(|| EngineError::Wallet(format!("unknown wallet {}", wallet_id)))
    }

    fn wallet_for_id(&self, wallet_id: &str) -> Result<WalletInfo, EngineError> {
        self.wallets
            .lock()
            .unwrap()
            .get(wallet_id)
            .cloned()
            .ok_or_else(|| EngineError::WalletNotLoaded(wallet_id.to_string()))
    }

    async fn refresh_balances(&self, chain: ChainId, wallet_ids: &[String]) -> Result<(), EngineError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.refresh_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.refresh_error.lock().unwrap().clone() {
            return Err(err);
        }

        let sink = self.sink.lock().unwrap().clone();
        let pushes = self.pushes.lock().unwrap().clone();
        if let Some(sink) = sink {
            for wallet_id in wallet_ids {
                for (bucket, tokens) in &pushes {
                    sink.on_balance_update(BalanceUpdate {
                        wallet_id: wallet_id.clone(),
                        chain_id: chain.0,
                        bucket: bucket.clone(),
                        tokens: tokens.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn gas_estimate_for_shield(&self, call: &EngineCall) -> Result<U256, EngineError> {
        self.shield_calls.lock().unwrap().push(call.convention());
        self.check_estimate(call)?;
        Ok(U256::from(250_000u64))
    }

    async fn populate_shield(&self, call: &EngineCall, gas_estimate: U256) -> Result<TransactionRequest, EngineError> {
        self.populate_calls.lock().unwrap().push(call.convention());
        self.check_populate(call)?;
        Ok(TransactionRequest::default()
            .with_to(self.populated_to())
            .with_gas_limit(gas_estimate.to::<u64>())
            .with_input(vec![0x04, 0x4a, 0x40, 0x2c]))
    }

    async fn gas_estimate_for_transact(&self, kind: TransactKind, call: &EngineCall) -> Result<U256, EngineError> {
        self.record_transact(kind, "estimate", call);
        self.check_estimate(call)?;
        Ok(U256::from(1_200_000u64))
    }

    async fn generate_proof(
        &self,
        kind: TransactKind,
        call: &EngineCall,
        progress: ProofProgress<'_>,
    ) -> Result<(), EngineError> {
        self.record_transact(kind, "prove", call);
        if let Some(err) = self.proof_error.lock().unwrap().clone() {
            return Err(err);
        }
        progress(0.5);
        progress(1.0);
        Ok(())
    }

    async fn populate_proved(
        &self,
        kind: TransactKind,
        call: &EngineCall,
        gas_estimate: U256,
    ) -> Result<ProvedTransaction, EngineError> {
        self.record_transact(kind, "populate", call);
        self.check_populate(call)?;
        Ok(ProvedTransaction {
            transaction: TransactionRequest::default()
                .with_to(self.populated_to())
                .with_gas_limit(gas_estimate.to::<u64>())
                .with_input(vec![0xd8, 0xae, 0x13, 0x6a]),
            nullifiers: vec![nullifier(), B256::repeat_byte(0xbb)],
        })
    }

    fn set_balance_sink(&self, sink: Arc<dyn BalanceSink>) {
        *self.sink.lock().unwrap() = Some(sink);
    }
}

// ---- chain ----

pub struct MockChain {
    signer: PrivateKeySigner,
    pub token_balance: Mutex<U256>,
    pub allowance: Mutex<U256>,
    pub native: Mutex<U256>,
    pub approvals: Mutex<Vec<(Address, Address, U256)>>,
    pub wraps: Mutex<Vec<(Address, U256)>>,
    pub sent: Mutex<Vec<TransactionRequest>>,
    pub send_error: Mutex<Option<String>>,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Self::with_signer(PrivateKeySigner::random())
    }

    pub fn with_signer(signer: PrivateKeySigner) -> Arc<Self> {
        Arc::new(Self {
            signer,
            token_balance: Mutex::new(U256::ZERO),
            allowance: Mutex::new(U256::ZERO),
            native: Mutex::new(U256::from(10u64).pow(U256::from(18u64))),
            approvals: Mutex::new(Vec::new()),
            wraps: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            send_error: Mutex::new(None),
        })
    }

    pub fn user(&self) -> Address {
        self.signer.address()
    }

    pub fn side_effects(&self) -> usize {
        self.approvals.lock().unwrap().len()
            + self.wraps.lock().unwrap().len()
            + self.sent.lock().unwrap().len()
    }
}

/// A successful receipt for `tx_hash` sent to `to`.
pub fn receipt(tx_hash: TxHash, from: Address, to: Address) -> TransactionReceipt {
    serde_json::from_value(serde_json::json!({
        "type": "0x2",
        "status": "0x1",
        "cumulativeGasUsed": "0x5208",
        "logs": [],
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "transactionHash": tx_hash,
        "transactionIndex": "0x0",
        "blockHash": B256::repeat_byte(0x22),
        "blockNumber": "0x10",
        "gasUsed": "0x5208",
        "effectiveGasPrice": "0x3b9aca00",
        "from": from,
        "to": to,
        "contractAddress": null,
    }))
    .unwrap()
}

impl MockChain {
    fn submitted(&self, to: Address) -> SubmittedTx {
        let n = self.side_effects() as u8;
        let tx_hash = TxHash::repeat_byte(n.wrapping_add(1));
        SubmittedTx {
            tx_hash,
            receipt: receipt(tx_hash, self.user(), to),
        }
    }
}

#[async_trait]
impl ChainAccess for MockChain {
    fn signer_address(&self) -> Address {
        self.user()
    }

    async fn token_allowance(&self, _token: Address, _owner: Address, _spender: Address) -> BlockchainResult<U256> {
        Ok(*self.allowance.lock().unwrap())
    }

    async fn token_balance(&self, _token: Address, _owner: Address) -> BlockchainResult<U256> {
        Ok(*self.token_balance.lock().unwrap())
    }

    async fn native_balance(&self, _owner: Address) -> BlockchainResult<U256> {
        Ok(*self.native.lock().unwrap())
    }

    async fn approve(&self, token: Address, spender: Address, amount: U256, _confirmations: u64) -> BlockchainResult<SubmittedTx> {
        let submitted = self.submitted(token);
        self.approvals.lock().unwrap().push((token, spender, amount));
        *self.allowance.lock().unwrap() = amount;
        Ok(submitted)
    }

    async fn wrap_native(&self, wrapped_token: Address, amount: U256, _confirmations: u64) -> BlockchainResult<SubmittedTx> {
        let submitted = self.submitted(wrapped_token);
        self.wraps.lock().unwrap().push((wrapped_token, amount));
        let mut balance = self.token_balance.lock().unwrap();
        *balance += amount;
        Ok(submitted)
    }

    async fn send_transaction(&self, tx: TransactionRequest, _confirmations: u64) -> BlockchainResult<SubmittedTx> {
        if let Some(err) = self.send_error.lock().unwrap().clone() {
            return Err(BlockchainError::Rpc(err));
        }
        let to = match tx.to {
            Some(TxKind::Call(to)) => to,
            _ => Address::ZERO,
        };
        let submitted = self.submitted(to);
        self.sent.lock().unwrap().push(tx);
        Ok(submitted)
    }

    async fn sign_message(&self, message: &[u8]) -> BlockchainResult<Signature> {
        self.signer
            .sign_message(message)
            .await
            .map_err(|e| BlockchainError::Wallet(e.to_string()))
    }
}

// ---- logs ----

/// Log source with a fixed head that fails selected windows a set number
/// of times before answering.
#[derive(Default)]
pub struct ScriptedLogSource {
    pub head: u64,
    /// Remaining failures keyed by window start block.
    pub failures: Mutex<HashMap<u64, usize>>,
    pub calls: Mutex<Vec<(Option<u64>, Option<u64>)>>,
}

impl ScriptedLogSource {
    pub fn new(head: u64) -> Arc<Self> {
        Arc::new(Self {
            head,
            ..Default::default()
        })
    }

    pub fn fail_window(&self, from_block: u64, times: usize) {
        self.failures.lock().unwrap().insert(from_block, times);
    }
}

#[async_trait]
impl LogSource for ScriptedLogSource {
    async fn block_number(&self) -> BlockchainResult<u64> {
        Ok(self.head)
    }

    async fn logs(&self, filter: &Filter) -> BlockchainResult<Vec<Log>> {
        let (from, to) = (filter.get_from_block(), filter.get_to_block());
        self.calls.lock().unwrap().push((from, to));

        if let Some(start) = from {
            let mut failures = self.failures.lock().unwrap();
            if let Some(left) = failures.get_mut(&start) {
                if *left > 0 {
                    *left -= 1;
                    return Err(BlockchainError::Rpc("429 Too Many Requests".into()));
                }
            }
        }

        let start = from.unwrap_or(0);
        let end = to.unwrap_or(self.head);
        Ok((start..=end)
            .map(|n| Log {
                block_number: Some(n),
                ..Default::default()
            })
            .collect())
    }
}

// ---- telemetry ----

#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    pub fetched: Mutex<Vec<LogQueryWindow>>,
    pub retries: Mutex<Vec<(LogQueryWindow, u32, Duration)>>,
    pub failed: Mutex<Vec<LogQueryWindow>>,
    pub skipped: Mutex<Vec<SkipReason>>,
    pub watchdog: AtomicUsize,
    pub stages: Mutex<Vec<ShieldStage>>,
    pub transact_stages: Mutex<Vec<(TransactKind, TransactStage)>>,
    pub proof_progress: Mutex<Vec<f64>>,
    pub updates: Mutex<Vec<BalanceBucket>>,
}

impl Telemetry for RecordingTelemetry {
    fn window_fetched(&self, window: LogQueryWindow, _logs: usize) {
        self.fetched.lock().unwrap().push(window);
    }

    fn window_retry(&self, window: LogQueryWindow, attempt: u32, delay: Duration, _error: &str) {
        self.retries.lock().unwrap().push((window, attempt, delay));
    }

    fn window_failed(&self, window: LogQueryWindow, _error: &str) {
        self.failed.lock().unwrap().push(window);
    }

    fn refresh_skipped(&self, _reason: &str, cause: SkipReason) {
        self.skipped.lock().unwrap().push(cause);
    }

    fn scan_watchdog_fired(&self, _elapsed: Duration) {
        self.watchdog.fetch_add(1, Ordering::SeqCst);
    }

    fn shield_stage(&self, stage: ShieldStage) {
        self.stages.lock().unwrap().push(stage);
    }

    fn transact_stage(&self, kind: TransactKind, stage: TransactStage) {
        self.transact_stages.lock().unwrap().push((kind, stage));
    }

    fn proof_progress(&self, _kind: TransactKind, fraction: f64) {
        self.proof_progress.lock().unwrap().push(fraction);
    }

    fn balance_update(&self, bucket: BalanceBucket, _tokens: usize) {
        self.updates.lock().unwrap().push(bucket);
    }
}

// ---- client ----

pub struct Harness {
    pub client: PrivacyClient,
    pub engine: Arc<MockEngine>,
    pub chain: Arc<MockChain>,
    pub logs: Arc<ScriptedLogSource>,
    pub store: Arc<MemorySessionStore>,
    pub telemetry: Arc<RecordingTelemetry>,
    pub registry: Arc<EngineRegistry>,
}

impl Harness {
    pub fn new(config: RelayConfig) -> Self {
        Self::with_parts(
            config,
            MockEngine::new(),
            MockChain::new(),
            Arc::new(MemorySessionStore::default()),
            EngineRegistry::new(),
        )
    }

    pub fn with_parts(
        config: RelayConfig,
        engine: Arc<MockEngine>,
        chain: Arc<MockChain>,
        store: Arc<MemorySessionStore>,
        registry: Arc<EngineRegistry>,
    ) -> Self {
        let logs = ScriptedLogSource::new(100);
        let telemetry = Arc::new(RecordingTelemetry::default());
        let deps = ClientDeps {
            registry: Arc::clone(&registry),
            engine: engine.clone(),
            chain: chain.clone(),
            log_source: logs.clone(),
            session_store: store.clone() as Arc<dyn SessionStore>,
            telemetry: telemetry.clone(),
        };
        let client = PrivacyClient::new(config, deps).unwrap();
        Self {
            client,
            engine,
            chain,
            logs,
            store,
            telemetry,
            registry,
        }
    }
}

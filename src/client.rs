//! Composition root of the relay.
//!
//! # Responsibilities
//! - Own one engine handle, its lifecycle and every dependent component
//! - Wire engine balance pushes into the cache
//! - Expose the application API: lifecycle, session, balances, shielding,
//!   private transfers and unshields
//!
//! # Data Flow
//! ```text
//! application → PrivacyClient
//!     ├─ lifecycle (engine start / network load / wallets)
//!     ├─ session (connect / disconnect / restore)
//!     ├─ refresh coordinator → engine scan → cache
//!     ├─ shield orchestrator → chain access + engine
//!     ├─ transact orchestrator → engine proofs + chain access
//!     └─ chunked log provider → log source
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::{Filter, Log};
use thiserror::Error;

use crate::balances::cache::BalanceCache;
use crate::balances::refresh::{RefreshCoordinator, RefreshOutcome, RefreshTarget};
use crate::balances::types::BalanceSummary;
use crate::blockchain::transaction::ChainAccess;
use crate::blockchain::types::{BlockchainError, BlockchainResult, ChainId, SubmittedTx};
use crate::blockchain::wallet::{encryption_key_from_signature, ENCRYPTION_KEY_MESSAGE};
use crate::config::RelayConfig;
use crate::engine::lifecycle::{EngineLifecycle, LifecycleError, LifecycleResult};
use crate::engine::registry::EngineRegistry;
use crate::engine::traits::PrivacyEngine;
use crate::engine::types::WalletInfo;
use crate::observability::{NoopTelemetry, Telemetry};
use crate::resilience::backoff::BackoffPolicy;
use crate::resilience::retries::{retry_with_backoff, RetryPolicy};
use crate::rpc::chunker::ChunkedLogProvider;
use crate::rpc::source::LogSource;
use crate::session::manager::SessionManager;
use crate::session::store::SessionStore;
use crate::session::types::{SessionError, SessionRecord};
use crate::shield::orchestrator::ShieldOrchestrator;
use crate::shield::types::{
    amount_after_fee, shield_fee, ShieldAccount, ShieldOptions, ShieldOutcome, ShieldReadiness,
    ShieldResult,
};
use crate::transact::orchestrator::TransactOrchestrator;
use crate::transact::types::{
    payment_memo, TransactAccount, TransactOutcome, TransactResult, TransferRequest,
    UnshieldRequest,
};

/// Errors from client-level operations that span several subsystems.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Chain(#[from] BlockchainError),

    #[error("Signer {signer} cannot act for {user}")]
    SignerMismatch { user: Address, signer: Address },
}

pub type ClientResult<T> = Result<T, ClientError>;

/// External collaborators the client is built from.
pub struct ClientDeps {
    pub registry: Arc<EngineRegistry>,
    pub engine: Arc<dyn PrivacyEngine>,
    pub chain: Arc<dyn ChainAccess>,
    pub log_source: Arc<dyn LogSource>,
    pub session_store: Arc<dyn SessionStore>,
    pub telemetry: Arc<dyn Telemetry>,
}

impl ClientDeps {
    /// Dependencies with the process-wide registry and no telemetry.
    pub fn new(
        engine: Arc<dyn PrivacyEngine>,
        chain: Arc<dyn ChainAccess>,
        log_source: Arc<dyn LogSource>,
        session_store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            registry: EngineRegistry::global(),
            engine,
            chain,
            log_source,
            session_store,
            telemetry: Arc::new(NoopTelemetry),
        }
    }
}

pub struct PrivacyClient {
    config: RelayConfig,
    chain_id: ChainId,
    lifecycle: EngineLifecycle,
    chain: Arc<dyn ChainAccess>,
    cache: BalanceCache,
    refresh: Arc<RefreshCoordinator>,
    shield: ShieldOrchestrator,
    transact: TransactOrchestrator,
    session: SessionManager,
    logs: ChunkedLogProvider<Arc<dyn LogSource>>,
}

impl PrivacyClient {
    /// Build the client. Fails with `DuplicateInstance` when the registry
    /// already holds a different engine.
    pub fn new(config: RelayConfig, deps: ClientDeps) -> LifecycleResult<Self> {
        let handle = deps.registry.acquire(Arc::clone(&deps.engine))?;
        let chain_id = ChainId(config.rpc.chain_id);

        let cache = BalanceCache::new(Arc::clone(&deps.telemetry));
        deps.engine.set_balance_sink(Arc::new(cache.clone()));

        let refresh = Arc::new(
            RefreshCoordinator::new(
                Arc::clone(&deps.engine),
                cache.clone(),
                config.refresh.clone(),
                config.network.poi_incomplete,
                config.network.txid_sync_incomplete,
            )
            .with_telemetry(Arc::clone(&deps.telemetry)),
        );

        let shield = ShieldOrchestrator::new(
            Arc::clone(&deps.engine),
            Arc::clone(&deps.chain),
            Arc::clone(&refresh),
            cache.clone(),
            config.network.clone(),
            config.shield.clone(),
        )
        .with_telemetry(Arc::clone(&deps.telemetry));

        let transact = TransactOrchestrator::new(
            Arc::clone(&deps.engine),
            Arc::clone(&deps.chain),
            Arc::clone(&refresh),
            config.network.clone(),
            config.transact.clone(),
        )
        .with_telemetry(Arc::clone(&deps.telemetry));

        let logs = ChunkedLogProvider::new(deps.log_source, &config.log_chunker)
            .with_telemetry(Arc::clone(&deps.telemetry));

        tracing::info!(
            network = %config.network.name,
            chain_id = chain_id.0,
            engine = %handle.instance_id(),
            "Privacy client created"
        );

        Ok(Self {
            chain_id,
            lifecycle: EngineLifecycle::new(handle),
            chain: deps.chain,
            cache,
            refresh,
            shield,
            transact,
            session: SessionManager::new(deps.session_store),
            logs,
            config,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    // ---- lifecycle ----

    pub async fn ensure_engine_started(&self) -> LifecycleResult<()> {
        self.lifecycle.ensure_engine_started(&self.config.engine).await
    }

    /// Start the engine if needed, then load the configured network.
    pub async fn ensure_network_loaded(&self) -> LifecycleResult<()> {
        self.ensure_engine_started().await?;
        self.lifecycle
            .ensure_network_loaded(&self.config.network, self.chain_id)
            .await
    }

    pub fn get_wallet_by_id(&self, wallet_id: &str) -> LifecycleResult<WalletInfo> {
        self.lifecycle.get_wallet_by_id(wallet_id)
    }

    pub async fn load_wallet(&self, wallet_id: &str, encryption_key: B256) -> LifecycleResult<WalletInfo> {
        self.lifecycle.load_wallet(wallet_id, encryption_key).await
    }

    /// Tear down lifecycle state and cached balances.
    pub fn reset(&self) {
        self.lifecycle.reset();
        self.cache.clear();
    }

    // ---- session ----

    /// Connect `user`'s confidential wallet, reusing the stored one when the
    /// same user connected before.
    pub async fn connect(&self, user: Address) -> ClientResult<SessionRecord> {
        let signer = self.chain.signer_address();
        if signer != user {
            return Err(ClientError::SignerMismatch { user, signer });
        }

        self.initialize_with_retry().await?;

        let signature = self.chain.sign_message(ENCRYPTION_KEY_MESSAGE.as_bytes()).await?;
        let encryption_key = encryption_key_from_signature(&signature);

        let reusable = self
            .session
            .reusable_record(user, &self.config.network.name)?
            .filter(|record| record.encryption_key == encryption_key);

        let wallet = match reusable {
            Some(record) => match self.lifecycle.load_wallet(&record.wallet_id, encryption_key).await {
                Ok(wallet) => wallet,
                Err(e) => {
                    tracing::warn!(wallet_id = %record.wallet_id, error = %e, "Stored wallet unusable, creating a new one");
                    self.lifecycle.create_wallet(encryption_key).await?
                }
            },
            None => self.lifecycle.create_wallet(encryption_key).await?,
        };

        let record = SessionRecord {
            network: self.config.network.name.clone(),
            wallet_id: wallet.id,
            private_address: wallet.private_address,
            user_address: user,
            encryption_key,
            connected_at: unix_now(),
        };
        self.session.establish(record.clone())?;
        self.cache.set_active_wallet(&record.wallet_id, self.chain_id.0);
        Ok(record)
    }

    /// Bring the engine and network up, retrying with backoff up to the
    /// configured number of attempts.
    async fn initialize_with_retry(&self) -> LifecycleResult<()> {
        let engine = &self.config.engine;
        let base = engine.init_retry_base_ms;
        let policy = RetryPolicy::new(
            engine.init_attempts.saturating_sub(1),
            BackoffPolicy::new(base, base.saturating_mul(8), 0),
        );
        retry_with_backoff(
            &policy,
            || self.ensure_network_loaded(),
            |attempt, delay, error| {
                tracing::warn!(
                    attempt = attempt + 1,
                    attempts = engine.init_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Engine initialization failed, retrying"
                );
            },
        )
        .await
    }

    /// Forget the session in memory and in storage. Cached balances are
    /// dropped even when the storage clear fails.
    pub fn disconnect(&self) -> ClientResult<()> {
        let cleared = self.session.disconnect();
        self.cache.clear();
        cleared?;
        Ok(())
    }

    /// Reopen the stored session for `user`.
    pub async fn restore_session(&self, user: Address) -> ClientResult<SessionRecord> {
        let record = self.session.restore(user)?;

        let loaded = async {
            self.initialize_with_retry().await?;
            self.lifecycle
                .load_wallet(&record.wallet_id, record.encryption_key)
                .await
        }
        .await;

        if let Err(e) = loaded {
            self.session.deactivate();
            return Err(e.into());
        }
        self.cache.set_active_wallet(&record.wallet_id, self.chain_id.0);
        Ok(record)
    }

    pub fn session(&self) -> Option<SessionRecord> {
        self.session.current()
    }

    fn shield_account(&self) -> Option<ShieldAccount> {
        self.session.current().map(|record| ShieldAccount {
            wallet_id: record.wallet_id,
            private_address: record.private_address,
            chain: self.chain_id,
        })
    }

    fn transact_account(&self) -> Option<TransactAccount> {
        self.session.current().map(|record| TransactAccount {
            wallet_id: record.wallet_id,
            encryption_key: record.encryption_key,
            chain: self.chain_id,
        })
    }

    // ---- balances ----

    /// Refresh the connected wallet's balances. `delay` overrides the
    /// configured settle delay.
    pub async fn refresh_balances(&self, force: bool, delay: Option<Duration>) -> RefreshOutcome {
        let Some(record) = self.session.current() else {
            return RefreshOutcome::Failed {
                error: "No confidential wallet connected".to_string(),
            };
        };
        let target = RefreshTarget {
            chain: self.chain_id,
            wallet_ids: vec![record.wallet_id],
        };
        let reason = if force { "manual-forced" } else { "manual" };
        self.refresh.refresh(&target, reason, force, delay).await
    }

    pub fn get_balances(&self) -> BalanceSummary {
        self.cache.get_balances(self.config.network.poi_incomplete)
    }

    // ---- shielding ----

    pub async fn shield(&self, token: Address, amount_wei: U256) -> ShieldResult<ShieldOutcome> {
        self.shield_with_options(token, amount_wei, ShieldOptions::default())
            .await
    }

    pub async fn shield_with_options(
        &self,
        token: Address,
        amount_wei: U256,
        options: ShieldOptions,
    ) -> ShieldResult<ShieldOutcome> {
        let account = self.shield_account();
        self.shield
            .shield(account.as_ref(), token, amount_wei, options)
            .await
    }

    pub async fn validate_shielding(&self, token: Address, amount_wei: U256) -> ShieldResult<ShieldReadiness> {
        self.shield.validate_shielding(token, amount_wei).await
    }

    pub async fn wrap_native(&self, amount_wei: U256) -> ShieldResult<SubmittedTx> {
        self.shield.wrap_native(amount_wei).await
    }

    pub fn shield_fee(&self, amount_wei: U256) -> U256 {
        shield_fee(amount_wei, self.config.shield.fee_bps)
    }

    pub fn amount_after_fee(&self, amount_wei: U256) -> U256 {
        amount_after_fee(amount_wei, self.config.shield.fee_bps)
    }

    // ---- proved transactions ----

    pub async fn private_transfer(&self, request: TransferRequest) -> TransactResult<TransactOutcome> {
        let account = self.transact_account();
        self.transact.transfer(account.as_ref(), request).await
    }

    pub async fn unshield(&self, request: UnshieldRequest) -> TransactResult<TransactOutcome> {
        let account = self.transact_account();
        self.transact.unshield(account.as_ref(), request).await
    }

    /// Pay a seller's confidential address, tagging the transfer with a
    /// memo derived from `product_id`.
    pub async fn pay_seller(
        &self,
        seller: &str,
        amount_wei: U256,
        token: Option<Address>,
        product_id: Option<&str>,
    ) -> TransactResult<TransactOutcome> {
        let memo = payment_memo(&self.config.transact.memo_prefix, product_id, unix_now_millis());
        let outcome = self
            .private_transfer(TransferRequest {
                recipient: seller.to_string(),
                token,
                amount_wei,
                memo: Some(memo),
            })
            .await?;

        if let TransactOutcome::Submitted {
            tx_hash,
            tx_ref,
            memo_hash,
            ..
        } = &outcome
        {
            tracing::info!(
                product_id = product_id.unwrap_or("direct"),
                tx_hash = %tx_hash,
                tx_ref = %tx_ref,
                memo_hash = ?memo_hash,
                "Seller payment recorded"
            );
        }
        Ok(outcome)
    }

    // ---- historical data ----

    pub async fn get_logs(&self, filter: &Filter) -> BlockchainResult<Vec<Log>> {
        self.logs.get_logs(filter).await
    }
}

impl std::fmt::Debug for PrivacyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivacyClient")
            .field("network", &self.config.network.name)
            .field("chain_id", &self.chain_id)
            .field("lifecycle", &self.lifecycle)
            .field("session", &self.session)
            .finish()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn unix_now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

//! Shield transaction orchestration.
//!
//! # Data Flow
//! ```text
//! CheckConfig → [AutoWrap] → EnsureAllowance → BuildTransaction
//!     → EnforceCanonicalTarget → Submit → AwaitConfirmation → PostShieldRefresh
//! ```
//!
//! # Failure Semantics
//! - CheckConfig problems are returned as `Err` before any side effect
//! - Every later failure becomes `ShieldOutcome::Failed { stage, .. }`
//! - PostShieldRefresh failures are logged only; the shield already landed

use std::sync::Arc;
use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, TxKind, U256};
use alloy::rpc::types::TransactionRequest;
use tokio::time::sleep;

use crate::balances::cache::BalanceCache;
use crate::balances::refresh::{RefreshCoordinator, RefreshTarget};
use crate::blockchain::transaction::ChainAccess;
use crate::blockchain::types::{BlockchainError, SubmittedTx};
use crate::config::{NetworkConfig, ShieldConfig};
use crate::engine::traits::PrivacyEngine;
use crate::observability::{NoopTelemetry, Telemetry};
use crate::shield::readiness::check_readiness;
use crate::shield::strategy::{ShieldBuildContext, ShieldBuilder};
use crate::shield::types::{
    amount_after_fee, shield_fee, ShieldAccount, ShieldError, ShieldIntent, ShieldOptions,
    ShieldOutcome, ShieldReadiness, ShieldResult, ShieldStage,
};

/// Addresses resolved from configuration during CheckConfig.
#[derive(Debug, Clone, Copy)]
struct ShieldTargets {
    shield_contract: Address,
    wrapped_token: Address,
}

pub struct ShieldOrchestrator {
    engine: Arc<dyn PrivacyEngine>,
    chain: Arc<dyn ChainAccess>,
    refresh: Arc<RefreshCoordinator>,
    cache: BalanceCache,
    network: NetworkConfig,
    config: ShieldConfig,
    builder: ShieldBuilder,
    telemetry: Arc<dyn Telemetry>,
}

impl ShieldOrchestrator {
    pub fn new(
        engine: Arc<dyn PrivacyEngine>,
        chain: Arc<dyn ChainAccess>,
        refresh: Arc<RefreshCoordinator>,
        cache: BalanceCache,
        network: NetworkConfig,
        config: ShieldConfig,
    ) -> Self {
        Self {
            engine,
            chain,
            refresh,
            cache,
            network,
            config,
            builder: ShieldBuilder::default(),
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    pub fn with_builder(mut self, builder: ShieldBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    fn targets(&self) -> ShieldResult<ShieldTargets> {
        let raw = self
            .network
            .shield_contract
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ShieldError::ContractNotConfigured(self.network.name.clone()))?;
        let shield_contract = parse_address("shield_contract", raw)?;
        let wrapped_token = parse_address("wrapped_token", &self.network.wrapped_token)?;
        Ok(ShieldTargets {
            shield_contract,
            wrapped_token,
        })
    }

    fn stage(&self, stage: ShieldStage) {
        self.telemetry.shield_stage(stage);
    }

    /// Shield `amount` of `token` into `account`.
    pub async fn shield(
        &self,
        account: Option<&ShieldAccount>,
        token: Address,
        amount: U256,
        options: ShieldOptions,
    ) -> ShieldResult<ShieldOutcome> {
        self.stage(ShieldStage::CheckConfig);
        let targets = self.targets()?;
        let account = account.ok_or(ShieldError::WalletNotConnected)?;
        if amount.is_zero() {
            return Err(ShieldError::ZeroAmount);
        }

        let owner = self.chain.signer_address();
        let fee = shield_fee(amount, self.config.fee_bps);
        let net = amount_after_fee(amount, self.config.fee_bps);
        tracing::info!(
            token = %token,
            amount = %amount,
            fee = %fee,
            amount_after_fee = %net,
            wallet_id = %account.wallet_id,
            "Shielding"
        );

        if options.auto_wrap && token == targets.wrapped_token {
            self.stage(ShieldStage::AutoWrap);
            if let Err(e) = self.wrap_shortfall(token, owner, amount).await {
                return Ok(failed(ShieldStage::AutoWrap, e));
            }
        }

        self.stage(ShieldStage::EnsureAllowance);
        if let Err(e) = self
            .ensure_allowance(token, owner, targets.shield_contract, amount)
            .await
        {
            return Ok(failed(ShieldStage::EnsureAllowance, e));
        }

        self.stage(ShieldStage::BuildTransaction);
        let ctx = ShieldBuildContext {
            txid_version: self.network.txid_version.clone(),
            network_name: self.network.name.clone(),
            intent: ShieldIntent::new(token, account.private_address.clone(), amount),
            from_address: owner,
        };
        let built = match self.builder.build(self.engine.as_ref(), &ctx).await {
            Ok(built) => built,
            Err(e) => return Ok(failed(ShieldStage::BuildTransaction, e)),
        };

        self.stage(ShieldStage::EnforceCanonicalTarget);
        let tx = enforce_canonical_target(built.transaction, targets.shield_contract);

        self.stage(ShieldStage::Submit);
        let submitted = match self.chain.send_transaction(tx, self.config.confirmations).await {
            Ok(submitted) => submitted,
            Err(e) => return Ok(failed(stage_of(&e), e)),
        };
        self.stage(ShieldStage::AwaitConfirmation);
        tracing::info!(
            tx_hash = %submitted.tx_hash,
            strategy = built.strategy,
            "Shield transaction confirmed"
        );

        self.stage(ShieldStage::PostShieldRefresh);
        self.post_shield_refresh(account).await;

        let SubmittedTx { tx_hash, receipt } = submitted;
        Ok(ShieldOutcome::Submitted {
            tx_hash,
            receipt: Box::new(receipt),
            fee,
            amount_after_fee: net,
        })
    }

    /// Check balances, allowance and gas for shielding `amount` of `token`.
    /// Insufficiency is a readiness value, not an error.
    pub async fn validate_shielding(&self, token: Address, amount: U256) -> ShieldResult<ShieldReadiness> {
        let targets = self.targets()?;
        let readiness = check_readiness(
            self.chain.as_ref(),
            token,
            targets.shield_contract,
            amount,
            U256::from(self.config.min_gas_balance_wei),
        )
        .await?;
        Ok(readiness)
    }

    /// Deposit `amount` of native currency into the wrapped token.
    pub async fn wrap_native(&self, amount: U256) -> ShieldResult<SubmittedTx> {
        let targets = self.targets()?;
        if amount.is_zero() {
            return Err(ShieldError::ZeroAmount);
        }
        let tx = self
            .chain
            .wrap_native(targets.wrapped_token, amount, self.config.confirmations)
            .await?;
        tracing::info!(tx_hash = %tx.tx_hash, amount = %amount, "Wrapped native currency");
        Ok(tx)
    }

    async fn wrap_shortfall(&self, token: Address, owner: Address, amount: U256) -> Result<(), BlockchainError> {
        let balance = self.chain.token_balance(token, owner).await?;
        if balance >= amount {
            return Ok(());
        }
        let shortfall = amount - balance;
        tracing::info!(shortfall = %shortfall, "Wrapping native currency to cover shield");
        self.chain
            .wrap_native(token, shortfall, self.config.confirmations)
            .await?;
        Ok(())
    }

    async fn ensure_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), BlockchainError> {
        let current = self.chain.token_allowance(token, owner, spender).await?;
        if current >= amount {
            tracing::debug!(allowance = %current, "Allowance sufficient");
            return Ok(());
        }
        tracing::info!(allowance = %current, spender = %spender, "Approving shield contract");
        self.chain
            .approve(token, spender, U256::MAX, self.config.confirmations)
            .await?;
        Ok(())
    }

    async fn post_shield_refresh(&self, account: &ShieldAccount) {
        let target = RefreshTarget {
            chain: account.chain,
            wallet_ids: vec![account.wallet_id.clone()],
        };
        let outcome = self.refresh.refresh(&target, "post-shield", true, None).await;
        if !outcome.is_success() {
            tracing::warn!(outcome = ?outcome, "Post-shield refresh did not succeed");
        }

        let cache = self.cache.clone();
        let poi_incomplete = self.network.poi_incomplete;
        let delay = Duration::from_millis(self.config.diagnostic_delay_ms);
        tokio::spawn(async move {
            sleep(delay).await;
            let summary = cache.get_balances(poi_incomplete);
            for (bucket, tokens) in &summary.buckets {
                tracing::info!(bucket = bucket.as_str(), tokens = ?tokens, "Post-shield bucket snapshot");
            }
        });
    }
}

impl std::fmt::Debug for ShieldOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShieldOrchestrator")
            .field("network", &self.network.name)
            .field("builder", &self.builder)
            .finish()
    }
}

fn parse_address(field: &'static str, value: &str) -> ShieldResult<Address> {
    value.trim().parse().map_err(|_| ShieldError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

fn failed(stage: ShieldStage, error: impl std::fmt::Display) -> ShieldOutcome {
    tracing::error!(stage = stage.as_str(), error = %error, "Shield failed");
    ShieldOutcome::Failed {
        stage,
        error: error.to_string(),
    }
}

fn stage_of(err: &BlockchainError) -> ShieldStage {
    match err {
        BlockchainError::ConfirmationTimeout(_) | BlockchainError::Reverted(_) => {
            ShieldStage::AwaitConfirmation
        }
        _ => ShieldStage::Submit,
    }
}

/// Point `tx` at the canonical contract, whatever the engine chose.
pub fn enforce_canonical_target(tx: TransactionRequest, canonical: Address) -> TransactionRequest {
    match tx.to {
        Some(TxKind::Call(to)) if to == canonical => tx,
        other => {
            tracing::warn!(
                populated = ?other,
                canonical = %canonical,
                "Populated destination differs from canonical contract, overwriting"
            );
            tx.with_to(canonical)
        }
    }
}

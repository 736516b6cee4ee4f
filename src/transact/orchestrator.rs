//! Private transfer and unshield orchestration.
//!
//! # Data Flow
//! ```text
//! CheckInputs → [PreflightRefresh] → BuildTransaction (estimate → prove → populate)
//!     → EnforceCanonicalTarget → Submit → AwaitConfirmation → PostRefresh
//! ```
//!
//! # Failure Semantics
//! - CheckInputs problems are returned as `Err` before any side effect
//! - Every later failure becomes `TransactOutcome::Failed { stage, .. }`
//! - PreflightRefresh and PostRefresh failures are logged only

use std::sync::Arc;

use alloy::primitives::{Address, B256};

use crate::balances::refresh::{RefreshCoordinator, RefreshTarget};
use crate::blockchain::transaction::ChainAccess;
use crate::blockchain::types::{BlockchainError, SubmittedTx};
use crate::config::{NetworkConfig, TransactConfig};
use crate::engine::traits::PrivacyEngine;
use crate::engine::types::TransactKind;
use crate::observability::{NoopTelemetry, Telemetry};
use crate::shield::orchestrator::enforce_canonical_target;
use crate::transact::strategy::{TransactBuildContext, TransactBuilder, TransactRecipient};
use crate::transact::types::{
    memo_hash, TransactAccount, TransactError, TransactOutcome, TransactResult, TransactStage,
    TransferRequest, UnshieldRequest, PRIVATE_ADDRESS_PREFIX,
};

pub struct TransactOrchestrator {
    engine: Arc<dyn PrivacyEngine>,
    chain: Arc<dyn ChainAccess>,
    refresh: Arc<RefreshCoordinator>,
    network: NetworkConfig,
    config: TransactConfig,
    builder: TransactBuilder,
    telemetry: Arc<dyn Telemetry>,
}

impl TransactOrchestrator {
    pub fn new(
        engine: Arc<dyn PrivacyEngine>,
        chain: Arc<dyn ChainAccess>,
        refresh: Arc<RefreshCoordinator>,
        network: NetworkConfig,
        config: TransactConfig,
    ) -> Self {
        Self {
            engine,
            chain,
            refresh,
            network,
            config,
            builder: TransactBuilder::default(),
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    pub fn with_builder(mut self, builder: TransactBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    fn stage(&self, kind: TransactKind, stage: TransactStage) {
        self.telemetry.transact_stage(kind, stage);
    }

    fn relay_contract(&self) -> TransactResult<Address> {
        let raw = self
            .network
            .shield_contract
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| TransactError::ContractNotConfigured(self.network.name.clone()))?;
        parse_address("shield_contract", raw)
    }

    fn token_or_default(&self, token: Option<Address>) -> TransactResult<Address> {
        match token {
            Some(token) => Ok(token),
            None => parse_address("wrapped_token", &self.network.wrapped_token),
        }
    }

    /// Send `request.amount_wei` from `account` to a confidential address.
    pub async fn transfer(
        &self,
        account: Option<&TransactAccount>,
        request: TransferRequest,
    ) -> TransactResult<TransactOutcome> {
        let kind = TransactKind::Transfer;
        self.stage(kind, TransactStage::CheckInputs);
        let contract = self.relay_contract()?;
        let account = account.ok_or(TransactError::WalletNotConnected)?;
        if !request.recipient.starts_with(PRIVATE_ADDRESS_PREFIX) {
            return Err(TransactError::InvalidRecipient(request.recipient));
        }
        if request.amount_wei.is_zero() {
            return Err(TransactError::ZeroAmount);
        }
        let token = self.token_or_default(request.token)?;

        let ctx = self.context(
            kind,
            account,
            request.memo,
            TransactRecipient {
                recipient: request.recipient,
                token: token.to_string(),
                amount_wei: request.amount_wei,
            },
        );
        Ok(self.execute(account, contract, ctx).await)
    }

    /// Withdraw `request.amount_wei` from `account` to a public address.
    pub async fn unshield(
        &self,
        account: Option<&TransactAccount>,
        request: UnshieldRequest,
    ) -> TransactResult<TransactOutcome> {
        let kind = TransactKind::Unshield;
        self.stage(kind, TransactStage::CheckInputs);
        let contract = self.relay_contract()?;
        let account = account.ok_or(TransactError::WalletNotConnected)?;
        if request.amount_wei.is_zero() {
            return Err(TransactError::ZeroAmount);
        }
        let token = self.token_or_default(request.token)?;
        let destination = request
            .recipient
            .unwrap_or_else(|| self.chain.signer_address());

        if self.config.preflight_refresh {
            self.stage(kind, TransactStage::PreflightRefresh);
            self.refresh_logged(account, "pre-unshield").await;
        }

        let ctx = self.context(
            kind,
            account,
            None,
            TransactRecipient {
                recipient: destination.to_string(),
                token: token.to_string(),
                amount_wei: request.amount_wei,
            },
        );
        Ok(self.execute(account, contract, ctx).await)
    }

    fn context(
        &self,
        kind: TransactKind,
        account: &TransactAccount,
        memo: Option<String>,
        recipient: TransactRecipient,
    ) -> TransactBuildContext {
        TransactBuildContext {
            kind,
            txid_version: self.network.txid_version.clone(),
            network_name: self.network.name.clone(),
            wallet_id: account.wallet_id.clone(),
            encryption_key: account.encryption_key,
            memo,
            recipient,
        }
    }

    async fn execute(
        &self,
        account: &TransactAccount,
        contract: Address,
        ctx: TransactBuildContext,
    ) -> TransactOutcome {
        let kind = ctx.kind;
        tracing::info!(
            kind = kind.as_str(),
            wallet_id = %account.wallet_id,
            token = %ctx.recipient.token,
            amount = %ctx.recipient.amount_wei,
            "Building proved transaction"
        );

        self.stage(kind, TransactStage::BuildTransaction);
        let telemetry = Arc::clone(&self.telemetry);
        let progress = move |fraction: f64| telemetry.proof_progress(kind, fraction);
        let built = match self.builder.build(self.engine.as_ref(), &ctx, &progress).await {
            Ok(built) => built,
            Err(e) => return failed(kind, TransactStage::BuildTransaction, e),
        };

        self.stage(kind, TransactStage::EnforceCanonicalTarget);
        let tx = enforce_canonical_target(built.proved.transaction, contract);

        self.stage(kind, TransactStage::Submit);
        let submitted = match self.chain.send_transaction(tx, self.config.confirmations).await {
            Ok(submitted) => submitted,
            Err(e) => return failed(kind, stage_of(&e), e),
        };
        self.stage(kind, TransactStage::AwaitConfirmation);
        tracing::info!(
            kind = kind.as_str(),
            tx_hash = %submitted.tx_hash,
            strategy = built.strategy,
            "Proved transaction confirmed"
        );

        self.stage(kind, TransactStage::PostRefresh);
        let reason = match kind {
            TransactKind::Transfer => "post-transfer",
            TransactKind::Unshield => "post-unshield",
        };
        self.refresh_logged(account, reason).await;

        let nullifiers = built.proved.nullifiers;
        let SubmittedTx { tx_hash, receipt } = submitted;
        TransactOutcome::Submitted {
            tx_hash,
            receipt: Box::new(receipt),
            tx_ref: nullifiers.first().copied().unwrap_or(B256::ZERO),
            nullifiers,
            memo_hash: ctx.memo.as_deref().map(memo_hash),
            memo: ctx.memo,
        }
    }

    async fn refresh_logged(&self, account: &TransactAccount, reason: &str) {
        let target = RefreshTarget {
            chain: account.chain,
            wallet_ids: vec![account.wallet_id.clone()],
        };
        let outcome = self.refresh.refresh(&target, reason, true, None).await;
        if !outcome.is_success() {
            tracing::warn!(reason, outcome = ?outcome, "Balance refresh did not succeed");
        }
    }
}

impl std::fmt::Debug for TransactOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactOrchestrator")
            .field("network", &self.network.name)
            .field("builder", &self.builder)
            .finish()
    }
}

fn parse_address(field: &'static str, value: &str) -> TransactResult<Address> {
    value.trim().parse().map_err(|_| TransactError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

fn failed(kind: TransactKind, stage: TransactStage, error: impl std::fmt::Display) -> TransactOutcome {
    tracing::error!(kind = kind.as_str(), stage = stage.as_str(), error = %error, "Transaction failed");
    TransactOutcome::Failed {
        stage,
        error: error.to_string(),
    }
}

fn stage_of(err: &BlockchainError) -> TransactStage {
    match err {
        BlockchainError::ConfirmationTimeout(_) | BlockchainError::Reverted(_) => {
            TransactStage::AwaitConfirmation
        }
        _ => TransactStage::Submit,
    }
}

//! Shield transaction build strategies.
//!
//! Engine builds take the shield arguments either positionally or as one
//! keyed object. Each convention is a [`BuildStrategy`]; [`ShieldBuilder`]
//! tries them in order and keeps the first that produces a transaction.

use alloy::primitives::{Address, U256};
use alloy::rpc::types::TransactionRequest;
use serde_json::{json, Map, Value};

use crate::engine::traits::PrivacyEngine;
use crate::engine::types::{EngineCall, EngineResult};
use crate::shield::types::ShieldIntent;

/// Everything a strategy needs to shape the engine call.
#[derive(Debug, Clone)]
pub struct ShieldBuildContext {
    pub txid_version: String,
    pub network_name: String,
    pub intent: ShieldIntent,
    /// Public address funding the shield.
    pub from_address: Address,
}

impl ShieldBuildContext {
    fn recipients(&self) -> Value {
        json!([{
            "recipientAddress": self.intent.recipient_private_address,
            "tokenAddress": self.intent.token_address.to_string(),
            "amount": self.intent.amount_wei.to_string(),
        }])
    }
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuiltShield {
    pub transaction: TransactionRequest,
    pub gas_estimate: U256,
    pub strategy: &'static str,
}

/// One engine calling convention.
pub trait BuildStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn shield_call(&self, ctx: &ShieldBuildContext) -> EngineCall;
}

/// `(txidVersion, networkName, shieldKey, erc20Recipients, nftRecipients, from)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PositionalStrategy;

impl BuildStrategy for PositionalStrategy {
    fn name(&self) -> &'static str {
        "positional"
    }

    fn shield_call(&self, ctx: &ShieldBuildContext) -> EngineCall {
        EngineCall::Positional(vec![
            Value::String(ctx.txid_version.clone()),
            Value::String(ctx.network_name.clone()),
            Value::String(ctx.intent.shield_key.to_string()),
            ctx.recipients(),
            Value::Array(Vec::new()),
            Value::String(ctx.from_address.to_string()),
        ])
    }
}

/// A single object with named fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyedStrategy;

impl BuildStrategy for KeyedStrategy {
    fn name(&self) -> &'static str {
        "keyed"
    }

    fn shield_call(&self, ctx: &ShieldBuildContext) -> EngineCall {
        let mut args = Map::new();
        args.insert("txidVersion".into(), Value::String(ctx.txid_version.clone()));
        args.insert("networkName".into(), Value::String(ctx.network_name.clone()));
        args.insert(
            "shieldPrivateKey".into(),
            Value::String(ctx.intent.shield_key.to_string()),
        );
        args.insert("erc20AmountRecipients".into(), ctx.recipients());
        args.insert("nftAmountRecipients".into(), Value::Array(Vec::new()));
        args.insert(
            "fromWalletAddress".into(),
            Value::String(ctx.from_address.to_string()),
        );
        EngineCall::Keyed(args)
    }
}

/// Ordered chain of strategies.
pub struct ShieldBuilder {
    strategies: Vec<Box<dyn BuildStrategy>>,
}

impl Default for ShieldBuilder {
    fn default() -> Self {
        Self::new(vec![Box::new(PositionalStrategy), Box::new(KeyedStrategy)])
    }
}

impl ShieldBuilder {
    pub fn new(strategies: Vec<Box<dyn BuildStrategy>>) -> Self {
        Self { strategies }
    }

    /// Estimate gas and populate the shield transaction, trying each
    /// strategy in order. Fails with every strategy's error joined.
    pub async fn build(
        &self,
        engine: &dyn PrivacyEngine,
        ctx: &ShieldBuildContext,
    ) -> Result<BuiltShield, String> {
        let mut errors = Vec::new();
        for strategy in &self.strategies {
            match Self::try_strategy(engine, strategy.as_ref(), ctx).await {
                Ok((transaction, gas_estimate)) => {
                    tracing::debug!(strategy = strategy.name(), %gas_estimate, "Shield transaction built");
                    return Ok(BuiltShield {
                        transaction,
                        gas_estimate,
                        strategy: strategy.name(),
                    });
                }
                Err(e) => {
                    tracing::warn!(strategy = strategy.name(), error = %e, "Shield build strategy failed");
                    errors.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }
        if errors.is_empty() {
            return Err("no build strategies configured".to_string());
        }
        Err(errors.join("; "))
    }

    async fn try_strategy(
        engine: &dyn PrivacyEngine,
        strategy: &dyn BuildStrategy,
        ctx: &ShieldBuildContext,
    ) -> EngineResult<(TransactionRequest, U256)> {
        let call = strategy.shield_call(ctx);
        let gas_estimate = engine.gas_estimate_for_shield(&call).await?;
        let transaction = engine.populate_shield(&call, gas_estimate).await?;
        Ok((transaction, gas_estimate))
    }
}

impl std::fmt::Debug for ShieldBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("ShieldBuilder").field("strategies", &names).finish()
    }
}

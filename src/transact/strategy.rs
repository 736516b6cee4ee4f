//! Proved transaction build strategies.
//!
//! Transfers and unshields go through three engine steps: gas estimate,
//! proof generation and populate. All three take the same arguments in the
//! same convention, so a [`TransactStrategy`] shapes one [`EngineCall`] and
//! [`TransactBuilder`] runs the steps with it, falling back to the next
//! convention when any step rejects the call.

use alloy::primitives::{B256, U256};
use serde_json::{json, Map, Value};

use crate::engine::traits::{PrivacyEngine, ProofProgress};
use crate::engine::types::{EngineCall, EngineResult, ProvedTransaction, TransactKind};

/// One recipient line of a transfer or unshield.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactRecipient {
    /// `0zk…` for transfers, a public `0x…` address for unshields.
    pub recipient: String,
    pub token: String,
    pub amount_wei: U256,
}

#[derive(Debug, Clone)]
pub struct TransactBuildContext {
    pub kind: TransactKind,
    pub txid_version: String,
    pub network_name: String,
    pub wallet_id: String,
    pub encryption_key: B256,
    /// Transfers only.
    pub memo: Option<String>,
    pub recipient: TransactRecipient,
}

impl TransactBuildContext {
    fn recipients(&self) -> Value {
        json!([{
            "tokenAddress": self.recipient.token,
            "amount": self.recipient.amount_wei.to_string(),
            "recipientAddress": self.recipient.recipient,
        }])
    }
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuiltTransact {
    pub proved: ProvedTransaction,
    pub gas_estimate: U256,
    pub strategy: &'static str,
}

pub trait TransactStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn transact_call(&self, ctx: &TransactBuildContext) -> EngineCall;
}

/// `(txidVersion, networkName, walletId, encryptionKey, [memo,]
/// erc20Recipients, nftRecipients, broadcasterFee, sendWithPublicWallet)`.
/// The memo slot exists for transfers only.
#[derive(Debug, Default, Clone, Copy)]
pub struct PositionalTransact;

impl TransactStrategy for PositionalTransact {
    fn name(&self) -> &'static str {
        "positional"
    }

    fn transact_call(&self, ctx: &TransactBuildContext) -> EngineCall {
        let mut args = vec![
            Value::String(ctx.txid_version.clone()),
            Value::String(ctx.network_name.clone()),
            Value::String(ctx.wallet_id.clone()),
            Value::String(ctx.encryption_key.to_string()),
        ];
        if ctx.kind == TransactKind::Transfer {
            args.push(ctx.memo.clone().map_or(Value::Null, Value::String));
        }
        args.extend([
            ctx.recipients(),
            Value::Array(Vec::new()),
            Value::Null,
            Value::Bool(true),
        ]);
        EngineCall::Positional(args)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct KeyedTransact;

impl TransactStrategy for KeyedTransact {
    fn name(&self) -> &'static str {
        "keyed"
    }

    fn transact_call(&self, ctx: &TransactBuildContext) -> EngineCall {
        let mut args = Map::new();
        args.insert("txidVersion".into(), Value::String(ctx.txid_version.clone()));
        args.insert("networkName".into(), Value::String(ctx.network_name.clone()));
        args.insert("railgunWalletID".into(), Value::String(ctx.wallet_id.clone()));
        args.insert(
            "encryptionKey".into(),
            Value::String(ctx.encryption_key.to_string()),
        );
        if ctx.kind == TransactKind::Transfer {
            args.insert(
                "memoText".into(),
                ctx.memo.clone().map_or(Value::Null, Value::String),
            );
        }
        args.insert("erc20AmountRecipients".into(), ctx.recipients());
        args.insert("nftAmountRecipients".into(), Value::Array(Vec::new()));
        args.insert("sendWithPublicWallet".into(), Value::Bool(true));
        EngineCall::Keyed(args)
    }
}

pub struct TransactBuilder {
    strategies: Vec<Box<dyn TransactStrategy>>,
}

impl Default for TransactBuilder {
    fn default() -> Self {
        Self::new(vec![Box::new(PositionalTransact), Box::new(KeyedTransact)])
    }
}

impl TransactBuilder {
    pub fn new(strategies: Vec<Box<dyn TransactStrategy>>) -> Self {
        Self { strategies }
    }

    /// Estimate, prove and populate with each strategy in order. Fails
    /// with every strategy's error joined.
    pub async fn build(
        &self,
        engine: &dyn PrivacyEngine,
        ctx: &TransactBuildContext,
        progress: ProofProgress<'_>,
    ) -> Result<BuiltTransact, String> {
        let mut errors = Vec::new();
        for strategy in &self.strategies {
            let call = strategy.transact_call(ctx);
            match Self::run_steps(engine, ctx.kind, &call, progress).await {
                Ok((proved, gas_estimate)) => {
                    tracing::debug!(
                        kind = ctx.kind.as_str(),
                        strategy = strategy.name(),
                        %gas_estimate,
                        nullifiers = proved.nullifiers.len(),
                        "Proved transaction built"
                    );
                    return Ok(BuiltTransact {
                        proved,
                        gas_estimate,
                        strategy: strategy.name(),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        kind = ctx.kind.as_str(),
                        strategy = strategy.name(),
                        error = %e,
                        "Transact build strategy failed"
                    );
                    errors.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }
        if errors.is_empty() {
            return Err("no build strategies configured".to_string());
        }
        Err(errors.join("; "))
    }

    async fn run_steps(
        engine: &dyn PrivacyEngine,
        kind: TransactKind,
        call: &EngineCall,
        progress: ProofProgress<'_>,
    ) -> EngineResult<(ProvedTransaction, U256)> {
        let gas_estimate = engine.gas_estimate_for_transact(kind, call).await?;
        engine.generate_proof(kind, call, progress).await?;
        let proved = engine.populate_proved(kind, call, gas_estimate).await?;
        Ok((proved, gas_estimate))
    }
}

impl std::fmt::Debug for TransactBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("TransactBuilder").field("strategies", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(kind: TransactKind) -> TransactBuildContext {
        TransactBuildContext {
            kind,
            txid_version: "V2_PoseidonMerkle".into(),
            network_name: "EthereumSepolia".into(),
            wallet_id: "w1".into(),
            encryption_key: B256::repeat_byte(0x07),
            memo: Some("Private-Payment:direct:1".into()),
            recipient: TransactRecipient {
                recipient: "0zk1seller".into(),
                token: "0xfff9976782d46CC05630d1f6eBAb18b2324d6B14".into(),
                amount_wei: U256::from(500),
            },
        }
    }

    #[test]
    fn test_transfer_positional_carries_memo() {
        let EngineCall::Positional(args) = PositionalTransact.transact_call(&ctx(TransactKind::Transfer)) else {
            panic!("expected positional call");
        };
        assert_eq!(args.len(), 9);
        assert_eq!(args[2], "w1");
        assert_eq!(args[4], "Private-Payment:direct:1");
        assert_eq!(args[5][0]["recipientAddress"], "0zk1seller");
        assert_eq!(args[5][0]["amount"], "500");
        assert_eq!(args[8], Value::Bool(true));
    }

    #[test]
    fn test_unshield_positional_has_no_memo_slot() {
        let EngineCall::Positional(args) = PositionalTransact.transact_call(&ctx(TransactKind::Unshield)) else {
            panic!("expected positional call");
        };
        assert_eq!(args.len(), 8);
        assert_eq!(args[4][0]["recipientAddress"], "0zk1seller");
    }

    #[test]
    fn test_keyed_matches_positional_values() {
        let ctx = ctx(TransactKind::Transfer);
        let EngineCall::Keyed(keyed) = KeyedTransact.transact_call(&ctx) else {
            panic!("expected keyed call");
        };
        let EngineCall::Positional(positional) = PositionalTransact.transact_call(&ctx) else {
            panic!("expected positional call");
        };
        assert_eq!(keyed["encryptionKey"], positional[3]);
        assert_eq!(keyed["memoText"], positional[4]);
        assert_eq!(keyed["erc20AmountRecipients"], positional[5]);

        let EngineCall::Keyed(unshield) = KeyedTransact.transact_call(&self::ctx(TransactKind::Unshield)) else {
            panic!("expected keyed call");
        };
        assert!(!unshield.contains_key("memoText"));
    }
}

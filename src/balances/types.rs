//! Balance snapshots and aggregated views.

use std::collections::BTreeMap;
use std::time::SystemTime;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::balances::bucket::{BalanceBucket, RawBucketKey};

/// Amount of one token, in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub token_address: Address,
    pub amount: U256,
}

impl TokenAmount {
    pub fn new(token_address: Address, amount: U256) -> Self {
        Self {
            token_address,
            amount,
        }
    }
}

/// A bucket snapshot pushed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    pub wallet_id: String,
    pub chain_id: u64,
    pub bucket: RawBucketKey,
    pub tokens: Vec<TokenAmount>,
}

/// Latest snapshot of one bucket. Replaced wholesale on every push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceBucketEntry {
    pub bucket: BalanceBucket,
    pub tokens: Vec<TokenAmount>,
    pub updated_at: SystemTime,
}

/// Per-token totals.
pub type TokenTotals = BTreeMap<Address, U256>;

/// Aggregated balances for presentation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceSummary {
    pub spendable: TokenTotals,
    /// ShieldPending + MissingInternalProof + MissingExternalProof + ProofSubmitted.
    pub pending: TokenTotals,
    /// `spendable + pending` on networks without complete proof-of-innocence
    /// support, otherwise equal to `spendable`.
    pub display_spendable: TokenTotals,
    /// Every cached bucket, including Blocked.
    pub buckets: BTreeMap<BalanceBucket, Vec<TokenAmount>>,
}

impl BalanceSummary {
    pub fn spendable_of(&self, token: &Address) -> U256 {
        self.spendable.get(token).copied().unwrap_or(U256::ZERO)
    }

    pub fn pending_of(&self, token: &Address) -> U256 {
        self.pending.get(token).copied().unwrap_or(U256::ZERO)
    }

    pub fn display_spendable_of(&self, token: &Address) -> U256 {
        self.display_spendable
            .get(token)
            .copied()
            .unwrap_or(U256::ZERO)
    }
}

/// Receives bucket snapshots from the engine.
pub trait BalanceSink: Send + Sync {
    fn on_balance_update(&self, update: BalanceUpdate);
}

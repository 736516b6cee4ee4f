//! Balance bucket caching.
//!
//! # Responsibilities
//! - Hold the latest snapshot per bucket for the active wallet
//! - Parse raw bucket keys once, dropping unknown ones
//! - Aggregate spendable/pending totals per token on read

use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use alloy::primitives::U256;
use dashmap::DashMap;

use crate::balances::bucket::BalanceBucket;
use crate::balances::types::{
    BalanceBucketEntry, BalanceSink, BalanceSummary, BalanceUpdate, TokenAmount, TokenTotals,
};
use crate::observability::{NoopTelemetry, Telemetry};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveWallet {
    wallet_id: String,
    chain_id: u64,
}

/// A thread-safe cache of per-bucket balance snapshots.
#[derive(Debug, Clone)]
pub struct BalanceCache {
    inner: Arc<DashMap<BalanceBucket, BalanceBucketEntry>>,
    active: Arc<RwLock<Option<ActiveWallet>>>,
    telemetry: Arc<dyn Telemetry>,
}

impl Default for BalanceCache {
    fn default() -> Self {
        Self::new(Arc::new(NoopTelemetry))
    }
}

impl BalanceCache {
    pub fn new(telemetry: Arc<dyn Telemetry>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            active: Arc::new(RwLock::new(None)),
            telemetry,
        }
    }

    /// Scope the cache to one wallet on one chain. Switching wallets drops
    /// every cached bucket.
    pub fn set_active_wallet(&self, wallet_id: &str, chain_id: u64) {
        let next = ActiveWallet {
            wallet_id: wallet_id.to_string(),
            chain_id,
        };
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref() != Some(&next) {
            self.inner.clear();
            *active = Some(next);
        }
    }

    /// Forget the active wallet and every snapshot.
    pub fn clear(&self) {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        *active = None;
        self.inner.clear();
        tracing::debug!("Balance cache cleared");
    }

    /// Apply an engine push. Returns the bucket written, or `None` when the
    /// update was ignored.
    ///
    /// The scope read lock is held through the write, so a concurrent wallet
    /// switch or clear never sees a bucket from the previous wallet land
    /// after it.
    pub fn apply(&self, update: BalanceUpdate) -> Option<BalanceBucket> {
        let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
        match active.as_ref() {
            Some(a) if a.wallet_id == update.wallet_id && a.chain_id == update.chain_id => {}
            _ => {
                tracing::debug!(
                    wallet_id = %update.wallet_id,
                    chain_id = update.chain_id,
                    "Ignoring balance update for inactive wallet"
                );
                return None;
            }
        }

        let bucket = match update.bucket.parse() {
            Ok(bucket) => bucket,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping balance update");
                return None;
            }
        };

        let token_count = update.tokens.len();
        self.inner.insert(
            bucket,
            BalanceBucketEntry {
                bucket,
                tokens: update.tokens,
                updated_at: SystemTime::now(),
            },
        );
        drop(active);

        self.telemetry.balance_update(bucket, token_count);
        Some(bucket)
    }

    pub fn entry(&self, bucket: BalanceBucket) -> Option<BalanceBucketEntry> {
        self.inner.get(&bucket).map(|r| r.value().clone())
    }

    /// Aggregate the cached buckets. Absent buckets count as zero.
    pub fn get_balances(&self, poi_incomplete: bool) -> BalanceSummary {
        let mut summary = BalanceSummary::default();

        for r in self.inner.iter() {
            let entry = r.value();
            summary.buckets.insert(entry.bucket, entry.tokens.clone());

            let target = match entry.bucket {
                BalanceBucket::Spendable => &mut summary.spendable,
                b if b.is_pending() => &mut summary.pending,
                _ => continue,
            };
            add_all(target, &entry.tokens);
        }

        summary.display_spendable = summary.spendable.clone();
        if poi_incomplete {
            for (token, amount) in &summary.pending {
                let total = summary.display_spendable.entry(*token).or_insert(U256::ZERO);
                *total = total.saturating_add(*amount);
            }
        }
        summary
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

fn add_all(totals: &mut TokenTotals, tokens: &[TokenAmount]) {
    for t in tokens {
        let total = totals.entry(t.token_address).or_insert(U256::ZERO);
        *total = total.saturating_add(t.amount);
    }
}

impl BalanceSink for BalanceCache {
    fn on_balance_update(&self, update: BalanceUpdate) {
        self.apply(update);
    }
}

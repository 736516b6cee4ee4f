//! Debounced balance refresh.
//!
//! # Responsibilities
//! - Collapse bursts of refresh requests into at most one engine scan
//! - Never run two scans at once
//! - Turn every engine failure into a [`RefreshOutcome`], never a panic
//!
//! # Design Decisions
//! - `in_flight` counts running scans and is released by a drop guard, so
//!   an erroring or cancelled scan cannot wedge the coordinator and a
//!   forced scan overlapping another keeps the coordinator busy until both
//!   finish
//! - The scan watchdog only warns; there is no hard cancellation

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::balances::cache::BalanceCache;
use crate::balances::types::BalanceSummary;
use crate::blockchain::types::ChainId;
use crate::config::RefreshConfig;
use crate::engine::traits::PrivacyEngine;
use crate::engine::types::EngineResult;
use crate::observability::{NoopTelemetry, Telemetry};

/// Why a refresh request did not reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    Debounced,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InFlight => "in_flight",
            Self::Debounced => "debounced",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed {
        summary: BalanceSummary,
        /// Tolerated engine error, if any.
        warning: Option<String>,
    },
    Skipped {
        cause: SkipReason,
    },
    Failed {
        error: String,
    },
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Refreshed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Which wallets to scan on which chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTarget {
    pub chain: ChainId,
    pub wallet_ids: Vec<String>,
}

#[derive(Debug, Default)]
struct RefreshState {
    in_flight: usize,
    last_refresh_at: Option<Instant>,
}

/// Releases one `in_flight` slot and stamps `last_refresh_at` on every exit path.
struct InFlightGuard<'a> {
    state: &'a Mutex<RefreshState>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.in_flight = state.in_flight.saturating_sub(1);
        state.last_refresh_at = Some(Instant::now());
    }
}

pub struct RefreshCoordinator {
    engine: Arc<dyn PrivacyEngine>,
    cache: BalanceCache,
    config: RefreshConfig,
    poi_incomplete: bool,
    txid_sync_incomplete: bool,
    state: Mutex<RefreshState>,
    telemetry: Arc<dyn Telemetry>,
}

impl RefreshCoordinator {
    pub fn new(
        engine: Arc<dyn PrivacyEngine>,
        cache: BalanceCache,
        config: RefreshConfig,
        poi_incomplete: bool,
        txid_sync_incomplete: bool,
    ) -> Self {
        Self {
            engine,
            cache,
            config,
            poi_incomplete,
            txid_sync_incomplete,
            state: Mutex::new(RefreshState::default()),
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight > 0
    }

    /// Refresh balances for `target`.
    ///
    /// Without `force`, requests arriving while a scan runs or within the
    /// debounce window of the last one are skipped. `settle_delay` overrides
    /// the configured wait after the scan; `Some(Duration::ZERO)` disables it.
    pub async fn refresh(
        &self,
        target: &RefreshTarget,
        reason: &str,
        force: bool,
        settle_delay: Option<Duration>,
    ) -> RefreshOutcome {
        let guard = {
            let mut state = self.lock();
            if !force {
                let cause = if state.in_flight > 0 {
                    Some(SkipReason::InFlight)
                } else if state.last_refresh_at.is_some_and(|at| at.elapsed() < self.debounce()) {
                    Some(SkipReason::Debounced)
                } else {
                    None
                };
                if let Some(cause) = cause {
                    self.telemetry.refresh_skipped(reason, cause);
                    return RefreshOutcome::Skipped { cause };
                }
            }
            state.in_flight += 1;
            InFlightGuard { state: &self.state }
        };

        self.telemetry.refresh_started(reason, force);
        let started = Instant::now();

        let result = self.scan(target).await;
        let outcome = match result {
            Ok(()) => {
                self.settle(settle_delay).await;
                self.refreshed(None)
            }
            Err(e) if self.txid_sync_incomplete && e.is_txid_sync_failure() => {
                tracing::info!(error = %e, reason, "Ignoring TXID sync failure on this network");
                self.settle(settle_delay).await;
                self.refreshed(Some(e.to_string()))
            }
            Err(e) => {
                tracing::warn!(error = %e, reason, "Balance refresh failed");
                RefreshOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        drop(guard);
        self.telemetry
            .refresh_finished(reason, outcome.is_success(), started.elapsed());
        outcome
    }

    async fn scan(&self, target: &RefreshTarget) -> EngineResult<()> {
        let watchdog = Duration::from_secs(self.config.scan_watchdog_secs);
        let started = Instant::now();
        let scan = self.engine.refresh_balances(target.chain, &target.wallet_ids);
        tokio::pin!(scan);

        let mut warned = false;
        loop {
            tokio::select! {
                result = &mut scan => return result,
                _ = sleep(watchdog), if !warned => {
                    warned = true;
                    self.telemetry.scan_watchdog_fired(started.elapsed());
                    tracing::warn!(
                        chain_id = target.chain.0,
                        wallets = target.wallet_ids.len(),
                        "Unspent-output scan exceeded watchdog, still waiting"
                    );
                }
            }
        }
    }

    async fn settle(&self, settle_delay: Option<Duration>) {
        let delay = settle_delay.unwrap_or(Duration::from_millis(self.config.settle_delay_ms));
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }

    fn refreshed(&self, warning: Option<String>) -> RefreshOutcome {
        RefreshOutcome::Refreshed {
            summary: self.cache.get_balances(self.poi_incomplete),
            warning,
        }
    }

    fn debounce(&self) -> Duration {
        Duration::from_millis(self.config.debounce_ms)
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("config", &self.config)
            .field("state", &*self.lock())
            .finish()
    }
}

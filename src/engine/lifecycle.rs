//! Idempotent engine and network initialization.
//!
//! # Responsibilities
//! - Start the engine at most once per composition root
//! - Load the target network at most once, after the engine is up
//! - Track which wallets are loaded
//!
//! # Data Flow
//! ```text
//! ensure_engine_started ──┐
//! ensure_engine_started ──┼─→ one shared in-flight future → engine.start()
//! ensure_engine_started ──┘         │
//!                                   ├─ Ok  → started = true
//!                                   └─ Err → future cleared, next call retries
//! ```
//!
//! # Design Decisions
//! - The state lock is never held across an await; callers clone the
//!   shared future out of the lock and await it outside
//! - Each in-flight future carries its own attempt id. Only the waiter
//!   that finds its attempt still in the slot settles it, so neither a
//!   `reset()` nor a retry started by another waiter is undone by a stale
//!   completion

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy::primitives::B256;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;

use crate::blockchain::types::ChainId;
use crate::config::{EngineConfig, NetworkConfig};
use crate::engine::registry::EngineHandle;
use crate::engine::traits::PrivacyEngine;
use crate::engine::types::{EngineError, WalletInfo};

/// Errors from lifecycle guards. Cloneable so one failed start can be
/// reported to every concurrent waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Engine start failed: {0}")]
    EngineStart(String),

    #[error("Network load failed: {0}")]
    NetworkLoad(String),

    #[error("Engine not started")]
    EngineNotStarted,

    #[error("Wallet {0} is not loaded")]
    WalletNotLoaded(String),

    #[error("Another engine instance ({held}) already owns this registry, refusing {requested}")]
    DuplicateInstance { held: String, requested: String },

    #[error("Engine error: {0}")]
    Engine(String),
}

impl From<EngineError> for LifecycleError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::WalletNotLoaded(id) => Self::WalletNotLoaded(id),
            other => Self::Engine(other.to_string()),
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

type InitFuture = Shared<BoxFuture<'static, LifecycleResult<()>>>;

#[derive(Clone)]
struct InFlight {
    attempt: u64,
    future: InitFuture,
}

impl InFlight {
    /// Take `slot` if it still holds this attempt.
    fn settle(&self, slot: &mut Option<InFlight>) -> bool {
        if slot.as_ref().is_some_and(|f| f.attempt == self.attempt) {
            *slot = None;
            true
        } else {
            false
        }
    }
}

/// Process-side view of the engine's initialization state.
#[derive(Default)]
struct EngineState {
    started: bool,
    network_configured: bool,
    wallets_loaded: HashSet<String>,
    start_future: Option<InFlight>,
    network_future: Option<InFlight>,
    next_attempt: u64,
}

impl EngineState {
    fn next_attempt(&mut self) -> u64 {
        self.next_attempt += 1;
        self.next_attempt
    }
}

/// Owns the engine handle and guards its initialization.
pub struct EngineLifecycle {
    handle: EngineHandle,
    state: Mutex<EngineState>,
}

impl EngineLifecycle {
    pub fn new(handle: EngineHandle) -> Self {
        Self {
            handle,
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn engine(&self) -> &Arc<dyn PrivacyEngine> {
        self.handle.engine()
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    pub fn is_network_loaded(&self) -> bool {
        self.lock().network_configured
    }

    /// Start the engine unless it already runs. Concurrent callers share one
    /// start attempt and observe the same result.
    pub async fn ensure_engine_started(&self, config: &EngineConfig) -> LifecycleResult<()> {
        let in_flight = {
            let mut state = self.lock();
            if state.started {
                return Ok(());
            }
            match &state.start_future {
                Some(in_flight) => in_flight.clone(),
                None => {
                    let engine = Arc::clone(self.handle.engine());
                    let config = config.clone();
                    let future = async move {
                        tracing::info!(wallet_source = %config.wallet_source, "Starting engine");
                        engine
                            .start(&config)
                            .await
                            .map_err(|e| LifecycleError::EngineStart(e.to_string()))
                    }
                    .boxed()
                    .shared();
                    let in_flight = InFlight {
                        attempt: state.next_attempt(),
                        future,
                    };
                    state.start_future = Some(in_flight.clone());
                    in_flight
                }
            }
        };

        let result = in_flight.future.clone().await;

        let mut state = self.lock();
        if in_flight.settle(&mut state.start_future) {
            match &result {
                Ok(()) => state.started = true,
                Err(e) => tracing::error!(error = %e, "Engine start failed, next call will retry"),
            }
        }
        result
    }

    /// Load the network into the engine unless already loaded.
    pub async fn ensure_network_loaded(
        &self,
        network: &NetworkConfig,
        chain: ChainId,
    ) -> LifecycleResult<()> {
        let in_flight = {
            let mut state = self.lock();
            if !state.started {
                return Err(LifecycleError::EngineNotStarted);
            }
            if state.network_configured {
                return Ok(());
            }
            match &state.network_future {
                Some(in_flight) => in_flight.clone(),
                None => {
                    let engine = Arc::clone(self.handle.engine());
                    let network = network.clone();
                    let future = async move {
                        tracing::info!(network = %network.name, chain_id = chain.0, "Loading network");
                        engine
                            .load_network(&network, chain)
                            .await
                            .map_err(|e| LifecycleError::NetworkLoad(e.to_string()))
                    }
                    .boxed()
                    .shared();
                    let in_flight = InFlight {
                        attempt: state.next_attempt(),
                        future,
                    };
                    state.network_future = Some(in_flight.clone());
                    in_flight
                }
            }
        };

        let result = in_flight.future.clone().await;

        let mut state = self.lock();
        if in_flight.settle(&mut state.network_future) {
            if result.is_ok() {
                state.network_configured = true;
            }
        }
        result
    }

    /// Create a new wallet and mark it loaded.
    pub async fn create_wallet(&self, encryption_key: B256) -> LifecycleResult<WalletInfo> {
        if !self.is_started() {
            return Err(LifecycleError::EngineNotStarted);
        }
        let info = self.engine().create_wallet(encryption_key).await?;
        self.lock().wallets_loaded.insert(info.id.clone());
        tracing::info!(wallet_id = %info.id, "Wallet created");
        Ok(info)
    }

    /// Load a wallet by id. Loading an already loaded id is a no-op.
    pub async fn load_wallet(&self, wallet_id: &str, encryption_key: B256) -> LifecycleResult<WalletInfo> {
        {
            let state = self.lock();
            if !state.started {
                return Err(LifecycleError::EngineNotStarted);
            }
            if state.wallets_loaded.contains(wallet_id) {
                drop(state);
                return Ok(self.engine().wallet_for_id(wallet_id)?);
            }
        }

        let info = self.engine().load_wallet_by_id(wallet_id, encryption_key).await?;
        self.lock().wallets_loaded.insert(wallet_id.to_string());
        tracing::info!(wallet_id, "Wallet loaded");
        Ok(info)
    }

    /// Lookup of a previously loaded wallet.
    pub fn get_wallet_by_id(&self, wallet_id: &str) -> LifecycleResult<WalletInfo> {
        if !self.lock().wallets_loaded.contains(wallet_id) {
            return Err(LifecycleError::WalletNotLoaded(wallet_id.to_string()));
        }
        Ok(self.engine().wallet_for_id(wallet_id)?)
    }

    pub fn loaded_wallets(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.lock().wallets_loaded.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Forget all initialization state. In-flight initializations complete
    /// but no longer affect this lifecycle.
    pub fn reset(&self) {
        let mut state = self.lock();
        *state = EngineState {
            next_attempt: state.next_attempt,
            ..EngineState::default()
        };
        tracing::debug!("Engine lifecycle reset");
    }
}

impl std::fmt::Debug for EngineLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("EngineLifecycle")
            .field("instance", &self.handle.instance_id())
            .field("started", &state.started)
            .field("network_configured", &state.network_configured)
            .field("wallets_loaded", &state.wallets_loaded.len())
            .finish()
    }
}

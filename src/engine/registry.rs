//! Single-owner engine registry.
//!
//! The engine keeps process-global state, so two engine instances in one
//! process corrupt each other. The registry hands out handles for exactly
//! one engine identity at a time; the slot frees when the last handle drops.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use uuid::Uuid;

use crate::engine::lifecycle::{LifecycleError, LifecycleResult};
use crate::engine::traits::PrivacyEngine;

#[derive(Debug, Default)]
struct Slot {
    owner: Option<Uuid>,
    handles: usize,
}

#[derive(Debug, Default)]
pub struct EngineRegistry {
    slot: Mutex<Slot>,
}

static GLOBAL: OnceLock<Arc<EngineRegistry>> = OnceLock::new();

impl EngineRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The process-wide registry.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(Self::new))
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a handle on `engine`. Fails with `DuplicateInstance` while
    /// handles for a different engine are outstanding.
    pub fn acquire(self: &Arc<Self>, engine: Arc<dyn PrivacyEngine>) -> LifecycleResult<EngineHandle> {
        let requested = engine.instance_id();
        let mut slot = self.lock();
        match slot.owner {
            Some(held) if held != requested => {
                tracing::error!(%held, %requested, "Duplicate engine instance");
                return Err(LifecycleError::DuplicateInstance {
                    held: held.to_string(),
                    requested: requested.to_string(),
                });
            }
            _ => {
                slot.owner = Some(requested);
                slot.handles += 1;
            }
        }
        Ok(EngineHandle {
            registry: Arc::clone(self),
            engine,
        })
    }

    /// Identity of the engine currently holding the registry.
    pub fn owner(&self) -> Option<Uuid> {
        self.lock().owner
    }

    fn release(&self) {
        let mut slot = self.lock();
        slot.handles = slot.handles.saturating_sub(1);
        if slot.handles == 0 {
            if let Some(owner) = slot.owner.take() {
                tracing::debug!(%owner, "Engine registry released");
            }
        }
    }
}

/// Registry-issued access to an engine. Dropping it releases the slot.
pub struct EngineHandle {
    registry: Arc<EngineRegistry>,
    engine: Arc<dyn PrivacyEngine>,
}

impl EngineHandle {
    pub fn engine(&self) -> &Arc<dyn PrivacyEngine> {
        &self.engine
    }

    pub fn instance_id(&self) -> Uuid {
        self.engine.instance_id()
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.registry.release();
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("instance", &self.engine.instance_id())
            .finish()
    }
}

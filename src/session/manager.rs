//! In-memory session state backed by a [`SessionStore`].

use std::sync::{Arc, PoisonError, RwLock};

use alloy::primitives::Address;

use crate::session::store::SessionStore;
use crate::session::types::{SessionError, SessionRecord, SessionResult};

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    current: RwLock<Option<SessionRecord>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            current: RwLock::new(None),
        }
    }

    pub fn current(&self) -> Option<SessionRecord> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_connected(&self) -> bool {
        self.current().is_some()
    }

    /// Stored record `user` may reuse on connect. A record belonging to
    /// someone else is cleared.
    pub fn reusable_record(&self, user: Address, network: &str) -> SessionResult<Option<SessionRecord>> {
        match self.store.load()? {
            Some(record) if !record.belongs_to(user) => {
                tracing::info!(stored = %record.user_address, user = %user, "Clearing session of a different user");
                self.store.clear()?;
                Ok(None)
            }
            Some(record) if record.network == network => Ok(Some(record)),
            _ => Ok(None),
        }
    }

    /// Persist `record` and make it the active session.
    pub fn establish(&self, record: SessionRecord) -> SessionResult<()> {
        self.store.save(&record)?;
        tracing::info!(
            user = %record.user_address,
            wallet_id = %record.wallet_id,
            network = %record.network,
            "Session established"
        );
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(record);
        Ok(())
    }

    /// Drop the active session and the stored record.
    pub fn disconnect(&self) -> SessionResult<()> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.store.clear()?;
        tracing::info!("Session disconnected");
        Ok(())
    }

    /// Drop the active session but keep the stored record.
    pub fn deactivate(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Reactivate the stored session for `user`. A record belonging to a
    /// different user is left untouched.
    pub fn restore(&self, user: Address) -> SessionResult<SessionRecord> {
        let record = self.store.load()?.ok_or(SessionError::NoStoredSession)?;
        if !record.belongs_to(user) {
            return Err(SessionError::DifferentUser {
                stored: record.user_address,
            });
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        tracing::info!(user = %user, wallet_id = %record.wallet_id, "Session restored");
        Ok(record)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("connected", &self.is_connected())
            .finish()
    }
}

//! Session data types and error definitions.

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The persisted link between a public account and its confidential wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub network: String,
    pub wallet_id: String,
    pub private_address: String,
    pub user_address: Address,
    /// Derived from the user's signature; reopens the engine wallet.
    pub encryption_key: B256,
    /// Unix seconds.
    pub connected_at: u64,
}

impl SessionRecord {
    /// Address comparison is over bytes, so hex casing never matters.
    pub fn belongs_to(&self, user: Address) -> bool {
        self.user_address == user
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No stored session found")]
    NoStoredSession,

    #[error("Different user: stored session belongs to {stored}")]
    DifferentUser { stored: Address },

    #[error("Session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session record unreadable: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;

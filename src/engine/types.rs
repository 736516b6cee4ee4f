//! Engine-facing data types and error definitions.

use alloy::primitives::B256;
use alloy::rpc::types::TransactionRequest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Marker the engine puts in errors raised by its secondary TXID tree sync.
const TXID_SYNC_MARKER: &str = "txid";

/// Errors surfaced by the confidential-transaction engine.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Engine failed to start: {0}")]
    Start(String),

    #[error("Network load failed: {0}")]
    NetworkLoad(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Wallet {0} is not loaded")]
    WalletNotLoaded(String),

    #[error("Balance refresh failed: {0}")]
    Refresh(String),

    /// Secondary TXID merkletree sync failed; balances may still be usable.
    #[error("TXID sync failed: {0}")]
    TxidSyncFailed(String),

    /// The call shape was not the one this engine build expects.
    #[error("Calling convention rejected: {0}")]
    ConventionMismatch(String),

    #[error("Shield call failed: {0}")]
    Shield(String),

    #[error("Proof generation failed: {0}")]
    Proof(String),

    #[error("Transaction population failed: {0}")]
    Populate(String),
}

impl EngineError {
    /// Whether the failure came from TXID tree sync, either tagged as such or
    /// carrying the engine's TXID marker in a generic refresh error.
    pub fn is_txid_sync_failure(&self) -> bool {
        match self {
            Self::TxidSyncFailed(_) => true,
            Self::Refresh(message) => message.to_ascii_lowercase().contains(TXID_SYNC_MARKER),
            _ => false,
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// A confidential wallet known to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub id: String,
    /// Bech32-style confidential receiving address.
    pub private_address: String,
}

/// Arguments for an engine gas-estimate, proof or populate call.
///
/// Engine builds disagree on whether these take positional arguments or a
/// single keyed object; the orchestrators try both.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Positional(Vec<Value>),
    Keyed(Map<String, Value>),
}

impl EngineCall {
    pub fn convention(&self) -> &'static str {
        match self {
            Self::Positional(_) => "positional",
            Self::Keyed(_) => "keyed",
        }
    }
}

/// Proved confidential transaction kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactKind {
    /// Confidential wallet to confidential wallet.
    Transfer,
    /// Confidential wallet to a public address.
    Unshield,
}

impl TransactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Unshield => "unshield",
        }
    }
}

/// A populated transaction together with the nullifiers it spends.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvedTransaction {
    pub transaction: TransactionRequest,
    pub nullifiers: Vec<B256>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txid_failure_detection() {
        assert!(EngineError::TxidSyncFailed("timeout".into()).is_txid_sync_failure());
        assert!(EngineError::Refresh("Failed to sync TXID merkletree".into()).is_txid_sync_failure());
        assert!(!EngineError::Refresh("scan aborted".into()).is_txid_sync_failure());
        assert!(!EngineError::Start("boom".into()).is_txid_sync_failure());
    }

    #[test]
    fn test_engine_call_convention() {
        assert_eq!(EngineCall::Positional(Vec::new()).convention(), "positional");
        assert_eq!(EngineCall::Keyed(Map::new()).convention(), "keyed");
    }
}

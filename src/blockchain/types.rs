//! Chain-specific types and error definitions.

use alloy::primitives::TxHash;
use alloy::rpc::types::TransactionReceipt;
use thiserror::Error;

// Re-export BlockchainConfig from config module to avoid duplication
pub use crate::config::schema::BlockchainConfig;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// JSON-RPC error codes providers use for throttling.
const RATE_LIMIT_CODES: [&str; 2] = ["-32005", "-32016"];

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Transaction was not confirmed within expected time.
    #[error("Transaction {0} not confirmed")]
    ConfirmationTimeout(TxHash),

    /// Transaction was reverted on-chain.
    #[error("Transaction reverted: {0}")]
    Reverted(TxHash),

    /// Contract call failed before reaching the chain.
    #[error("Contract call failed: {0}")]
    Contract(String),

    /// Invalid private key format or signing failure.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Blockchain client not initialized or disabled.
    #[error("Blockchain not available: {0}")]
    NotAvailable(String),
}

impl BlockchainError {
    /// Whether the provider rejected the call for throttling reasons.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::Rpc(message) => {
                let lower = message.to_ascii_lowercase();
                lower.contains("429")
                    || lower.contains("rate limit")
                    || lower.contains("too many requests")
                    || RATE_LIMIT_CODES.iter().any(|code| lower.contains(code))
            }
            _ => false,
        }
    }
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// A mined transaction the relay sent.
#[derive(Debug, Clone)]
pub struct SubmittedTx {
    pub tx_hash: TxHash,
    pub receipt: TransactionReceipt,
}

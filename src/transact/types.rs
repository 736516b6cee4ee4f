//! Private transfer and unshield types.

use std::fmt;

use alloy::primitives::{keccak256, Address, TxHash, B256, U256};
use alloy::rpc::types::TransactionReceipt;
use thiserror::Error;

use crate::blockchain::types::ChainId;

/// Prefix of every confidential receiving address.
pub const PRIVATE_ADDRESS_PREFIX: &str = "0zk";

/// Confidential wallet spending notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactAccount {
    pub wallet_id: String,
    /// Unlocks the wallet for proof generation.
    pub encryption_key: B256,
    pub chain: ChainId,
}

/// Move confidential funds to another confidential address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Recipient `0zk…` address.
    pub recipient: String,
    /// Token to send; the network's wrapped token when `None`.
    pub token: Option<Address>,
    pub amount_wei: U256,
    /// Memo recorded in the transaction; its hash is returned for audit.
    pub memo: Option<String>,
}

/// Move confidential funds back to a public address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnshieldRequest {
    /// Destination; the signer's own address when `None`.
    pub recipient: Option<Address>,
    /// Token to withdraw; the network's wrapped token when `None`.
    pub token: Option<Address>,
    pub amount_wei: U256,
}

/// Step of the transfer/unshield pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactStage {
    CheckInputs,
    PreflightRefresh,
    BuildTransaction,
    EnforceCanonicalTarget,
    Submit,
    AwaitConfirmation,
    PostRefresh,
}

impl TransactStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckInputs => "check_inputs",
            Self::PreflightRefresh => "preflight_refresh",
            Self::BuildTransaction => "build_transaction",
            Self::EnforceCanonicalTarget => "enforce_canonical_target",
            Self::Submit => "submit",
            Self::AwaitConfirmation => "await_confirmation",
            Self::PostRefresh => "post_refresh",
        }
    }
}

impl fmt::Display for TransactStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum TransactOutcome {
    Submitted {
        tx_hash: TxHash,
        receipt: Box<TransactionReceipt>,
        /// First spent nullifier, or zero when the engine reported none.
        tx_ref: B256,
        nullifiers: Vec<B256>,
        memo: Option<String>,
        memo_hash: Option<B256>,
    },
    Failed {
        stage: TransactStage,
        error: String,
    },
}

impl TransactOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted { .. })
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            Self::Submitted { tx_hash, .. } => Some(*tx_hash),
            Self::Failed { .. } => None,
        }
    }
}

/// Errors raised before any transfer or unshield side effect.
#[derive(Debug, Error)]
pub enum TransactError {
    #[error("No relay contract configured for network {0}")]
    ContractNotConfigured(String),

    #[error("Invalid {field} address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("No confidential wallet connected")]
    WalletNotConnected,

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Invalid recipient '{0}': must be a 0zk address")]
    InvalidRecipient(String),
}

pub type TransactResult<T> = Result<T, TransactError>;

pub fn memo_hash(memo: &str) -> B256 {
    keccak256(memo.as_bytes())
}

/// `<prefix>:<product or "direct">:<unix millis>`
pub fn payment_memo(prefix: &str, product_id: Option<&str>, unix_millis: u128) -> String {
    format!("{}:{}:{}", prefix, product_id.unwrap_or("direct"), unix_millis)
}

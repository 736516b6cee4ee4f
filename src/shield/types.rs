//! Shield flow types and error definitions.

use std::fmt;

use alloy::primitives::{Address, TxHash, B256, U256};
use alloy::rpc::types::TransactionReceipt;
use rand::Rng;
use thiserror::Error;

use crate::blockchain::types::{BlockchainError, ChainId};

/// Basis-point denominator for fee arithmetic.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Request to move public tokens into the confidential pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldIntent {
    pub token_address: Address,
    pub recipient_private_address: String,
    pub amount_wei: U256,
    /// Fresh random key; never reused across shields.
    pub shield_key: B256,
}

impl ShieldIntent {
    pub fn new(token_address: Address, recipient_private_address: String, amount_wei: U256) -> Self {
        let mut key = [0u8; 32];
        rand::thread_rng().fill(&mut key);
        Self {
            token_address,
            recipient_private_address,
            amount_wei,
            shield_key: B256::from(key),
        }
    }
}

/// Confidential wallet receiving a shield.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldAccount {
    pub wallet_id: String,
    pub private_address: String,
    pub chain: ChainId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShieldOptions {
    /// Wrap native currency to cover a wrapped-token shortfall first.
    pub auto_wrap: bool,
}

impl Default for ShieldOptions {
    fn default() -> Self {
        Self { auto_wrap: true }
    }
}

/// Step of the shield pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShieldStage {
    CheckConfig,
    AutoWrap,
    EnsureAllowance,
    BuildTransaction,
    EnforceCanonicalTarget,
    Submit,
    AwaitConfirmation,
    PostShieldRefresh,
}

impl ShieldStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckConfig => "check_config",
            Self::AutoWrap => "auto_wrap",
            Self::EnsureAllowance => "ensure_allowance",
            Self::BuildTransaction => "build_transaction",
            Self::EnforceCanonicalTarget => "enforce_canonical_target",
            Self::Submit => "submit",
            Self::AwaitConfirmation => "await_confirmation",
            Self::PostShieldRefresh => "post_shield_refresh",
        }
    }
}

impl fmt::Display for ShieldStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum ShieldOutcome {
    Submitted {
        tx_hash: TxHash,
        receipt: Box<TransactionReceipt>,
        /// Protocol fee withheld from `amount`.
        fee: U256,
        amount_after_fee: U256,
    },
    Failed {
        stage: ShieldStage,
        error: String,
    },
}

impl ShieldOutcome {
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

/// Whether the signer can shield right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShieldReadiness {
    Ready,
    InsufficientToken { shortfall: U256 },
    InsufficientAllowance { current: U256 },
    InsufficientGas { balance: U256, required: U256 },
}

impl ShieldReadiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Errors raised before any shield side effect.
#[derive(Debug, Error)]
pub enum ShieldError {
    #[error("No shield contract configured for network {0}")]
    ContractNotConfigured(String),

    #[error("Invalid {field} address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("No confidential wallet connected")]
    WalletNotConnected,

    #[error("Shield amount must be greater than zero")]
    ZeroAmount,

    #[error("Chain error: {0}")]
    Chain(#[from] BlockchainError),
}

pub type ShieldResult<T> = Result<T, ShieldError>;

/// Protocol fee on `amount` at `fee_bps`, rounded down.
pub fn shield_fee(amount: U256, fee_bps: u64) -> U256 {
    amount.saturating_mul(U256::from(fee_bps)) / U256::from(BPS_DENOMINATOR)
}

/// What lands in the confidential pool after the fee.
pub fn amount_after_fee(amount: U256, fee_bps: u64) -> U256 {
    amount.saturating_sub(shield_fee(amount, fee_bps))
}

//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (private key, RPC URL)
//!     → wallet.rs (key loading, message signing)
//!     → client.rs (RPC connection with timeouts and failover)
//!     → transaction.rs (allowances, approvals, wrap, send + confirm)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables or explicit callers
//! - Never log private keys or derived encryption keys
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::BlockchainClient;
pub use transaction::{AlloyChainAccess, ChainAccess};
pub use types::{BlockchainConfig, BlockchainError, BlockchainResult, ChainId, SubmittedTx};
pub use wallet::Wallet;

//! Proved confidential transactions: private transfers and unshields.
//!
//! # Responsibilities
//! - Validate recipients and amounts before touching the engine
//! - Dual-convention gas estimate, proof generation and populate
//! - Canonical destination, submission, confirmation and balance refresh

pub mod orchestrator;
pub mod strategy;
pub mod types;

pub use orchestrator::TransactOrchestrator;
pub use strategy::{KeyedTransact, PositionalTransact, TransactBuilder, TransactStrategy};
pub use types::{
    memo_hash, payment_memo, TransactAccount, TransactError, TransactOutcome, TransactResult,
    TransactStage, TransferRequest, UnshieldRequest,
};

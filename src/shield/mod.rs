//! Shield (public → confidential) transaction flow.
//!
//! # Responsibilities
//! - Readiness checks and optional native-currency wrapping
//! - Allowance management for the shield contract
//! - Dual-convention transaction building through the engine
//! - Submission, confirmation and post-shield balance refresh

pub mod orchestrator;
pub mod readiness;
pub mod strategy;
pub mod types;

pub use orchestrator::ShieldOrchestrator;
pub use readiness::check_readiness;
pub use strategy::{BuildStrategy, KeyedStrategy, PositionalStrategy, ShieldBuilder};
pub use types::{
    amount_after_fee, shield_fee, ShieldAccount, ShieldError, ShieldIntent, ShieldOptions,
    ShieldOutcome, ShieldReadiness, ShieldStage,
};

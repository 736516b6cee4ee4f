//! Privacy relay library: confidential wallet lifecycle, balance tracking,
//! shielding, private transfers and unshielding on top of an EVM JSON-RPC
//! endpoint.

pub mod balances;
pub mod blockchain;
pub mod client;
pub mod config;
pub mod engine;
pub mod observability;
pub mod resilience;
pub mod rpc;
pub mod session;
pub mod shield;
pub mod transact;

pub use client::{ClientDeps, ClientError, PrivacyClient};
pub use config::schema::RelayConfig;

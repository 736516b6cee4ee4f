//! Confidential-transaction engine integration.
//!
//! # Data Flow
//! ```text
//! PrivacyClient
//!     → registry.rs (one engine identity per registry)
//!     → lifecycle.rs (start once, load network once, wallet bookkeeping)
//!     → traits.rs (the external engine)
//! ```

pub mod lifecycle;
pub mod registry;
pub mod traits;
pub mod types;

pub use lifecycle::{EngineLifecycle, LifecycleError, LifecycleResult};
pub use registry::{EngineHandle, EngineRegistry};
pub use traits::{PrivacyEngine, ProofProgress};
pub use types::{
    EngineCall, EngineError, EngineResult, ProvedTransaction, TransactKind, WalletInfo,
};

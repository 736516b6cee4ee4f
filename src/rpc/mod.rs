//! Log query chunking subsystem.
//!
//! # Data Flow
//! ```text
//! get_logs(filter)
//!     → chunker.rs (resolve tags, decide whether to split)
//!     → window.rs (partition into bounded windows)
//!     → resilience (retry each window with backoff, pace between windows)
//!     → source.rs (the wrapped provider, e.g. BlockchainClient)
//! ```
//!
//! # Design Decisions
//! - Windows are fetched strictly sequentially, in ascending order
//! - No partial results: one failed window fails the call
//! - Everything except `get_logs` passes through to the wrapped provider

pub mod chunker;
pub mod source;
pub mod window;

pub use chunker::ChunkedLogProvider;
pub use source::LogSource;
pub use window::{partition, LogQueryWindow};

//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to RPC provider:
//!     → retries.rs (retry failed request with backoff)
//!     → backoff.rs (capped exponential delay + jitter, pacing pauses)
//! ```
//!
//! # Design Decisions
//! - Every retry loop is bounded; exhaustion surfaces the last error
//! - Jittered backoff prevents thundering herd

pub mod backoff;
pub mod retries;

pub use backoff::{calculate_backoff, pacing_delay, BackoffPolicy};
pub use retries::{retry_with_backoff, RetryPolicy};

//! Multi-bucket balance tracking.
//!
//! # Data Flow
//! ```text
//! refresh.rs (debounced scan request)
//!     → engine scan
//!     → engine pushes (bucket key, token amounts)
//!     → bucket.rs (canonical bucket parse)
//!     → cache.rs (replace entry, aggregate on read)
//! ```

pub mod bucket;
pub mod cache;
pub mod refresh;
pub mod types;

pub use bucket::{BalanceBucket, RawBucketKey};
pub use cache::BalanceCache;
pub use refresh::{RefreshCoordinator, RefreshOutcome, RefreshTarget, SkipReason};
pub use types::{BalanceSink, BalanceSummary, BalanceUpdate, TokenAmount};

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Components (chunker, refresh, shield, transact, cache):
//!     → telemetry.rs (Telemetry observer hooks)
//!         → logging.rs (structured log events via tracing)
//!         → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Diagnostics live behind an injectable observer, not inline in control flow
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod telemetry;

pub use telemetry::{NoopTelemetry, Telemetry, TracingTelemetry};

//! Telemetry extension points.
//!
//! Components report noteworthy events through a [`Telemetry`] observer
//! instead of logging inline. Every hook has an empty default body so an
//! observer only implements what it cares about.

use std::fmt;
use std::time::Duration;

use crate::balances::bucket::BalanceBucket;
use crate::balances::refresh::SkipReason;
use crate::observability::metrics;
use crate::rpc::window::LogQueryWindow;
use crate::engine::types::TransactKind;
use crate::shield::types::ShieldStage;
use crate::transact::types::TransactStage;

/// Observer invoked at defined points of the relay's control flow.
pub trait Telemetry: Send + Sync + fmt::Debug {
    /// A log window returned successfully.
    fn window_fetched(&self, _window: LogQueryWindow, _logs: usize) {}

    /// A log window failed and will be retried after `delay`.
    fn window_retry(&self, _window: LogQueryWindow, _attempt: u32, _delay: Duration, _error: &str) {}

    /// A log window exhausted its retries.
    fn window_failed(&self, _window: LogQueryWindow, _error: &str) {}

    fn refresh_started(&self, _reason: &str, _forced: bool) {}

    fn refresh_skipped(&self, _reason: &str, _cause: SkipReason) {}

    fn refresh_finished(&self, _reason: &str, _success: bool, _elapsed: Duration) {}

    /// The unspent-output scan outlived its soft deadline.
    fn scan_watchdog_fired(&self, _elapsed: Duration) {}

    fn shield_stage(&self, _stage: ShieldStage) {}

    fn transact_stage(&self, _kind: TransactKind, _stage: TransactStage) {}

    /// Proof generation advanced to `fraction` (0 to 1).
    fn proof_progress(&self, _kind: TransactKind, _fraction: f64) {}

    /// The engine pushed a bucket snapshot.
    fn balance_update(&self, _bucket: BalanceBucket, _tokens: usize) {}
}

/// Observer that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {}

/// Observer that forwards events to `tracing` and the metrics recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn window_fetched(&self, window: LogQueryWindow, logs: usize) {
        metrics::record_log_window("ok");
        tracing::debug!(
            from_block = window.from_block,
            to_block = window.to_block,
            logs,
            "Log window fetched"
        );
    }

    fn window_retry(&self, window: LogQueryWindow, attempt: u32, delay: Duration, error: &str) {
        metrics::record_log_retry();
        tracing::warn!(
            from_block = window.from_block,
            to_block = window.to_block,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error,
            "Log window failed, backing off"
        );
    }

    fn window_failed(&self, window: LogQueryWindow, error: &str) {
        metrics::record_log_window("failed");
        tracing::error!(
            from_block = window.from_block,
            to_block = window.to_block,
            error,
            "Log window exhausted retries"
        );
    }

    fn refresh_started(&self, reason: &str, forced: bool) {
        tracing::info!(reason, forced, "Balance refresh started");
    }

    fn refresh_skipped(&self, reason: &str, cause: SkipReason) {
        metrics::record_refresh("skipped");
        tracing::debug!(reason, cause = cause.as_str(), "Balance refresh skipped");
    }

    fn refresh_finished(&self, reason: &str, success: bool, elapsed: Duration) {
        metrics::record_refresh(if success { "ok" } else { "failed" });
        metrics::record_refresh_duration(elapsed);
        tracing::info!(
            reason,
            success,
            elapsed_ms = elapsed.as_millis() as u64,
            "Balance refresh finished"
        );
    }

    fn scan_watchdog_fired(&self, elapsed: Duration) {
        metrics::record_scan_watchdog();
        tracing::warn!(
            elapsed_secs = elapsed.as_secs(),
            "Unspent-output scan still running, continuing to wait"
        );
    }

    fn shield_stage(&self, stage: ShieldStage) {
        metrics::record_shield_stage(stage.as_str());
        tracing::debug!(stage = stage.as_str(), "Shield stage");
    }

    fn transact_stage(&self, kind: TransactKind, stage: TransactStage) {
        metrics::record_transact_stage(kind.as_str(), stage.as_str());
        tracing::debug!(kind = kind.as_str(), stage = stage.as_str(), "Transact stage");
    }

    fn proof_progress(&self, kind: TransactKind, fraction: f64) {
        tracing::debug!(
            kind = kind.as_str(),
            percent = (fraction * 100.0).round() as u64,
            "Proof generation progress"
        );
    }

    fn balance_update(&self, bucket: BalanceBucket, tokens: usize) {
        metrics::record_balance_update(bucket.as_str());
        tracing::debug!(bucket = bucket.as_str(), tokens, "Balance bucket updated");
    }
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_log_windows_total` (counter): fetched windows by outcome
//! - `relay_log_window_retries_total` (counter): window retries
//! - `relay_refresh_total` (counter): refresh calls by outcome
//! - `relay_refresh_duration_seconds` (histogram): engine refresh latency
//! - `relay_scan_watchdog_total` (counter): soft watchdog firings
//! - `relay_shield_stage_total` (counter): shield stages reached
//! - `relay_transact_stage_total` (counter): transfer/unshield stages reached
//! - `relay_balance_updates_total` (counter): engine pushes by bucket

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

pub fn record_log_window(outcome: &'static str) {
    counter!("relay_log_windows_total", "outcome" => outcome).increment(1);
}

pub fn record_log_retry() {
    counter!("relay_log_window_retries_total").increment(1);
}

pub fn record_refresh(outcome: &'static str) {
    counter!("relay_refresh_total", "outcome" => outcome).increment(1);
}

pub fn record_refresh_duration(elapsed: Duration) {
    histogram!("relay_refresh_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_scan_watchdog() {
    counter!("relay_scan_watchdog_total").increment(1);
}

pub fn record_shield_stage(stage: &'static str) {
    counter!("relay_shield_stage_total", "stage" => stage).increment(1);
}

pub fn record_transact_stage(kind: &'static str, stage: &'static str) {
    counter!("relay_transact_stage_total", "kind" => kind, "stage" => stage).increment(1);
}

pub fn record_balance_update(bucket: &'static str) {
    counter!("relay_balance_updates_total", "bucket" => bucket).increment(1);
}

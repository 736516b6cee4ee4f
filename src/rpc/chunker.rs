//! Transparent log-query chunking over a rate-limited provider.
//!
//! # Responsibilities
//! - Resolve symbolic block tags to absolute numbers
//! - Split oversized ranges into bounded windows
//! - Retry failed windows with capped exponential backoff + jitter
//! - Pace successful windows to stay under upstream throttling
//!
//! # Failure Semantics
//! Any window that exhausts its retries fails the whole call. Logs collected
//! from earlier windows are discarded.

use std::sync::Arc;

use alloy::rpc::types::{BlockNumberOrTag, Filter, FilterBlockOption, Log};
use async_trait::async_trait;
use tokio::time::sleep;

use crate::blockchain::types::BlockchainResult;
use crate::config::LogChunkerConfig;
use crate::observability::{NoopTelemetry, Telemetry};
use crate::resilience::backoff::{pacing_delay, BackoffPolicy};
use crate::resilience::retries::{retry_with_backoff, RetryPolicy};
use crate::rpc::source::LogSource;
use crate::rpc::window::{partition, LogQueryWindow};

/// Wraps a [`LogSource`] so that no single request spans more than
/// `max_range_blocks` blocks.
#[derive(Debug)]
pub struct ChunkedLogProvider<S> {
    inner: S,
    max_range_blocks: u64,
    retry: RetryPolicy,
    pacing_min_ms: u64,
    pacing_max_ms: u64,
    telemetry: Arc<dyn Telemetry>,
}

impl<S: LogSource> ChunkedLogProvider<S> {
    pub fn new(inner: S, config: &LogChunkerConfig) -> Self {
        Self {
            inner,
            max_range_blocks: config.max_range_blocks.max(1),
            retry: RetryPolicy::new(
                config.max_retries,
                BackoffPolicy::new(config.base_delay_ms, config.max_delay_ms, config.jitter_ms),
            ),
            pacing_min_ms: config.pacing_min_ms,
            pacing_max_ms: config.pacing_max_ms,
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// The wrapped provider, for every call that needs no chunking.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn max_range_blocks(&self) -> u64 {
        self.max_range_blocks
    }

    /// Fetch logs for `filter`, chunking the block range when it is too wide.
    pub async fn get_logs(&self, filter: &Filter) -> BlockchainResult<Vec<Log>> {
        let (from_block, to_block) = match self.resolve_range(filter).await? {
            Some(range) => range,
            None => return self.inner.logs(filter).await,
        };

        // Inverted ranges go through untouched; the provider owns that error.
        if from_block > to_block
            || to_block - from_block < self.max_range_blocks
        {
            return self.inner.logs(filter).await;
        }

        let windows = partition(from_block, to_block, self.max_range_blocks);
        tracing::debug!(
            from_block,
            to_block,
            windows = windows.len(),
            "Chunking log query"
        );

        let mut logs = Vec::new();
        for (i, window) in windows.iter().enumerate() {
            let batch = self.fetch_window(filter, *window).await?;
            self.telemetry.window_fetched(*window, batch.len());
            logs.extend(batch);

            if i + 1 < windows.len() {
                sleep(pacing_delay(self.pacing_min_ms, self.pacing_max_ms)).await;
            }
        }
        Ok(logs)
    }

    async fn fetch_window(&self, filter: &Filter, window: LogQueryWindow) -> BlockchainResult<Vec<Log>> {
        let windowed = filter
            .clone()
            .from_block(window.from_block)
            .to_block(window.to_block);

        let result = retry_with_backoff(
            &self.retry,
            || self.inner.logs(&windowed),
            |attempt, delay, err| {
                self.telemetry
                    .window_retry(window, attempt, delay, &err.to_string())
            },
        )
        .await;

        if let Err(e) = &result {
            self.telemetry.window_failed(window, &e.to_string());
        }
        result
    }

    /// Absolute `(from, to)` for a range filter, `None` for block-hash filters.
    async fn resolve_range(&self, filter: &Filter) -> BlockchainResult<Option<(u64, u64)>> {
        let (from, to) = match &filter.block_option {
            FilterBlockOption::Range {
                from_block,
                to_block,
            } => (*from_block, *to_block),
            FilterBlockOption::AtBlockHash(_) => return Ok(None),
        };

        let mut head = None;
        let from_block = self.resolve_tag(from, &mut head).await?;
        let to_block = self.resolve_tag(to, &mut head).await?;
        Ok(Some((from_block, to_block)))
    }

    async fn resolve_tag(
        &self,
        tag: Option<BlockNumberOrTag>,
        head: &mut Option<u64>,
    ) -> BlockchainResult<u64> {
        match tag {
            Some(BlockNumberOrTag::Number(n)) => Ok(n),
            Some(BlockNumberOrTag::Earliest) => Ok(0),
            // latest/pending/safe/finalized and omitted bounds all mean "head"
            _ => {
                if let Some(n) = *head {
                    return Ok(n);
                }
                let n = self.inner.block_number().await?;
                *head = Some(n);
                Ok(n)
            }
        }
    }
}

#[async_trait]
impl<S: LogSource> LogSource for ChunkedLogProvider<S> {
    async fn block_number(&self) -> BlockchainResult<u64> {
        self.inner.block_number().await
    }

    async fn logs(&self, filter: &Filter) -> BlockchainResult<Vec<Log>> {
        self.get_logs(filter).await
    }
}

//! The provider surface the log chunker wraps.

use std::sync::Arc;

use alloy::rpc::types::{Filter, Log};
use async_trait::async_trait;

use crate::blockchain::types::BlockchainResult;

/// Read access to historical chain data.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Latest block number known to the provider.
    async fn block_number(&self) -> BlockchainResult<u64>;

    /// Logs matching `filter`, in chain order.
    async fn logs(&self, filter: &Filter) -> BlockchainResult<Vec<Log>>;
}

#[async_trait]
impl<T: LogSource + ?Sized> LogSource for Arc<T> {
    async fn block_number(&self) -> BlockchainResult<u64> {
        (**self).block_number().await
    }

    async fn logs(&self, filter: &Filter) -> BlockchainResult<Vec<Log>> {
        (**self).logs(filter).await
    }
}

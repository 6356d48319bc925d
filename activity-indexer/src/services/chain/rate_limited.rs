use std::sync::Arc;

use async_trait::async_trait;

use super::ChainClient;
use crate::interfaces::error::ChainClientError;
use crate::interfaces::event::{BlockInfo, BlockTarget, TradeEventKind, TradeLogBatch};
use crate::services::rate_limiter::{RateLimitQuota, RateLimiter};

/// Routes every call of the inner client through a shared [`RateLimiter`].
///
/// All calls share one key, so block lookups and log queries draw from the
/// same budget.
pub struct RateLimitedClient<C: ChainClient> {
    inner: C,
    limiter: Arc<RateLimiter>,
    key: String,
    quota: RateLimitQuota,
}

impl<C: ChainClient> RateLimitedClient<C> {
    pub fn new(inner: C, limiter: Arc<RateLimiter>, key: impl Into<String>, quota: RateLimitQuota) -> Self {
        Self {
            inner,
            limiter,
            key: key.into(),
            quota,
        }
    }
}

#[async_trait]
impl<C: ChainClient> ChainClient for RateLimitedClient<C> {
    async fn block_number(&self) -> Result<u64, ChainClientError> {
        self.limiter
            .execute_with_rate_limit(&self.key, self.quota, || self.inner.block_number())
            .await
    }

    async fn block(&self, number: u64) -> Result<BlockInfo, ChainClientError> {
        self.limiter
            .execute_with_rate_limit(&self.key, self.quota, || self.inner.block(number))
            .await
    }

    async fn trade_logs(
        &self,
        kind: TradeEventKind,
        from_block: u64,
        to_block: BlockTarget,
    ) -> Result<TradeLogBatch, ChainClientError> {
        self.limiter
            .execute_with_rate_limit(&self.key, self.quota, || {
                self.inner.trade_logs(kind, from_block, to_block)
            })
            .await
    }
}

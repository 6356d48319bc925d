pub mod alloy_client;
pub mod decode;
pub mod rate_limited;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::interfaces::error::ChainClientError;
use crate::interfaces::event::{BlockInfo, BlockTarget, TradeEventKind, TradeLogBatch};

/// Read access to the chain, scoped to the token contract being indexed.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_number(&self) -> Result<u64, ChainClientError>;

    /// Fails with `BlockNotFound` when the node does not know the block.
    async fn block(&self, number: u64) -> Result<BlockInfo, ChainClientError>;

    /// Logs of one event kind over the inclusive range `[from_block, to_block]`.
    /// Only a failed query is an error; logs that do not decode are returned
    /// in `TradeLogBatch::malformed`.
    async fn trade_logs(
        &self,
        kind: TradeEventKind,
        from_block: u64,
        to_block: BlockTarget,
    ) -> Result<TradeLogBatch, ChainClientError>;
}

use std::sync::Arc;

use futures::future::join_all;
use tracing::warn;

use crate::helpers::units::format_ether;
use crate::interfaces::error::ChainClientError;
use crate::interfaces::event::{BlockchainEvent, RawTradeLog, TradeEventKind, TradePayload};
use crate::services::chain::ChainClient;

/// Turns decoded contract logs into [`BlockchainEvent`]s, stamping each one
/// with the timestamp of the block that contains it.
pub struct EventNormalizer<C: ChainClient> {
    client: Arc<C>,
}

impl<C: ChainClient> Clone for EventNormalizer<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl<C: ChainClient> EventNormalizer<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    pub async fn normalize(&self, log: RawTradeLog) -> Result<BlockchainEvent, ChainClientError> {
        let block = self.client.block(log.block_number).await?;

        let event = match log.payload {
            TradePayload::Purchased {
                buyer,
                token_uuid,
                amount,
                price_per_token,
                total_cost,
                is_freebie,
            } => BlockchainEvent {
                event_name: TradeEventKind::Purchased,
                user_address: buyer,
                token_uuid,
                amount,
                price_per_token: format_ether(price_per_token),
                total_value: format_ether(total_cost),
                is_freebie,
                tx_hash: log.tx_hash,
                block_number: log.block_number,
                log_index: log.log_index,
                timestamp: block.timestamp,
            },
            TradePayload::Sold {
                seller,
                token_uuid,
                amount,
                price_per_token,
                total_proceeds,
            } => BlockchainEvent {
                event_name: TradeEventKind::Sold,
                user_address: seller,
                token_uuid,
                amount,
                price_per_token: format_ether(price_per_token),
                total_value: format_ether(total_proceeds),
                is_freebie: false,
                tx_hash: log.tx_hash,
                block_number: log.block_number,
                log_index: log.log_index,
                timestamp: block.timestamp,
            },
        };

        Ok(event)
    }

    /// Normalizes logs concurrently. A log whose block cannot be fetched is
    /// logged and left out; the others are returned in input order.
    pub async fn normalize_batch(&self, logs: Vec<RawTradeLog>) -> Vec<BlockchainEvent> {
        let results = join_all(logs.into_iter().map(|log| async move {
            let tx_hash = log.tx_hash;
            let kind = log.payload.kind();
            (tx_hash, kind, self.normalize(log).await)
        }))
        .await;

        results
            .into_iter()
            .filter_map(|(tx_hash, kind, result)| match result {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!("Skipping {} event of tx {:#x}: {}", kind, tx_hash, e);
                    None
                }
            })
            .collect()
    }

    /// Like [`normalize_batch`](Self::normalize_batch) but fails on the first
    /// log that cannot be normalized.
    pub async fn try_normalize_all(
        &self,
        logs: Vec<RawTradeLog>,
    ) -> Result<Vec<BlockchainEvent>, ChainClientError> {
        join_all(logs.into_iter().map(|log| self.normalize(log)))
            .await
            .into_iter()
            .collect()
    }
}

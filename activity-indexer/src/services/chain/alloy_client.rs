use alloy::eips::BlockNumberOrTag;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{BlockTransactionsKind, Filter};
use alloy::transports::http::Http;
use async_trait::async_trait;
use reqwest::Client;
use tracing::trace;
use url::Url;

use super::decode::{decode, event_signature};
use super::ChainClient;
use crate::interfaces::error::ChainClientError;
use crate::interfaces::event::{BlockInfo, BlockTarget, TradeEventKind, TradeLogBatch};

/// JSON-RPC client over HTTP for a single token contract.
pub struct AlloyChainClient {
    provider: RootProvider<Http<Client>>,
    contract_address: Address,
}

impl AlloyChainClient {
    pub fn new(rpc_url: Url, contract_address: Address) -> Self {
        Self {
            provider: ProviderBuilder::new().on_http(rpc_url),
            contract_address,
        }
    }

    fn trade_filter(&self, kind: TradeEventKind, from_block: u64, to_block: BlockTarget) -> Filter {
        let to_block = match to_block {
            BlockTarget::Number(number) => BlockNumberOrTag::Number(number),
            BlockTarget::Latest => BlockNumberOrTag::Latest,
        };

        Filter::new()
            .address(self.contract_address)
            .event_signature(event_signature(kind))
            .from_block(from_block)
            .to_block(to_block)
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn block_number(&self) -> Result<u64, ChainClientError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ChainClientError::Transport(e.to_string()))
    }

    async fn block(&self, number: u64) -> Result<BlockInfo, ChainClientError> {
        let block = self
            .provider
            .get_block_by_number(
                BlockNumberOrTag::Number(number),
                BlockTransactionsKind::Hashes,
            )
            .await
            .map_err(|e| ChainClientError::Transport(e.to_string()))?
            .ok_or(ChainClientError::BlockNotFound(number))?;

        Ok(BlockInfo {
            number: block.header.number,
            timestamp: block.header.timestamp,
        })
    }

    async fn trade_logs(
        &self,
        kind: TradeEventKind,
        from_block: u64,
        to_block: BlockTarget,
    ) -> Result<TradeLogBatch, ChainClientError> {
        let filter = self.trade_filter(kind, from_block, to_block);
        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| ChainClientError::Transport(e.to_string()))?;

        trace!(
            "{} {} logs in blocks {} - {:?}",
            logs.len(),
            kind,
            from_block,
            to_block
        );

        Ok(logs.iter().map(decode).collect())
    }
}

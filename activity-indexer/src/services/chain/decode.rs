use alloy::primitives::B256;
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;

use crate::interfaces::error::ChainClientError;
use crate::interfaces::event::{RawTradeLog, TradeEventKind, TradePayload};

sol! {
    event TokenPurchased(
        address buyer,
        string tokenUuid,
        uint256 amount,
        uint256 pricePerToken,
        uint256 totalCost,
        bool isFreebie
    );

    event TokenSold(
        address seller,
        string tokenUuid,
        uint256 amount,
        uint256 pricePerToken,
        uint256 totalProceeds
    );
}

/// Topic0 of the given event kind.
pub fn event_signature(kind: TradeEventKind) -> B256 {
    match kind {
        TradeEventKind::Purchased => TokenPurchased::SIGNATURE_HASH,
        TradeEventKind::Sold => TokenSold::SIGNATURE_HASH,
    }
}

pub fn decode(log: &Log) -> Result<RawTradeLog, ChainClientError> {
    let payload = match log.inner.data.topics().first() {
        Some(key) if *key == TokenPurchased::SIGNATURE_HASH => decode_purchase(log)?,
        Some(key) if *key == TokenSold::SIGNATURE_HASH => decode_sale(log)?,
        Some(key) => {
            return Err(ChainClientError::MalformedLog(format!(
                "unexpected event signature {}",
                key
            )))
        }
        None => return Err(ChainClientError::MalformedLog("log without topics".to_string())),
    };

    let tx_hash = log
        .transaction_hash
        .ok_or_else(|| ChainClientError::MalformedLog("missing transaction hash".to_string()))?;
    let block_number = log
        .block_number
        .ok_or_else(|| ChainClientError::MalformedLog(format!("missing block number ({})", tx_hash)))?;
    let log_index = log
        .log_index
        .ok_or_else(|| ChainClientError::MalformedLog(format!("missing log index ({})", tx_hash)))?;

    Ok(RawTradeLog {
        payload,
        tx_hash,
        block_number,
        log_index,
    })
}

fn decode_purchase(log: &Log) -> Result<TradePayload, ChainClientError> {
    let event = TokenPurchased::decode_log(&log.inner, true)
        .map_err(|e| ChainClientError::Decode(e.to_string()))?
        .data;

    Ok(TradePayload::Purchased {
        buyer: event.buyer,
        token_uuid: event.tokenUuid,
        amount: event.amount,
        price_per_token: event.pricePerToken,
        total_cost: event.totalCost,
        is_freebie: event.isFreebie,
    })
}

fn decode_sale(log: &Log) -> Result<TradePayload, ChainClientError> {
    let event = TokenSold::decode_log(&log.inner, true)
        .map_err(|e| ChainClientError::Decode(e.to_string()))?
        .data;

    Ok(TradePayload::Sold {
        seller: event.seller,
        token_uuid: event.tokenUuid,
        amount: event.amount,
        price_per_token: event.pricePerToken,
        total_proceeds: event.totalProceeds,
    })
}

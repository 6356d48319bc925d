use alloy::primitives::{Address, B256, U256};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::error::ChainClientError;

/// The two trade events emitted by the creator token contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TradeEventKind {
    Purchased,
    Sold,
}

impl TradeEventKind {
    pub const ALL: [TradeEventKind; 2] = [TradeEventKind::Purchased, TradeEventKind::Sold];
}

impl std::fmt::Display for TradeEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl AsRef<str> for TradeEventKind {
    fn as_ref(&self) -> &str {
        match self {
            TradeEventKind::Purchased => "Purchased",
            TradeEventKind::Sold => "Sold",
        }
    }
}

/// Decoded event arguments, monetary values still in wei.
#[derive(Debug, Clone, PartialEq)]
pub enum TradePayload {
    Purchased {
        buyer: Address,
        token_uuid: String,
        amount: U256,
        price_per_token: U256,
        total_cost: U256,
        is_freebie: bool,
    },
    Sold {
        seller: Address,
        token_uuid: String,
        amount: U256,
        price_per_token: U256,
        total_proceeds: U256,
    },
}

impl TradePayload {
    pub fn kind(&self) -> TradeEventKind {
        match self {
            TradePayload::Purchased { .. } => TradeEventKind::Purchased,
            TradePayload::Sold { .. } => TradeEventKind::Sold,
        }
    }
}

/// A contract log as returned by the chain, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTradeLog {
    pub payload: TradePayload,
    pub tx_hash: B256,
    pub block_number: u64,
    pub log_index: u64,
}

/// Result of one log query. Logs that failed to decode are kept apart, so
/// each caller decides whether they fail the whole range.
#[derive(Debug, Default)]
pub struct TradeLogBatch {
    pub logs: Vec<RawTradeLog>,
    pub malformed: Vec<ChainClientError>,
}

impl TradeLogBatch {
    pub fn extend(&mut self, other: TradeLogBatch) {
        self.logs.extend(other.logs);
        self.malformed.extend(other.malformed);
    }
}

impl From<Vec<RawTradeLog>> for TradeLogBatch {
    fn from(logs: Vec<RawTradeLog>) -> Self {
        Self {
            logs,
            malformed: Vec::new(),
        }
    }
}

impl FromIterator<Result<RawTradeLog, ChainClientError>> for TradeLogBatch {
    fn from_iter<I: IntoIterator<Item = Result<RawTradeLog, ChainClientError>>>(iter: I) -> Self {
        let mut batch = TradeLogBatch::default();
        for result in iter {
            match result {
                Ok(log) => batch.logs.push(log),
                Err(e) => batch.malformed.push(e),
            }
        }
        batch
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub number: u64,
    /// Block time in seconds.
    pub timestamp: u64,
}

/// Upper bound of a block range. `Latest` resolves to the most recent block
/// known by the RPC node at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTarget {
    Number(u64),
    Latest,
}

impl From<u64> for BlockTarget {
    fn from(number: u64) -> Self {
        BlockTarget::Number(number)
    }
}

/// A purchase or sale observed on chain, in canonical form.
///
/// `(tx_hash, event_name)` identifies an event and is used as the
/// idempotency key when storing it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockchainEvent {
    pub event_name: TradeEventKind,
    pub user_address: Address,
    pub token_uuid: String,
    pub amount: U256,
    pub price_per_token: BigDecimal,
    pub total_value: BigDecimal,
    pub is_freebie: bool,
    pub tx_hash: B256,
    pub block_number: u64,
    pub log_index: u64,
    pub timestamp: u64,
}

impl BlockchainEvent {
    pub fn event_id(&self) -> String {
        format!("{:#x}_{}", self.tx_hash, self.event_name)
    }
}

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join;
#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use super::normalizer::EventNormalizer;
use crate::interfaces::error::{ChainClientError, HandlerError, ListenerError};
use crate::interfaces::event::{BlockTarget, BlockchainEvent, TradeEventKind, TradeLogBatch};
use crate::services::chain::ChainClient;

/// Receives every event the live listener observes, in on-chain order.
///
/// An error makes the listener deliver the whole block range again, so
/// handlers must tolerate seeing an event twice.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_event(&self, event: BlockchainEvent) -> Result<(), HandlerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerStatus {
    Idle,
    Listening,
}

#[derive(Debug, Clone, Copy)]
pub struct ListenerConfig {
    pub poll_interval: Duration,
    /// Upper bound on the number of blocks queried in a single poll.
    pub max_block_range: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_block_range: 500,
        }
    }
}

enum ListenerState {
    Idle,
    Listening { stop: watch::Sender<bool> },
}

/// Watches the token contract for purchases and sales.
///
/// Live listening runs as a background task that polls the head of the chain
/// every `poll_interval`. Historical queries are independent of it.
pub struct EventListener<C: ChainClient + 'static> {
    client: Arc<C>,
    normalizer: EventNormalizer<C>,
    config: ListenerConfig,
    state: Mutex<ListenerState>,
}

impl<C: ChainClient + 'static> EventListener<C> {
    pub fn new(client: Arc<C>, config: ListenerConfig) -> Self {
        Self {
            normalizer: EventNormalizer::new(Arc::clone(&client)),
            client,
            config,
            state: Mutex::new(ListenerState::Idle),
        }
    }

    pub fn status(&self) -> ListenerStatus {
        match *self.state.lock() {
            ListenerState::Idle => ListenerStatus::Idle,
            ListenerState::Listening { .. } => ListenerStatus::Listening,
        }
    }

    /// Starts delivering events of blocks mined after the current head.
    /// Returns the first block the listener watches.
    pub async fn start_listening(
        &self,
        handler: Arc<dyn EventHandler>,
    ) -> Result<u64, ListenerError> {
        if self.status() == ListenerStatus::Listening {
            return Err(ListenerError::AlreadyListening);
        }

        let head = self.client.block_number().await?;

        let mut state = self.state.lock();
        if let ListenerState::Listening { .. } = *state {
            return Err(ListenerError::AlreadyListening);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let poller = Poller {
            client: Arc::clone(&self.client),
            normalizer: self.normalizer.clone(),
            config: self.config,
            handler,
            next_block: head + 1,
        };
        tokio::spawn(poller.run(stop_rx));

        *state = ListenerState::Listening { stop: stop_tx };
        info!("Listening for trade events from block {}", head + 1);

        Ok(head + 1)
    }

    /// Stops live listening. Events of a range already being processed are
    /// still delivered. Does nothing when idle.
    pub fn stop_listening(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), ListenerState::Idle);
        if let ListenerState::Listening { stop } = previous {
            // The poller may already be gone.
            let _ = stop.send(true);
            info!("Stopped listening for trade events");
        }
    }

    /// Events of both kinds in `[from_block, to_block]`, newest block first
    /// and in log order within a block. Fails if any log cannot be fetched,
    /// decoded or normalized.
    pub async fn get_historical_events(
        &self,
        from_block: u64,
        to_block: BlockTarget,
    ) -> Result<Vec<BlockchainEvent>, ListenerError> {
        let batch = fetch_trade_logs(self.client.as_ref(), from_block, to_block).await?;
        if let Some(e) = batch.malformed.into_iter().next() {
            return Err(e.into());
        }
        let mut events = self.normalizer.try_normalize_all(batch.logs).await?;

        events.sort_by(|a, b| {
            b.block_number
                .cmp(&a.block_number)
                .then(a.log_index.cmp(&b.log_index))
        });

        debug!(
            "{} historical events in blocks {} - {:?}",
            events.len(),
            from_block,
            to_block
        );
        Ok(events)
    }

    pub async fn get_current_block_number(&self) -> Result<u64, ListenerError> {
        Ok(self.client.block_number().await?)
    }
}

async fn fetch_trade_logs<C: ChainClient + ?Sized>(
    client: &C,
    from_block: u64,
    to_block: BlockTarget,
) -> Result<TradeLogBatch, ChainClientError> {
    let (mut purchases, sales) = try_join(
        client.trade_logs(TradeEventKind::Purchased, from_block, to_block),
        client.trade_logs(TradeEventKind::Sold, from_block, to_block),
    )
    .await?;

    purchases.extend(sales);
    Ok(purchases)
}

/// Hands `events` to `handler` sorted by `(block_number, log_index)`,
/// stopping at the first handler error.
pub async fn deliver_in_chain_order(
    handler: &dyn EventHandler,
    mut events: Vec<BlockchainEvent>,
) -> Result<(), HandlerError> {
    events.sort_by_key(|event| (event.block_number, event.log_index));
    for event in events {
        handler.on_event(event).await?;
    }
    Ok(())
}

struct Poller<C: ChainClient> {
    client: Arc<C>,
    normalizer: EventNormalizer<C>,
    config: ListenerConfig,
    handler: Arc<dyn EventHandler>,
    next_block: u64,
}

impl<C: ChainClient> Poller<C> {
    async fn run(mut self, mut stop: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
            if *stop.borrow() {
                break;
            }

            let latest_block = match self.client.block_number().await {
                Ok(number) => number,
                Err(e) => {
                    error!("Can't get block number: {}", e);
                    continue;
                }
            };

            if self.next_block > latest_block {
                trace!("Nothing to fetch at block {}", self.next_block);
                continue;
            }

            let start = self.next_block;
            let end = latest_block.min(start + self.config.max_block_range.max(1) - 1);
            match self.poll_range(start, end).await {
                // +1 to not re-process the end block.
                Ok(()) => self.next_block = end + 1,
                Err(e) => error!("Processing blocks {} - {} failed, will retry: {}", start, end, e),
            }
        }

        trace!("Poller stopped at block {}", self.next_block);
    }

    /// Delivers the events of `[start, end]`. Undecodable logs and logs whose
    /// block cannot be fetched are skipped; a failed query or a failing
    /// handler fails the range.
    async fn poll_range(&self, start: u64, end: u64) -> Result<(), ListenerError> {
        trace!("Fetching blocks {} - {}", start, end);
        let batch = fetch_trade_logs(self.client.as_ref(), start, BlockTarget::Number(end)).await?;
        for e in &batch.malformed {
            warn!("Skipping log in blocks {} - {}: {}", start, end, e);
        }
        if batch.logs.is_empty() {
            return Ok(());
        }

        let events = self.normalizer.normalize_batch(batch.logs).await;
        deliver_in_chain_order(self.handler.as_ref(), events).await?;
        Ok(())
    }
}

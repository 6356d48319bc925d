pub mod database;

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::{debug, error, info};

use crate::interfaces::error::{HandlerError, StorageError};
use crate::interfaces::event::BlockchainEvent;
use crate::services::event::listener::EventHandler;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    /// Stores the event unless an event with the same `(tx_hash, event_name)`
    /// already exists. Returns whether a row was inserted.
    async fn store_blockchain_event(&self, event: &BlockchainEvent) -> Result<bool, StorageError>;
}

/// Event handler writing every delivered event to storage. A storage error
/// is returned so the range gets delivered again.
pub struct PersistingHandler<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> PersistingHandler<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl<S: Storage> EventHandler for PersistingHandler<S> {
    async fn on_event(&self, event: BlockchainEvent) -> Result<(), HandlerError> {
        match self.storage.store_blockchain_event(&event).await {
            Ok(true) => info!(
                "{} of {} by {:#x} at block {}",
                event.event_name, event.token_uuid, event.user_address, event.block_number
            ),
            Ok(false) => debug!("Event {} already stored", event.event_id()),
            Err(e) => {
                error!("Failed to store event {}: {}", event.event_id(), e);
                return Err(e.into());
            }
        }
        Ok(())
    }
}

/// Handler used when no database is configured.
pub struct LoggingHandler;

#[async_trait]
impl EventHandler for LoggingHandler {
    async fn on_event(&self, event: BlockchainEvent) -> Result<(), HandlerError> {
        info!(
            "{} of {} by {:#x} at block {} (amount={}, total={})",
            event.event_name,
            event.token_uuid,
            event.user_address,
            event.block_number,
            event.amount,
            event.total_value
        );
        Ok(())
    }
}

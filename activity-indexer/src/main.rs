use std::sync::Arc;
use std::time::Duration;

use activity_indexer::helpers::app_config::AppConfig;
use activity_indexer::interfaces::error::ListenerError;
use activity_indexer::interfaces::event::BlockTarget;
use activity_indexer::services::chain::alloy_client::AlloyChainClient;
use activity_indexer::services::chain::rate_limited::RateLimitedClient;
use activity_indexer::services::chain::ChainClient;
use activity_indexer::services::event::listener::{
    deliver_in_chain_order, EventHandler, EventListener, ListenerConfig,
};
use activity_indexer::services::rate_limiter::RateLimiter;
use activity_indexer::services::storage::database::DatabaseStorage;
use activity_indexer::services::storage::{LoggingHandler, PersistingHandler};
use alloy::primitives::Address;
use anyhow::{Context, Result};
use dotenv::dotenv;
use tracing::{error, info, trace};
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;
use url::Url;

// jemalloc as global allocator
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_logging()?;

    let config_path =
        std::env::var("ACTIVITY_INDEXER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("Can't load configuration from {}", config_path))?;

    let rpc_url = Url::parse(&config.rpc_provider).context("Invalid rpc_provider")?;
    let contract_address: Address = config
        .contract_address
        .parse()
        .context("Invalid contract_address")?;

    let limiter = Arc::new(RateLimiter::new());
    let client = Arc::new(RateLimitedClient::new(
        AlloyChainClient::new(rpc_url, contract_address),
        Arc::clone(&limiter),
        format!("rpc:{:#x}", contract_address),
        config.rate_limit.into(),
    ));

    let handler: Arc<dyn EventHandler> = match &config.database_url {
        Some(database_url) => {
            let storage = DatabaseStorage::new(database_url).await?;
            storage.migrate().await?;
            Arc::new(PersistingHandler::new(Arc::new(storage)))
        }
        None => {
            info!("No database configured, events will only be logged");
            Arc::new(LoggingHandler)
        }
    };

    let listener_config = ListenerConfig {
        poll_interval: Duration::from_millis(config.poll_interval_ms),
        max_block_range: config.max_block_range,
    };
    let listener = EventListener::new(client, listener_config);

    info!(
        "Starting activity indexer: contract:{:#x} start_block:{:?} range:{}",
        contract_address, config.start_block, config.max_block_range,
    );

    let live_from = listener.start_listening(Arc::clone(&handler)).await?;

    tokio::select! {
        _ = catch_up(&listener, handler.as_ref(), &config, live_from) => {
            tokio::signal::ctrl_c().await?;
        }
        res = tokio::signal::ctrl_c() => res?,
    }

    info!("Shutting down...");
    listener.stop_listening();

    Ok(())
}

/// Replays blocks `[start_block, live_from)` in chunks, in on-chain order. A
/// failed chunk is retried after `poll_interval_ms`.
async fn catch_up<C: ChainClient + 'static>(
    listener: &EventListener<C>,
    handler: &dyn EventHandler,
    config: &AppConfig,
    live_from: u64,
) {
    let Some(start_block) = config.start_block else {
        return;
    };
    let range = config.max_block_range.max(1);
    let mut from = start_block;

    while from < live_from {
        let to = std::cmp::min(from + range - 1, live_from - 1);

        trace!("Catching up blocks {} - {}", from, to);
        match replay_chunk(listener, handler, from, to).await {
            // +1 to not re-index the end block.
            Ok(()) => from = to + 1,
            Err(e) => {
                error!("Catch-up of blocks {} - {} failed: {}", from, to, e);
                tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
            }
        }
    }

    info!("Caught up to block {}", live_from - 1);
}

async fn replay_chunk<C: ChainClient + 'static>(
    listener: &EventListener<C>,
    handler: &dyn EventHandler,
    from: u64,
    to: u64,
) -> Result<(), ListenerError> {
    let events = listener
        .get_historical_events(from, BlockTarget::Number(to))
        .await?;
    deliver_in_chain_order(handler, events).await?;
    Ok(())
}

/// Initializes the logging, ensuring that the `RUST_LOG` environment
/// variable is always considered first.
fn init_logging() -> Result<()> {
    const DEFAULT_LOG_FILTER: &str = "info,activity_indexer=debug";

    tracing::subscriber::set_global_default(
        fmt::Subscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .or(EnvFilter::try_new(DEFAULT_LOG_FILTER))
                    .context("Invalid RUST_LOG filters")?,
            )
            .finish(),
    )
    .context("Failed to set the global tracing subscriber")?;

    Ok(())
}

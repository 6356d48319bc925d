/// Errors raised by a chain client.
#[derive(Debug, thiserror::Error)]
pub enum ChainClientError {
    #[error("RPC transport error: {0}")]
    Transport(String),
    #[error("Block not found: {0}")]
    BlockNotFound(u64),
    #[error("Malformed log: {0}")]
    MalformedLog(String),
    #[error("Log decoding error: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("The listener is already running")]
    AlreadyListening,
    #[error(transparent)]
    Chain(#[from] ChainClientError),
    #[error("Event handler failed: {0}")]
    Handler(#[from] HandlerError),
}

/// Raised by an event handler that could not take an event.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Errors of the backend activity API. Their `Display` form is what ends up
/// in the feed error state.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Failed to fetch activity: HTTP {0}")]
    Status(u16),
    #[error("Invalid activity response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FeedError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FeedError::Decode(e.to_string())
        } else {
            FeedError::Transport(e.to_string())
        }
    }
}

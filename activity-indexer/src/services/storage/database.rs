use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use super::Storage;
use crate::helpers::units::u256_to_decimal;
use crate::interfaces::error::StorageError;
use crate::interfaces::event::BlockchainEvent;

const MAX_CONNECTIONS: u32 = 5;

#[derive(Clone)]
pub struct DatabaseStorage {
    pool: PgPool,
}

impl DatabaseStorage {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await?;
        Ok(DatabaseStorage { pool })
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for DatabaseStorage {
    async fn store_blockchain_event(&self, event: &BlockchainEvent) -> Result<bool, StorageError> {
        let query = r#"
            INSERT INTO blockchain_events (
                event_name, user_address, token_uuid, amount, price_per_token, total_value,
                is_freebie, tx_hash, block_number, log_index, block_timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (tx_hash, event_name) DO NOTHING
        "#;

        let result = sqlx::query(query)
            .bind(event.event_name.as_ref())
            .bind(format!("{:#x}", event.user_address))
            .bind(&event.token_uuid)
            .bind(u256_to_decimal(event.amount))
            .bind(&event.price_per_token)
            .bind(&event.total_value)
            .bind(event.is_freebie)
            .bind(format!("{:#x}", event.tx_hash))
            .bind(event.block_number as i64)
            .bind(event.log_index as i64)
            .bind(event.timestamp as i64)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

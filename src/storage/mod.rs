//! Storage implementations.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::{CollectionConfig, StorageConfig, StorageType};
use crate::interfaces::{Result, RowStore, StorageError};

pub mod memory;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod sql;

pub use memory::InMemoryRowStore;

#[cfg(feature = "postgres")]
pub use sql::postgres::PostgresRowStore;
#[cfg(feature = "sqlite")]
pub use sql::sqlite::SqliteRowStore;

/// Initialize the row store for one collection based on configuration.
pub async fn init_storage(
    config: &StorageConfig,
    collection: &CollectionConfig,
) -> Result<Arc<dyn RowStore>> {
    info!(
        storage = %config.storage_type,
        collection = %collection.name,
        table = %collection.table_name(),
        "Initializing row store"
    );

    match &config.storage_type {
        StorageType::Memory => Ok(Arc::new(InMemoryRowStore::new())),
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            use sqlx::sqlite::SqlitePoolOptions;

            let sqlite = &config.sqlite;
            let max_connections = if sqlite.is_in_memory() {
                1
            } else {
                if let Some(parent) = std::path::Path::new(&sqlite.path).parent() {
                    std::fs::create_dir_all(parent)?;
                }
                sqlite.max_connections
            };

            let pool = SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect(&format!("sqlite:{}?mode=rwc", sqlite.path))
                .await?;

            Ok(Arc::new(SqliteRowStore::for_collection(pool, collection)?))
        }
        #[cfg(feature = "postgres")]
        StorageType::Postgres => {
            use sqlx::postgres::PgPoolOptions;

            let pool = PgPoolOptions::new()
                .max_connections(config.postgres.max_connections)
                .connect(&config.postgres.uri)
                .await?;

            Ok(Arc::new(PostgresRowStore::for_collection(pool, collection)?))
        }
        #[allow(unreachable_patterns)]
        other => {
            error!(storage = %other, "Storage backend not enabled in this build");
            Err(StorageError::UnknownStorage(other.to_string()))
        }
    }
}

use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use super::{DataAccess, MemoryStore, PgStore};
use crate::config::Config;
use crate::db::Database;

/// Supported store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!(
                "Unsupported STORE_BACKEND: {}. Supported backends: postgres, memory",
                s
            )),
        }
    }
}

/// Factory for the data access port
pub struct StoreFactory;

impl StoreFactory {
    /// Connect the configured backend; the postgres store runs migrations first
    pub async fn create(config: &Config) -> anyhow::Result<Arc<dyn DataAccess>> {
        info!("Creating store: {:?}", config.store_backend);

        match config.store_backend {
            StoreBackend::Postgres => {
                let db = Database::new(&config.database_url).await?;
                info!("Database connected");

                db.run_migrations().await?;
                info!("Database migrations completed");

                Ok(Arc::new(PgStore::new(db)))
            }
            StoreBackend::Memory => {
                tracing::warn!("Using the in-memory store; data is lost on restart");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }
}

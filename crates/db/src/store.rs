//! [`KeyValueStore`] backed by the `kv_store` table.

use async_trait::async_trait;
use atelier_core::error::CoreError;
use atelier_core::persistence::KeyValueStore;

use crate::repositories::KvRepo;
use crate::DbPool;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn storage_error(key: &str, e: sqlx::Error) -> CoreError {
    tracing::error!(key, error = %e, "kv_store query failed");
    CoreError::Storage(format!("'{key}': {e}"))
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn load(&self, key: &str) -> Result<Option<String>, CoreError> {
        KvRepo::get(&self.pool, key)
            .await
            .map_err(|e| storage_error(key, e))
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), CoreError> {
        KvRepo::put(&self.pool, key, value)
            .await
            .map_err(|e| storage_error(key, e))
    }
}

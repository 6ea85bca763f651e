//! Key-value persistence seam for user-owned state.
//!
//! Values are JSON documents. The SQLite-backed implementation lives in
//! `atelier-db`; [`MemoryStore`] backs tests and ephemeral sessions.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::CoreError;

/// Key under which the rating log is stored.
pub const RATINGS_KEY: &str = "ratings";

/// Key under which material presets are stored.
pub const PRESETS_KEY: &str = "presets";

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Raw value for `key`, `None` when never written.
    async fn load(&self, key: &str) -> Result<Option<String>, CoreError>;

    async fn save(&self, key: &str, value: &str) -> Result<(), CoreError>;
}

/// Load and decode a JSON value. A missing key yields `T::default()`;
/// an undecodable value is a storage error.
pub async fn load_json<T>(store: &dyn KeyValueStore, key: &str) -> Result<T, CoreError>
where
    T: DeserializeOwned + Default,
{
    match store.load(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| CoreError::Storage(format!("Corrupt value under '{key}': {e}"))),
        None => Ok(T::default()),
    }
}

/// Encode `value` as JSON and store it under `key`.
pub async fn save_json<T>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), CoreError>
where
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_string(value)
        .map_err(|e| CoreError::Internal(format!("Failed to encode '{key}': {e}")))?;
    store.save(key, &raw).await
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

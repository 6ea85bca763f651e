//! Persisted material presets.

use std::sync::Arc;

use atelier_core::error::CoreError;
use atelier_core::persistence::{load_json, save_json, KeyValueStore, PRESETS_KEY};
use atelier_core::preset::{MaterialPreset, PresetBook, PresetId};
use atelier_core::settings::Material;
use tokio::sync::RwLock;

pub struct PresetLibrary {
    book: RwLock<PresetBook>,
    store: Arc<dyn KeyValueStore>,
}

impl PresetLibrary {
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Result<Self, CoreError> {
        let book: PresetBook = load_json(store.as_ref(), PRESETS_KEY).await?;
        tracing::debug!(presets = book.len(), "Preset library loaded");
        Ok(Self {
            book: RwLock::new(book),
            store,
        })
    }

    /// Save under `name`, replacing a preset with the same name.
    ///
    /// Mutations are applied to a copy and only kept once persisted.
    pub async fn save(&self, name: &str, material: Material) -> Result<MaterialPreset, CoreError> {
        let mut book = self.book.write().await;
        let mut staged = book.clone();
        let preset = staged.upsert(name, material)?;
        save_json(self.store.as_ref(), PRESETS_KEY, &staged).await?;
        *book = staged;
        tracing::info!(preset_id = %preset.id, name = %preset.name, "Preset saved");
        Ok(preset)
    }

    pub async fn delete(&self, id: PresetId) -> Result<MaterialPreset, CoreError> {
        let mut book = self.book.write().await;
        let mut staged = book.clone();
        let removed = staged.remove(id)?;
        save_json(self.store.as_ref(), PRESETS_KEY, &staged).await?;
        *book = staged;
        tracing::info!(preset_id = %id, "Preset deleted");
        Ok(removed)
    }

    pub async fn list(&self) -> Vec<MaterialPreset> {
        self.book.read().await.presets().to_vec()
    }

    pub async fn get(&self, id: PresetId) -> Option<MaterialPreset> {
        self.book.read().await.get(id).cloned()
    }

    pub async fn find_by_name(&self, name: &str) -> Option<MaterialPreset> {
        self.book.read().await.find_by_name(name).cloned()
    }
}

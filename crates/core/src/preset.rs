//! Material presets: named, reusable material settings.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::settings::Material;
use crate::types::Timestamp;

/// Identifier of a saved preset.
pub type PresetId = uuid::Uuid;

/// Maximum length for a preset name, in characters.
pub const MAX_PRESET_NAME_LEN: usize = 100;

/// Validate a preset name: non-blank and within length limit.
pub fn validate_preset_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Preset name must not be empty".to_string(),
        ));
    }
    let len = trimmed.chars().count();
    if len > MAX_PRESET_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Preset name too long: {len} chars (max {MAX_PRESET_NAME_LEN})"
        )));
    }
    Ok(())
}

/// A saved material with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialPreset {
    pub id: PresetId,
    pub name: String,
    pub material: Material,
    pub created_at: Timestamp,
}

/// Ordered set of presets, unique by case-insensitive name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetBook {
    presets: Vec<MaterialPreset>,
}

impl PresetBook {
    pub fn presets(&self) -> &[MaterialPreset] {
        &self.presets
    }

    pub fn get(&self, id: PresetId) -> Option<&MaterialPreset> {
        self.presets.iter().find(|p| p.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&MaterialPreset> {
        let wanted = name.trim().to_lowercase();
        self.presets
            .iter()
            .find(|p| p.name.to_lowercase() == wanted)
    }

    /// Save a preset. An existing preset with the same name (ignoring
    /// case) keeps its id and creation time and takes the new material.
    pub fn upsert(&mut self, name: &str, material: Material) -> Result<MaterialPreset, CoreError> {
        validate_preset_name(name)?;
        let name = name.trim();
        let wanted = name.to_lowercase();

        if let Some(existing) = self
            .presets
            .iter_mut()
            .find(|p| p.name.to_lowercase() == wanted)
        {
            existing.name = name.to_string();
            existing.material = material;
            return Ok(existing.clone());
        }

        let preset = MaterialPreset {
            id: PresetId::new_v4(),
            name: name.to_string(),
            material,
            created_at: chrono::Utc::now(),
        };
        self.presets.push(preset.clone());
        Ok(preset)
    }

    pub fn remove(&mut self, id: PresetId) -> Result<MaterialPreset, CoreError> {
        let index = self
            .presets
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| CoreError::NotFound {
                entity: "preset",
                id: id.to_string(),
            })?;
        Ok(self.presets.remove(index))
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

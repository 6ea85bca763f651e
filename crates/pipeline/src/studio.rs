//! Studio facade: the operations a front-end (or the batch worker)
//! performs, wired onto the store, settings, controller and event bus.

use std::sync::Arc;

use atelier_core::error::CoreError;
use atelier_core::intake::IntakeFile;
use atelier_core::job::{Job, Rating};
use atelier_core::job_store::{JobStore, QueueStats};
use atelier_core::persistence::KeyValueStore;
use atelier_core::preference::{PreferenceProfile, RatingRecord};
use atelier_core::preset::{MaterialPreset, PresetId};
use atelier_core::settings::{GenerationConfig, Material};
use atelier_core::types::JobId;
use atelier_events::{EventBus, EventKind, PauseReason, StudioEvent};
use atelier_imagegen::{CredentialProvider, ImageGenerator};
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::QueueConfig;
use crate::controller::{QueueController, RunState};
use crate::error::StudioError;
use crate::preferences::PreferenceAggregator;
use crate::presets::PresetLibrary;

/// Collaborators a [`Studio`] is built from.
pub struct StudioParts {
    pub persistence: Arc<dyn KeyValueStore>,
    pub generator: Arc<dyn ImageGenerator>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub events: Arc<EventBus>,
    pub queue: QueueConfig,
}

pub struct Studio {
    store: Arc<RwLock<JobStore>>,
    settings: RwLock<GenerationConfig>,
    preferences: Arc<PreferenceAggregator>,
    presets: PresetLibrary,
    controller: Arc<QueueController>,
    credentials: Arc<dyn CredentialProvider>,
    events: Arc<EventBus>,
}

impl Studio {
    /// Load persisted state and build a paused studio. Call
    /// [`spawn`](Self::spawn) to start the controller task.
    pub async fn open(parts: StudioParts) -> Result<Self, StudioError> {
        let preferences = Arc::new(PreferenceAggregator::load(parts.persistence.clone()).await?);
        let presets = PresetLibrary::load(parts.persistence).await?;
        let store = Arc::new(RwLock::new(JobStore::new(parts.queue.capacity)));

        let controller = Arc::new(QueueController::new(
            store.clone(),
            parts.generator,
            parts.credentials.clone(),
            preferences.clone(),
            parts.events.clone(),
            parts.queue,
        ));

        Ok(Self {
            store,
            settings: RwLock::new(GenerationConfig::default()),
            preferences,
            presets,
            controller,
            credentials: parts.credentials,
            events: parts.events,
        })
    }

    /// Spawn the controller loop on the current runtime.
    pub fn spawn(&self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.controller.clone().run(cancel))
    }

    // ---- jobs ----

    /// Validate files and queue them with a snapshot of the current
    /// settings. Nothing is queued if any file is rejected or the batch
    /// exceeds capacity.
    pub async fn submit_files(&self, files: Vec<IntakeFile>) -> Result<Vec<JobId>, StudioError> {
        let config = self.settings().await;
        let jobs = files
            .into_iter()
            .map(|file| file.into_job(config.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let job_ids = self.store.write().await.submit(jobs)?;
        tracing::info!(count = job_ids.len(), "Jobs submitted");
        self.events.publish(EventKind::JobsSubmitted {
            job_ids: job_ids.clone(),
        });
        self.controller.notify_work();
        Ok(job_ids)
    }

    /// Put a failed job back in the queue with the current settings.
    pub async fn resubmit(&self, id: JobId) -> Result<(), StudioError> {
        let config = self.settings().await;
        self.store.write().await.resubmit(id, config)?;
        tracing::info!(job_id = %id, "Job resubmitted");
        self.events.publish(EventKind::JobResubmitted { job_id: id });
        self.controller.notify_work();
        Ok(())
    }

    /// Resubmit failed jobs oldest first until capacity runs out.
    /// Returns the ids that were requeued.
    pub async fn resubmit_all_failed(&self) -> Result<Vec<JobId>, StudioError> {
        let failed = self.store.read().await.failed_ids();
        let mut requeued = Vec::with_capacity(failed.len());
        for id in failed {
            match self.resubmit(id).await {
                Ok(()) => requeued.push(id),
                Err(StudioError::Core(CoreError::CapacityExceeded { .. })) => {
                    tracing::warn!(requeued = requeued.len(), "Queue full, stopping resubmission");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(requeued)
    }

    /// Delete one job that is not generating.
    pub async fn remove(&self, id: JobId) -> Result<(), StudioError> {
        self.store.write().await.remove(id)?;
        self.events.publish(EventKind::JobRemoved { job_id: id });
        Ok(())
    }

    /// Drop every job and pause the queue. A generation already in flight
    /// finishes, but its result is discarded.
    pub async fn clear(&self) -> usize {
        let removed = self.store.write().await.clear();
        self.controller.pause(PauseReason::Cleared);
        tracing::info!(removed, "Job history cleared");
        self.events.publish(EventKind::HistoryCleared { removed });
        removed
    }

    /// Rate a completed job and feed the rating log.
    ///
    /// The rating is persisted first; the job is only marked rated once
    /// the log has been saved.
    pub async fn rate(&self, id: JobId, rating: Rating) -> Result<RatingRecord, StudioError> {
        let record = self.store.read().await.rating_record(id, rating)?;
        self.preferences.record_rating(record.clone()).await?;
        if let Err(e) = self.store.write().await.rate(id, rating) {
            // Removed while the log was being saved; the record outlives it.
            tracing::debug!(job_id = %id, error = %e, "Rated job no longer in store");
        }
        self.events.publish(EventKind::JobRated { job_id: id, rating });
        Ok(record)
    }

    /// Jobs in display order (newest first).
    pub async fn jobs(&self) -> Vec<Job> {
        self.store.read().await.jobs().to_vec()
    }

    pub async fn job(&self, id: JobId) -> Option<Job> {
        self.store.read().await.get(id).cloned()
    }

    pub async fn stats(&self) -> QueueStats {
        self.store.read().await.stats()
    }

    // ---- queue ----

    /// Start processing, acquiring a credential first if none is valid.
    pub async fn start(&self) -> Result<(), StudioError> {
        if !self.credentials.has_valid_credential().await {
            self.credentials.acquire_credential().await?;
        }
        self.controller.start();
        Ok(())
    }

    pub fn pause(&self) {
        self.controller.pause(PauseReason::User);
    }

    pub fn run_state(&self) -> watch::Receiver<RunState> {
        self.controller.subscribe_run_state()
    }

    /// Resolve once the queue is paused with nothing in flight.
    pub async fn wait_until_idle(&self) {
        self.controller.wait_until_idle().await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.events.subscribe()
    }

    // ---- settings ----

    pub async fn settings(&self) -> GenerationConfig {
        self.settings.read().await.clone()
    }

    /// Replace the global settings. Jobs already queued keep their
    /// snapshot.
    pub async fn update_settings(&self, config: GenerationConfig) {
        *self.settings.write().await = config;
        self.events.publish(EventKind::SettingsUpdated);
    }

    pub async fn preference_profile(&self) -> PreferenceProfile {
        self.preferences.profile().await
    }

    // ---- presets ----

    pub async fn presets(&self) -> Vec<MaterialPreset> {
        self.presets.list().await
    }

    pub async fn save_preset(
        &self,
        name: &str,
        material: Material,
    ) -> Result<MaterialPreset, StudioError> {
        Ok(self.presets.save(name, material).await?)
    }

    /// Save the material of the current settings as a preset.
    pub async fn save_current_material(&self, name: &str) -> Result<MaterialPreset, StudioError> {
        let material = self.settings.read().await.material;
        self.save_preset(name, material).await
    }

    pub async fn delete_preset(&self, id: PresetId) -> Result<MaterialPreset, StudioError> {
        Ok(self.presets.delete(id).await?)
    }

    /// Replace the material of the current settings with a preset's.
    pub async fn apply_preset(&self, id: PresetId) -> Result<MaterialPreset, StudioError> {
        let preset = self.presets.get(id).await.ok_or_else(|| CoreError::NotFound {
            entity: "preset",
            id: id.to_string(),
        })?;
        self.apply_material(&preset).await;
        Ok(preset)
    }

    /// Like [`apply_preset`](Self::apply_preset), looked up by name.
    pub async fn apply_preset_named(&self, name: &str) -> Result<MaterialPreset, StudioError> {
        let preset = self
            .presets
            .find_by_name(name)
            .await
            .ok_or_else(|| CoreError::NotFound {
                entity: "preset",
                id: name.to_string(),
            })?;
        self.apply_material(&preset).await;
        Ok(preset)
    }

    async fn apply_material(&self, preset: &MaterialPreset) {
        self.settings.write().await.material = preset.material;
        tracing::info!(preset_id = %preset.id, name = %preset.name, "Preset applied");
        self.events.publish(EventKind::SettingsUpdated);
    }
}

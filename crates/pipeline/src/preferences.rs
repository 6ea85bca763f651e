//! Persisted rating log and the preference profile derived from it.

use std::sync::Arc;

use atelier_core::error::CoreError;
use atelier_core::persistence::{load_json, save_json, KeyValueStore, RATINGS_KEY};
use atelier_core::preference::{compute_profile, PreferenceProfile, RatingLog, RatingRecord};
use tokio::sync::RwLock;

pub struct PreferenceAggregator {
    log: RwLock<RatingLog>,
    store: Arc<dyn KeyValueStore>,
}

impl PreferenceAggregator {
    /// Read the rating log. A missing key is an empty log; a corrupt
    /// value is an error.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Result<Self, CoreError> {
        let records: Vec<RatingRecord> = load_json(store.as_ref(), RATINGS_KEY).await?;
        let log = RatingLog::from_records(records);
        tracing::debug!(records = log.len(), "Rating log loaded");
        Ok(Self {
            log: RwLock::new(log),
            store,
        })
    }

    /// Upsert `record` by job id and persist the whole log.
    ///
    /// The in-memory log only changes once the save succeeds. The write
    /// lock is held through the save so concurrent ratings are persisted
    /// in the order they were applied.
    pub async fn record_rating(&self, record: RatingRecord) -> Result<(), CoreError> {
        let mut log = self.log.write().await;
        let (job_id, rating) = (record.job_id, record.rating);
        let mut staged = log.clone();
        staged.upsert(record);
        save_json(self.store.as_ref(), RATINGS_KEY, &staged).await?;
        *log = staged;
        tracing::info!(job_id = %job_id, rating, total = log.len(), "Rating recorded");
        Ok(())
    }

    pub async fn profile(&self) -> PreferenceProfile {
        compute_profile(self.log.read().await.records())
    }

    pub async fn records(&self) -> Vec<RatingRecord> {
        self.log.read().await.records().to_vec()
    }
}

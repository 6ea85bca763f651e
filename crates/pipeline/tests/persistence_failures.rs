//! A failed save leaves in-memory state as it was before the call.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use atelier_core::error::CoreError;
use atelier_core::preference::RatingRecord;
use atelier_core::settings::{GenerationConfig, ShadowIntensity};
use atelier_core::types::JobId;
use atelier_pipeline::{PreferenceAggregator, PresetLibrary, StudioError};
use common::*;

fn hard_rating(rating: u8) -> RatingRecord {
    let config = GenerationConfig {
        shadow_intensity: ShadowIntensity::Hard,
        ..GenerationConfig::default()
    };
    RatingRecord::new(JobId::new_v4(), rating, config)
}

#[tokio::test]
async fn unsaved_rating_does_not_change_profile() {
    let store = Arc::new(FlakyStore::default());
    let aggregator = PreferenceAggregator::load(store.clone()).await.unwrap();

    store.fail_saves(true);
    assert_matches!(
        aggregator.record_rating(hard_rating(5)).await,
        Err(CoreError::Storage(_))
    );
    assert!(aggregator.records().await.is_empty());
    assert!(aggregator.profile().await.is_empty());

    store.fail_saves(false);
    aggregator.record_rating(hard_rating(5)).await.unwrap();
    assert_eq!(aggregator.records().await.len(), 1);
}

#[tokio::test]
async fn unsaved_preset_changes_are_discarded() {
    let store = Arc::new(FlakyStore::default());
    let library = PresetLibrary::load(store.clone()).await.unwrap();
    let kept = library
        .save("Bronze", metal_patina(40).material)
        .await
        .unwrap();

    store.fail_saves(true);
    assert_matches!(
        library.save("Verdigris", metal_patina(90).material).await,
        Err(CoreError::Storage(_))
    );
    assert_matches!(library.delete(kept.id).await, Err(CoreError::Storage(_)));

    let presets = library.list().await;
    assert_eq!(presets, vec![kept]);
}

#[tokio::test(start_paused = true)]
async fn failed_rating_save_leaves_job_unrated() {
    let store = Arc::new(FlakyStore::default());
    let h = harness_with_store(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(FakeCredential::valid()),
        queue_config(30),
        store.clone(),
    )
    .await;

    let ids = h.studio.submit_files(vec![png("a.png")]).await.unwrap();
    h.studio.start().await.unwrap();
    h.studio.wait_until_idle().await;

    store.fail_saves(true);
    assert_matches!(
        h.studio.rate(ids[0], 5).await,
        Err(StudioError::Core(CoreError::Storage(_)))
    );
    assert_eq!(h.studio.job(ids[0]).await.unwrap().rating, None);
    assert!(h.studio.preference_profile().await.is_empty());

    store.fail_saves(false);
    h.studio.rate(ids[0], 5).await.unwrap();
    assert_eq!(h.studio.job(ids[0]).await.unwrap().rating, Some(5));
}

//! Studio facade operations: intake, capacity, ratings, resubmission,
//! presets and credential acquisition.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use assert_matches::assert_matches;
use atelier_core::error::CoreError;
use atelier_core::intake::IntakeFile;
use atelier_core::job::JobStatus;
use atelier_core::persistence::{KeyValueStore, MemoryStore, PRESETS_KEY};
use atelier_core::settings::{GenerationConfig, Material, MaterialKind, ShadowIntensity};
use atelier_events::{EventKind, PauseReason};
use atelier_pipeline::{RunState, StudioError};
use common::*;

// ---------------------------------------------------------------------------
// Intake and capacity
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn batch_over_capacity_is_rejected_whole() {
    let h = harness(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(FakeCredential::valid()),
        queue_config(2),
    )
    .await;

    let result = h
        .studio
        .submit_files(vec![png("a.png"), png("b.png"), png("c.png")])
        .await;
    assert_matches!(
        result,
        Err(StudioError::Core(CoreError::CapacityExceeded { requested: 3, capacity: 2, .. }))
    );
    assert!(h.studio.jobs().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn invalid_file_rejects_the_batch() {
    let h = harness(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(FakeCredential::valid()),
        queue_config(30),
    )
    .await;

    let bogus = IntakeFile::new("notes.txt", b"hello".to_vec(), "text/plain");
    let result = h.studio.submit_files(vec![png("a.png"), bogus]).await;
    assert_matches!(result, Err(StudioError::Core(CoreError::Validation(_))));
    assert!(h.studio.jobs().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn jobs_are_listed_newest_first() {
    let h = harness(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(FakeCredential::valid()),
        queue_config(30),
    )
    .await;

    let first = h.studio.submit_files(vec![png("a.png")]).await.unwrap();
    let second = h.studio.submit_files(vec![png("b.png")]).await.unwrap();

    let order: Vec<_> = h.studio.jobs().await.iter().map(|j| j.id).collect();
    assert_eq!(order, vec![second[0], first[0]]);
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn start_acquires_missing_credential() {
    let credential = Arc::new(FakeCredential::new(false, true));
    let h = harness(
        Arc::new(ScriptedGenerator::default()),
        credential.clone(),
        queue_config(30),
    )
    .await;

    h.studio.submit_files(vec![png("a.png")]).await.unwrap();
    h.studio.start().await.unwrap();
    h.studio.wait_until_idle().await;

    assert_eq!(credential.acquisitions.load(Ordering::SeqCst), 1);
    assert_eq!(h.studio.stats().await.completed, 1);
}

#[tokio::test(start_paused = true)]
async fn start_fails_when_credential_cannot_be_acquired() {
    let h = harness(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(FakeCredential::new(false, false)),
        queue_config(30),
    )
    .await;

    h.studio.submit_files(vec![png("a.png")]).await.unwrap();
    assert_matches!(h.studio.start().await, Err(StudioError::Credential(_)));
    assert_eq!(*h.studio.run_state().borrow(), RunState::Paused);
    assert_eq!(h.studio.stats().await.queued, 1);
}

// ---------------------------------------------------------------------------
// Resubmission
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn resubmitted_job_uses_current_settings() {
    let generator = Arc::new(ScriptedGenerator::with_script(vec![Err(api_error(
        500,
        "INTERNAL: boom",
    ))]));
    let h = harness(generator.clone(), Arc::new(FakeCredential::valid()), queue_config(30)).await;

    let ids = h.studio.submit_files(vec![png("a.png")]).await.unwrap();
    h.studio.start().await.unwrap();
    h.studio.wait_until_idle().await;
    assert_eq!(h.studio.job(ids[0]).await.unwrap().status, JobStatus::Failed);

    h.studio.update_settings(metal_patina(50)).await;
    h.studio.resubmit(ids[0]).await.unwrap();
    let requeued = h.studio.job(ids[0]).await.unwrap();
    assert_eq!(requeued.status, JobStatus::Queued);
    assert_eq!(requeued.config, metal_patina(50));

    h.studio.start().await.unwrap();
    h.studio.wait_until_idle().await;

    let calls = generator.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].prompt.contains("MATERIAL: METAL"));
    assert!(calls[1].image.ends_with(b"a.png"));
    assert_eq!(h.studio.job(ids[0]).await.unwrap().status, JobStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn resubmit_all_failed_stops_at_capacity() {
    let generator = Arc::new(ScriptedGenerator::with_script(vec![
        Err(api_error(500, "INTERNAL: one")),
        Err(api_error(500, "INTERNAL: two")),
        Err(api_error(500, "INTERNAL: three")),
    ]));
    let h = harness(generator, Arc::new(FakeCredential::valid()), queue_config(3)).await;

    h.studio
        .submit_files(vec![png("a.png"), png("b.png"), png("c.png")])
        .await
        .unwrap();
    h.studio.start().await.unwrap();
    h.studio.wait_until_idle().await;
    assert_eq!(h.studio.stats().await.failed, 3);

    h.studio.submit_files(vec![png("d.png")]).await.unwrap();
    let requeued = h.studio.resubmit_all_failed().await.unwrap();
    assert_eq!(requeued.len(), 2);

    let stats = h.studio.stats().await;
    assert_eq!(stats.queued, 3);
    assert_eq!(stats.failed, 1);
}

#[tokio::test(start_paused = true)]
async fn completed_job_cannot_be_resubmitted() {
    let h = harness(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(FakeCredential::valid()),
        queue_config(30),
    )
    .await;

    let ids = h.studio.submit_files(vec![png("a.png")]).await.unwrap();
    h.studio.start().await.unwrap();
    h.studio.wait_until_idle().await;

    assert_matches!(
        h.studio.resubmit(ids[0]).await,
        Err(StudioError::Core(CoreError::Conflict(_)))
    );
}

// ---------------------------------------------------------------------------
// Ratings and preferences
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn rating_twice_keeps_one_record_and_biases_later_requests() {
    let generator = Arc::new(ScriptedGenerator::default());
    let persistence: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let h = harness_with_store(
        generator.clone(),
        Arc::new(FakeCredential::valid()),
        queue_config(30),
        persistence.clone(),
    )
    .await;

    let hard = GenerationConfig {
        shadow_intensity: ShadowIntensity::Hard,
        ..GenerationConfig::default()
    };
    h.studio.update_settings(hard).await;
    let ids = h.studio.submit_files(vec![png("a.png")]).await.unwrap();
    h.studio.start().await.unwrap();
    h.studio.wait_until_idle().await;
    assert!(!generator.calls()[0].prompt.contains("USER PREFERENCES"));

    h.studio.rate(ids[0], 2).await.unwrap();
    assert!(h.studio.preference_profile().await.is_empty());
    h.studio.rate(ids[0], 5).await.unwrap();

    let profile = h.studio.preference_profile().await;
    assert_eq!(profile.sample_count, 1);
    assert_eq!(profile.shadow_intensity, Some(ShadowIntensity::Hard));
    assert_eq!(h.studio.job(ids[0]).await.unwrap().rating, Some(5));

    h.studio.submit_files(vec![png("b.png")]).await.unwrap();
    h.studio.start().await.unwrap();
    h.studio.wait_until_idle().await;
    assert!(generator.calls()[1].prompt.contains("USER PREFERENCES"));

    // The log outlives the job history.
    h.studio.clear().await;
    let reopened = harness_with_store(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(FakeCredential::valid()),
        queue_config(30),
        persistence,
    )
    .await;
    assert_eq!(reopened.studio.preference_profile().await.sample_count, 1);
}

#[tokio::test(start_paused = true)]
async fn rating_a_queued_job_is_rejected() {
    let h = harness(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(FakeCredential::valid()),
        queue_config(30),
    )
    .await;

    let ids = h.studio.submit_files(vec![png("a.png")]).await.unwrap();
    assert_matches!(
        h.studio.rate(ids[0], 4).await,
        Err(StudioError::Core(CoreError::Conflict(_)))
    );
}

// ---------------------------------------------------------------------------
// Clear / remove / pause
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn clear_empties_history_and_pauses() {
    let h = harness(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(FakeCredential::valid()),
        queue_config(30),
    )
    .await;
    let mut rx = h.studio.subscribe();

    h.studio
        .submit_files(vec![png("a.png"), png("b.png")])
        .await
        .unwrap();
    assert_eq!(h.studio.clear().await, 2);
    assert!(h.studio.jobs().await.is_empty());
    assert_eq!(*h.studio.run_state().borrow(), RunState::Paused);
    assert!(drain(&mut rx).contains(&EventKind::HistoryCleared { removed: 2 }));
}

#[tokio::test(start_paused = true)]
async fn remove_deletes_a_single_job() {
    let h = harness(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(FakeCredential::valid()),
        queue_config(30),
    )
    .await;

    let ids = h
        .studio
        .submit_files(vec![png("a.png"), png("b.png")])
        .await
        .unwrap();
    h.studio.remove(ids[0]).await.unwrap();

    let remaining: Vec<_> = h.studio.jobs().await.iter().map(|j| j.id).collect();
    assert_eq!(remaining, vec![ids[1]]);
    assert_matches!(
        h.studio.remove(ids[0]).await,
        Err(StudioError::Core(CoreError::NotFound { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn user_pause_is_reported() {
    let h = harness(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(FakeCredential::valid()),
        queue_config(30),
    )
    .await;
    let mut rx = h.studio.subscribe();

    h.studio.submit_files(vec![png("a.png")]).await.unwrap();
    h.studio.start().await.unwrap();
    h.studio.pause();
    h.studio.wait_until_idle().await;

    let events = drain(&mut rx);
    assert!(events.contains(&EventKind::QueueStarted));
    assert!(events.contains(&EventKind::QueuePaused {
        reason: PauseReason::User
    }));
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn preset_applies_material_to_current_settings() {
    let h = harness(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(FakeCredential::valid()),
        queue_config(30),
    )
    .await;

    let metal = metal_patina(70).material;
    let preset = h.studio.save_preset("Aged brass", metal).await.unwrap();
    assert_eq!(h.studio.settings().await.material, Material::Standard);

    h.studio.apply_preset(preset.id).await.unwrap();
    assert_eq!(h.studio.settings().await.material.kind(), MaterialKind::Metal);

    h.studio.update_settings(GenerationConfig::default()).await;
    h.studio.apply_preset_named("AGED BRASS").await.unwrap();
    assert_eq!(h.studio.settings().await.material, metal);

    assert!(h.persistence.load(PRESETS_KEY).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn unknown_preset_is_not_found() {
    let h = harness(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(FakeCredential::valid()),
        queue_config(30),
    )
    .await;

    assert_matches!(
        h.studio.apply_preset_named("missing").await,
        Err(StudioError::Core(CoreError::NotFound { entity: "preset", .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn current_material_can_be_saved_and_deleted() {
    let h = harness(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(FakeCredential::valid()),
        queue_config(30),
    )
    .await;

    h.studio.update_settings(metal_patina(20)).await;
    let preset = h.studio.save_current_material("Light patina").await.unwrap();
    assert_eq!(h.studio.presets().await.len(), 1);

    h.studio.delete_preset(preset.id).await.unwrap();
    assert!(h.studio.presets().await.is_empty());
}

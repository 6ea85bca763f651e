//! Test doubles and builders shared by the pipeline integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use atelier_core::compiler::GenerationRequest;
use atelier_core::error::CoreError;
use atelier_core::intake::IntakeFile;
use atelier_core::job::ImagePayload;
use atelier_core::persistence::{KeyValueStore, MemoryStore};
use atelier_core::settings::{GenerationConfig, Material, Percentage, VariationTier};
use atelier_events::{EventBus, EventKind, StudioEvent};
use atelier_imagegen::{CredentialError, CredentialProvider, GenerationError, ImageGenerator};
use atelier_pipeline::{QueueConfig, Studio, StudioParts};
use tokio::sync::{broadcast, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// One recorded call to the generator.
#[derive(Debug, Clone)]
pub struct GenerateCall {
    pub at: Instant,
    pub image: Vec<u8>,
    pub media_type: String,
    pub prompt: String,
}

/// Generator that replays scripted outcomes, then succeeds.
#[derive(Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<ImagePayload, GenerationError>>>,
    calls: Mutex<Vec<GenerateCall>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedGenerator {
    pub fn with_script(outcomes: Vec<Result<ImagePayload, GenerationError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            ..Self::default()
        }
    }

    /// Every call blocks until `gate` is notified.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        image: &[u8],
        media_type: &str,
        request: &GenerationRequest,
    ) -> Result<ImagePayload, GenerationError> {
        self.calls.lock().unwrap().push(GenerateCall {
            at: Instant::now(),
            image: image.to_vec(),
            media_type: media_type.to_string(),
            prompt: request.prompt.clone(),
        });
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(result_image()))
    }
}

pub fn result_image() -> ImagePayload {
    ImagePayload::new(b"\x89PNG\r\n\x1a\nRESULT".to_vec(), "image/png")
}

pub fn api_error(status: u16, message: &str) -> GenerationError {
    GenerationError::Api {
        status,
        message: message.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

pub struct FakeCredential {
    valid: AtomicBool,
    acquirable: bool,
    pub acquisitions: AtomicUsize,
    pub invalidations: AtomicUsize,
}

impl FakeCredential {
    pub fn valid() -> Self {
        Self::new(true, true)
    }

    pub fn new(valid: bool, acquirable: bool) -> Self {
        Self {
            valid: AtomicBool::new(valid),
            acquirable,
            acquisitions: AtomicUsize::new(0),
            invalidations: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CredentialProvider for FakeCredential {
    async fn has_valid_credential(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    async fn acquire_credential(&self) -> Result<(), CredentialError> {
        if !self.acquirable {
            return Err(CredentialError::NotConfigured("ATELIER_API_KEY".into()));
        }
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.valid.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.valid.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// In-memory store whose saves can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_saves: AtomicBool,
}

impl FlakyStore {
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn load(&self, key: &str) -> Result<Option<String>, CoreError> {
        self.inner.load(key).await
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), CoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CoreError::Storage("disk full".into()));
        }
        self.inner.save(key, value).await
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub const THROTTLE: Duration = Duration::from_secs(1);
pub const COOLDOWN: Duration = Duration::from_secs(10);

pub fn queue_config(capacity: usize) -> QueueConfig {
    QueueConfig {
        capacity,
        throttle: THROTTLE,
        rate_limit_cooldown: COOLDOWN,
    }
}

/// A PNG upload whose bytes end with its filename, so calls can be traced
/// back to the job that made them.
pub fn png(name: &str) -> IntakeFile {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(name.as_bytes());
    IntakeFile::new(name, bytes, "image/png")
}

pub fn metal_patina(patina: u8) -> GenerationConfig {
    GenerationConfig {
        material: Material::Metal {
            patina_intensity: Percentage::new(patina).unwrap(),
            variation: VariationTier::Standard,
        },
        ..GenerationConfig::default()
    }
}

pub struct Harness {
    pub studio: Arc<Studio>,
    pub cancel: CancellationToken,
    pub controller_task: tokio::task::JoinHandle<()>,
    pub persistence: Arc<dyn KeyValueStore>,
}

pub async fn harness(
    generator: Arc<ScriptedGenerator>,
    credential: Arc<FakeCredential>,
    queue: QueueConfig,
) -> Harness {
    harness_with_store(generator, credential, queue, Arc::new(MemoryStore::new())).await
}

pub async fn harness_with_store(
    generator: Arc<ScriptedGenerator>,
    credential: Arc<FakeCredential>,
    queue: QueueConfig,
    persistence: Arc<dyn KeyValueStore>,
) -> Harness {
    let studio = Studio::open(StudioParts {
        persistence: persistence.clone(),
        generator,
        credentials: credential,
        events: Arc::new(EventBus::default()),
        queue,
    })
    .await
    .unwrap();
    let studio = Arc::new(studio);
    let cancel = CancellationToken::new();
    let controller_task = studio.spawn(cancel.clone());
    Harness {
        studio,
        cancel,
        controller_task,
        persistence,
    }
}

/// Every event received so far.
pub fn drain(rx: &mut broadcast::Receiver<StudioEvent>) -> Vec<EventKind> {
    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.kind);
    }
    kinds
}

/// Wait for the first event matching `pred`.
pub async fn wait_for(
    rx: &mut broadcast::Receiver<StudioEvent>,
    pred: impl Fn(&EventKind) -> bool,
) -> EventKind {
    loop {
        let event = rx.recv().await.expect("event bus closed");
        if pred(&event.kind) {
            return event.kind;
        }
    }
}

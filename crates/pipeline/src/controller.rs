//! Single-flight queue controller.
//!
//! One long-lived Tokio task drains queued jobs oldest first, one at a
//! time. The controller reacts to three signals: the run/pause flag (a
//! `watch` channel), the work-available [`Notify`], and the shutdown
//! [`CancellationToken`]. Cancellation is observed between jobs; an
//! in-flight generation always runs to completion.
//!
//! The generation call has no timeout. A hung request keeps the in-flight
//! marker set until the transport gives up.

use std::sync::Arc;

use atelier_core::compiler::compile;
use atelier_core::failure::FailureClass;
use atelier_core::job::ImagePayload;
use atelier_core::job_store::JobStore;
use atelier_core::settings::GenerationConfig;
use atelier_core::types::JobId;
use atelier_events::{EventBus, EventKind, PauseReason};
use atelier_imagegen::{CredentialProvider, ImageGenerator};
use tokio::sync::{watch, Notify, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::QueueConfig;
use crate::preferences::PreferenceAggregator;

/// Banner shown when the queue cannot start for lack of a credential.
pub const CREDENTIAL_REQUIRED_BANNER: &str = "Select an API key to start generating.";

/// Whether the controller may dispatch work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
}

/// What one scan of the queue did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// A job was taken off the queue; scan again.
    Processed,
    /// Nothing to do, or dispatch is blocked; wait for a signal.
    Stopped,
}

/// Everything the controller needs to run one job, copied out of the
/// store so no lock is held across the generation call.
struct Dispatch {
    id: JobId,
    source: Option<ImagePayload>,
    config: GenerationConfig,
}

pub struct QueueController {
    store: Arc<RwLock<JobStore>>,
    generator: Arc<dyn ImageGenerator>,
    credentials: Arc<dyn CredentialProvider>,
    preferences: Arc<PreferenceAggregator>,
    events: Arc<EventBus>,
    config: QueueConfig,
    run_state: watch::Sender<RunState>,
    /// In-flight marker. `true` from dispatch until the job's outcome
    /// (and any rate-limit cooldown) has been handled.
    in_flight: watch::Sender<bool>,
    work: Notify,
}

impl QueueController {
    /// Create a paused controller.
    pub fn new(
        store: Arc<RwLock<JobStore>>,
        generator: Arc<dyn ImageGenerator>,
        credentials: Arc<dyn CredentialProvider>,
        preferences: Arc<PreferenceAggregator>,
        events: Arc<EventBus>,
        config: QueueConfig,
    ) -> Self {
        Self {
            store,
            generator,
            credentials,
            preferences,
            events,
            config,
            run_state: watch::Sender::new(RunState::Paused),
            in_flight: watch::Sender::new(false),
            work: Notify::new(),
        }
    }

    // ---- run / pause ----

    pub fn run_state(&self) -> RunState {
        *self.run_state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.run_state() == RunState::Running
    }

    pub fn is_in_flight(&self) -> bool {
        *self.in_flight.borrow()
    }

    pub fn subscribe_run_state(&self) -> watch::Receiver<RunState> {
        self.run_state.subscribe()
    }

    /// Switch to running and wake the loop.
    pub fn start(&self) {
        let changed = self.run_state.send_if_modified(|state| {
            let was_paused = *state == RunState::Paused;
            *state = RunState::Running;
            was_paused
        });
        if changed {
            tracing::info!("Queue started");
            self.events.publish(EventKind::QueueStarted);
        }
        self.notify_work();
    }

    /// Switch to paused. An in-flight generation is not aborted.
    pub fn pause(&self, reason: PauseReason) {
        let changed = self.run_state.send_if_modified(|state| {
            let was_running = *state == RunState::Running;
            *state = RunState::Paused;
            was_running
        });
        if changed {
            tracing::info!(reason = reason.as_str(), "Queue paused");
            self.events.publish(EventKind::QueuePaused { reason });
        }
    }

    /// Raise the work-available signal.
    pub fn notify_work(&self) {
        self.work.notify_one();
    }

    /// Resolve once the queue is paused with nothing in flight.
    pub async fn wait_until_idle(&self) {
        let mut state = self.run_state.subscribe();
        let mut in_flight = self.in_flight.subscribe();
        loop {
            let paused = *state.borrow_and_update() == RunState::Paused;
            let busy = *in_flight.borrow_and_update();
            if paused && !busy {
                return;
            }
            tokio::select! {
                _ = state.changed() => {}
                _ = in_flight.changed() => {}
            }
        }
    }

    // ---- loop ----

    /// Run until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut state = self.run_state.subscribe();
        tracing::info!(
            throttle_ms = self.config.throttle.as_millis() as u64,
            cooldown_ms = self.config.rate_limit_cooldown.as_millis() as u64,
            "Queue controller started",
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }
            state.borrow_and_update();

            if self.is_running() && self.scan().await == Scan::Processed {
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.work.notified() => {}
                _ = state.changed() => {}
            }
        }
        tracing::info!("Queue controller shutting down");
    }

    /// Take the in-flight marker, run one job, release the marker.
    async fn scan(&self) -> Scan {
        let acquired = self.in_flight.send_if_modified(|busy| {
            if *busy {
                false
            } else {
                *busy = true;
                true
            }
        });
        if !acquired {
            return Scan::Stopped;
        }

        let outcome = self.dispatch_next().await;
        self.in_flight.send_replace(false);
        outcome
    }

    async fn dispatch_next(&self) -> Scan {
        let next = {
            let store = self.store.read().await;
            store.next_queued().map(|job| Dispatch {
                id: job.id,
                source: job.source.clone(),
                config: job.config.clone(),
            })
        };
        let Some(job) = next else {
            self.pause(PauseReason::Idle);
            return Scan::Stopped;
        };

        if !self.credentials.has_valid_credential().await {
            tracing::warn!(job_id = %job.id, "No valid credential, pausing queue");
            self.events.publish(EventKind::Banner {
                message: CREDENTIAL_REQUIRED_BANNER.to_string(),
            });
            self.pause(PauseReason::CredentialRequired);
            return Scan::Stopped;
        }

        let Some(source) = job.source.filter(|s| !s.is_empty() && !s.media_type.is_empty())
        else {
            self.fail_missing_input(job.id).await;
            return Scan::Processed;
        };

        if let Err(e) = self.store.write().await.begin_generation(job.id) {
            // Removed or cleared between the read and the write.
            tracing::debug!(job_id = %job.id, error = %e, "Job no longer dispatchable");
            return Scan::Processed;
        }
        tracing::info!(job_id = %job.id, "Job generating");
        self.events.publish(EventKind::JobStarted { job_id: job.id });

        tokio::time::sleep(self.config.throttle).await;

        let profile = self.preferences.profile().await;
        let request = compile(&job.config, &profile);
        let outcome = self
            .generator
            .generate(&source.bytes, &source.media_type, &request)
            .await;

        match outcome {
            Ok(image) => {
                let applied = self.store.write().await.complete(job.id, image);
                if applied {
                    tracing::info!(job_id = %job.id, "Job completed");
                    self.events.publish(EventKind::JobCompleted { job_id: job.id });
                } else {
                    self.drop_result(job.id);
                }
            }
            Err(e) => {
                let class = e.failure_class();
                let message = e.to_string();
                let applied = self.store.write().await.fail(job.id, class, &message);
                if applied {
                    tracing::warn!(
                        job_id = %job.id,
                        class = class.as_str(),
                        error = %e,
                        "Job failed",
                    );
                    self.events.publish(EventKind::JobFailed {
                        job_id: job.id,
                        class,
                        message,
                    });
                } else {
                    self.drop_result(job.id);
                }
                self.apply_failure_policy(class).await;
            }
        }
        Scan::Processed
    }

    async fn apply_failure_policy(&self, class: FailureClass) {
        if let Some(message) = class.banner() {
            self.events.publish(EventKind::Banner {
                message: message.to_string(),
            });
        }
        match class {
            FailureClass::CredentialExpired => {
                self.credentials.invalidate().await;
                self.pause(PauseReason::CredentialExpired);
            }
            FailureClass::RateLimited => {
                tracing::warn!(
                    cooldown_ms = self.config.rate_limit_cooldown.as_millis() as u64,
                    "Rate limited, holding queue",
                );
                tokio::time::sleep(self.config.rate_limit_cooldown).await;
            }
            FailureClass::MissingInput | FailureClass::Generic => {}
        }
    }

    async fn fail_missing_input(&self, id: JobId) {
        let message = "Job has no source image";
        if self
            .store
            .write()
            .await
            .fail(id, FailureClass::MissingInput, message)
        {
            tracing::warn!(job_id = %id, "Job failed: missing input");
            self.events.publish(EventKind::JobFailed {
                job_id: id,
                class: FailureClass::MissingInput,
                message: message.to_string(),
            });
        }
    }

    fn drop_result(&self, id: JobId) {
        tracing::debug!(job_id = %id, "Result for unknown job dropped");
        self.events.publish(EventKind::ResultDropped { job_id: id });
    }
}

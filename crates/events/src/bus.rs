//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the studio facade,
//! the queue controller and any front-end listening for updates.

use atelier_core::failure::FailureClass;
use atelier_core::job::Rating;
use atelier_core::types::{JobId, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Why the queue stopped running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    /// The user asked for it.
    User,
    /// Nothing left to dispatch.
    Idle,
    /// No credential was available when a job was about to start.
    CredentialRequired,
    /// The service rejected the credential mid-run.
    CredentialExpired,
    /// The job history was cleared.
    Cleared,
}

impl PauseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PauseReason::User => "user",
            PauseReason::Idle => "idle",
            PauseReason::CredentialRequired => "credential_required",
            PauseReason::CredentialExpired => "credential_expired",
            PauseReason::Cleared => "cleared",
        }
    }
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    JobsSubmitted { job_ids: Vec<JobId> },
    JobStarted { job_id: JobId },
    JobCompleted { job_id: JobId },
    JobFailed {
        job_id: JobId,
        class: FailureClass,
        message: String,
    },
    JobResubmitted { job_id: JobId },
    JobRated { job_id: JobId, rating: Rating },
    JobRemoved { job_id: JobId },
    /// A generation finished for a job that is no longer in the store.
    ResultDropped { job_id: JobId },
    QueueStarted,
    QueuePaused { reason: PauseReason },
    HistoryCleared { removed: usize },
    SettingsUpdated,
    /// User-facing notice, e.g. an expired credential.
    Banner { message: String },
}

impl EventKind {
    /// Dot-separated event name, e.g. `"job.completed"`.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::JobsSubmitted { .. } => "job.submitted",
            EventKind::JobStarted { .. } => "job.started",
            EventKind::JobCompleted { .. } => "job.completed",
            EventKind::JobFailed { .. } => "job.failed",
            EventKind::JobResubmitted { .. } => "job.resubmitted",
            EventKind::JobRated { .. } => "job.rated",
            EventKind::JobRemoved { .. } => "job.removed",
            EventKind::ResultDropped { .. } => "job.result_dropped",
            EventKind::QueueStarted => "queue.started",
            EventKind::QueuePaused { .. } => "queue.paused",
            EventKind::HistoryCleared { .. } => "queue.cleared",
            EventKind::SettingsUpdated => "settings.updated",
            EventKind::Banner { .. } => "banner",
        }
    }
}

/// An event with the time it was published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioEvent {
    #[serde(flatten)]
    pub kind: EventKind,
    pub timestamp: Timestamp,
}

impl StudioEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

impl From<EventKind> for StudioEvent {
    fn from(kind: EventKind) -> Self {
        Self::new(kind)
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
pub const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// When the buffer is full the oldest unread events are dropped and slow
/// receivers observe `RecvError::Lagged`.
pub struct EventBus {
    sender: broadcast::Sender<StudioEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped silently when there
    /// are none.
    pub fn publish(&self, event: impl Into<StudioEvent>) {
        let _ = self.sender.send(event.into());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Job record model and lifecycle state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::failure::FailureClass;
use crate::settings::GenerationConfig;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a job.
///
/// `Queued -> Generating -> Completed | Failed`, and `Failed -> Queued`
/// on resubmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Generating,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Generating => "generating",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Counted against the queue capacity.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Generating)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Generating)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Generating, JobStatus::Completed)
                | (JobStatus::Generating, JobStatus::Failed)
                | (JobStatus::Failed, JobStatus::Queued)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Raw image bytes with their declared media type.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Image bytes are noise in logs.
impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// User rating of a generated result, `1..=5`.
pub type Rating = u8;

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One submitted photograph and everything known about its generation.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub filename: String,
    /// Raw upload. Purged once the job reaches a terminal state.
    pub source: Option<ImagePayload>,
    /// Display copy; survives purging so a failed job can be resubmitted.
    pub preview: ImagePayload,
    /// Settings captured at submission (or resubmission) time.
    pub config: GenerationConfig,
    pub status: JobStatus,
    pub result: Option<ImagePayload>,
    pub rating: Option<Rating>,
    pub error: Option<String>,
    pub failure_class: Option<FailureClass>,
    pub submitted_at: Timestamp,
    /// Insertion order; assigned by the store.
    pub sequence: u64,
}

impl Job {
    /// Build a fresh queued job from an accepted upload.
    pub fn new(filename: impl Into<String>, image: ImagePayload, config: GenerationConfig) -> Self {
        Self {
            id: JobId::new_v4(),
            filename: filename.into(),
            source: Some(image.clone()),
            preview: image,
            config,
            status: JobStatus::Queued,
            result: None,
            rating: None,
            error: None,
            failure_class: None,
            submitted_at: chrono::Utc::now(),
            sequence: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! In-memory job record store.
//!
//! The store is the single source of truth for job status. Display order
//! is newest first (submissions are prepended); dispatch order is oldest
//! first by insertion sequence.

use serde::Serialize;

use crate::error::CoreError;
use crate::failure::FailureClass;
use crate::job::{ImagePayload, Job, JobStatus, Rating};
use crate::preference::{validate_rating, RatingRecord};
use crate::settings::GenerationConfig;
use crate::types::JobId;

/// Maximum number of queued + generating jobs.
pub const DEFAULT_QUEUE_CAPACITY: usize = 30;

/// Per-status job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queued: usize,
    pub generating: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueStats {
    pub fn active(&self) -> usize {
        self.queued + self.generating
    }

    pub fn total(&self) -> usize {
        self.queued + self.generating + self.completed + self.failed
    }
}

/// Ordered collection of jobs with capacity enforcement.
#[derive(Debug)]
pub struct JobStore {
    jobs: Vec<Job>,
    capacity: usize,
    next_sequence: u64,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl JobStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            jobs: Vec::new(),
            capacity,
            next_sequence: 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs in display order (newest first).
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.status.is_active()).count()
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for job in &self.jobs {
            match job.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Generating => stats.generating += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Prepend a batch of new jobs.
    ///
    /// The whole batch is rejected, leaving the store untouched, when it
    /// would push the active count past capacity.
    pub fn submit(&mut self, jobs: Vec<Job>) -> Result<Vec<JobId>, CoreError> {
        self.ensure_capacity(jobs.len())?;

        let mut batch = jobs;
        for job in &mut batch {
            job.status = JobStatus::Queued;
            job.sequence = self.take_sequence();
        }
        let ids = batch.iter().map(|j| j.id).collect();

        batch.append(&mut self.jobs);
        self.jobs = batch;
        Ok(ids)
    }

    /// Oldest queued job by insertion sequence.
    pub fn next_queued(&self) -> Option<&Job> {
        self.jobs
            .iter()
            .filter(|j| j.status == JobStatus::Queued)
            .min_by_key(|j| j.sequence)
    }

    /// The job currently generating, if any.
    pub fn generating(&self) -> Option<&Job> {
        self.jobs.iter().find(|j| j.status == JobStatus::Generating)
    }

    /// Move a queued job to `generating`.
    ///
    /// Refused while any other job is generating.
    pub fn begin_generation(&mut self, id: JobId) -> Result<(), CoreError> {
        if let Some(current) = self.generating() {
            return Err(CoreError::Conflict(format!(
                "Job {} is already generating",
                current.id
            )));
        }
        let job = self.find_mut(id)?;
        if job.status != JobStatus::Queued {
            return Err(CoreError::Conflict(format!(
                "Job {id} is {} and cannot start generating",
                job.status
            )));
        }
        job.status = JobStatus::Generating;
        Ok(())
    }

    /// Set the status of one job.
    ///
    /// Returns `false` for an unknown id or an illegal transition; neither
    /// is an error because late results for cleared jobs are expected.
    /// Terminal statuses purge the source payload. Requeueing is refused
    /// here; it goes through [`resubmit`](Self::resubmit), which checks
    /// capacity and restores the source.
    pub fn update_status(
        &mut self,
        id: JobId,
        status: JobStatus,
        result: Option<ImagePayload>,
    ) -> bool {
        if status == JobStatus::Queued {
            return false;
        }
        if status == JobStatus::Generating && self.generating().is_some_and(|g| g.id != id) {
            return false;
        }
        let Some(job) = self.jobs.iter_mut().find(|j| j.id == id) else {
            return false;
        };
        if !job.status.can_transition_to(status) {
            return false;
        }

        job.status = status;
        match status {
            JobStatus::Completed => {
                job.result = result;
                job.source = None;
            }
            JobStatus::Failed => {
                job.result = None;
                job.source = None;
            }
            JobStatus::Queued | JobStatus::Generating => {}
        }
        true
    }

    /// Attach a result and mark the job completed.
    pub fn complete(&mut self, id: JobId, result: ImagePayload) -> bool {
        self.update_status(id, JobStatus::Completed, Some(result))
    }

    /// Mark the job failed and record why.
    pub fn fail(&mut self, id: JobId, class: FailureClass, message: impl Into<String>) -> bool {
        if !self.update_status(id, JobStatus::Failed, None) {
            return false;
        }
        if let Some(job) = self.jobs.iter_mut().find(|j| j.id == id) {
            job.error = Some(message.into());
            job.failure_class = Some(class);
        }
        true
    }

    /// Build the rating record for a completed job without applying it.
    pub fn rating_record(&self, id: JobId, rating: Rating) -> Result<RatingRecord, CoreError> {
        validate_rating(rating)?;
        let job = self.get(id).ok_or_else(|| not_found(id))?;
        if job.status != JobStatus::Completed {
            return Err(CoreError::Conflict(format!(
                "Only completed jobs can be rated; job {id} is {}",
                job.status
            )));
        }
        Ok(RatingRecord::new(id, rating, job.config.clone()))
    }

    /// Rate a completed job. Returns the record to hand to the
    /// preference aggregator.
    pub fn rate(&mut self, id: JobId, rating: Rating) -> Result<RatingRecord, CoreError> {
        let record = self.rating_record(id, rating)?;
        self.find_mut(id)?.rating = Some(rating);
        Ok(record)
    }

    /// Put a failed job back in the queue with the current settings.
    ///
    /// The source is rebuilt from the retained preview.
    pub fn resubmit(&mut self, id: JobId, config: GenerationConfig) -> Result<(), CoreError> {
        let status = self
            .get(id)
            .map(|j| j.status)
            .ok_or_else(|| not_found(id))?;
        if status != JobStatus::Failed {
            return Err(CoreError::Conflict(format!(
                "Only failed jobs can be resubmitted; job {id} is {status}"
            )));
        }
        self.ensure_capacity(1)?;

        let sequence = self.take_sequence();
        let job = self.find_mut(id)?;
        job.source = Some(job.preview.clone());
        job.config = config;
        job.status = JobStatus::Queued;
        job.result = None;
        job.rating = None;
        job.error = None;
        job.failure_class = None;
        job.submitted_at = chrono::Utc::now();
        job.sequence = sequence;
        Ok(())
    }

    /// Ids of all failed jobs, oldest first.
    pub fn failed_ids(&self) -> Vec<JobId> {
        let mut failed: Vec<&Job> = self
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Failed)
            .collect();
        failed.sort_by_key(|j| j.sequence);
        failed.into_iter().map(|j| j.id).collect()
    }

    /// Delete a single job. A generating job cannot be removed.
    pub fn remove(&mut self, id: JobId) -> Result<Job, CoreError> {
        let index = self
            .jobs
            .iter()
            .position(|j| j.id == id)
            .ok_or_else(|| not_found(id))?;
        if self.jobs[index].status == JobStatus::Generating {
            return Err(CoreError::Conflict(format!(
                "Job {id} is generating and cannot be removed"
            )));
        }
        Ok(self.jobs.remove(index))
    }

    /// Drop every job. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.jobs.len();
        self.jobs.clear();
        count
    }

    // ---- private helpers ----

    fn ensure_capacity(&self, requested: usize) -> Result<(), CoreError> {
        let active = self.active_count();
        if active + requested > self.capacity {
            return Err(CoreError::CapacityExceeded {
                active,
                requested,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    fn take_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    fn find_mut(&mut self, id: JobId) -> Result<&mut Job, CoreError> {
        self.jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| not_found(id))
    }
}

fn not_found(id: JobId) -> CoreError {
    CoreError::NotFound {
        entity: "job",
        id: id.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

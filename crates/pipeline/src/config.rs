use std::time::Duration;

use atelier_core::job_store::DEFAULT_QUEUE_CAPACITY;

/// Default pause between marking a job generating and calling the model.
pub const DEFAULT_THROTTLE: Duration = Duration::from_secs(1);

/// Default hold after a rate-limited failure.
pub const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(10);

/// Queue tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum queued + generating jobs.
    pub capacity: usize,
    pub throttle: Duration,
    pub rate_limit_cooldown: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            throttle: DEFAULT_THROTTLE,
            rate_limit_cooldown: DEFAULT_RATE_LIMIT_COOLDOWN,
        }
    }
}

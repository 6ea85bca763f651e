use std::path::PathBuf;
use std::time::Duration;

use atelier_imagegen::client::{DEFAULT_API_URL, DEFAULT_MODEL};
use atelier_pipeline::QueueConfig;

/// A malformed environment variable.
#[derive(Debug, thiserror::Error)]
#[error("{var} must be {expected}, got '{value}'")]
pub struct ConfigError {
    pub var: &'static str,
    pub expected: &'static str,
    pub value: String,
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub api_url: String,
    pub model: String,
    pub database_url: String,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub queue: QueueConfig,
    /// Name of a saved preset whose material is applied before submitting.
    pub preset: Option<String>,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                            | Default                     |
    /// |------------------------------------|-----------------------------|
    /// | `ATELIER_API_URL`                  | hosted model base URL       |
    /// | `ATELIER_MODEL`                    | default image model         |
    /// | `DATABASE_URL`                     | `sqlite://atelier.db`       |
    /// | `ATELIER_INPUT_DIR`                | `./input`                   |
    /// | `ATELIER_OUTPUT_DIR`               | `./output`                  |
    /// | `ATELIER_QUEUE_CAPACITY`           | `30`                        |
    /// | `ATELIER_THROTTLE_MS`              | `1000`                      |
    /// | `ATELIER_RATE_LIMIT_COOLDOWN_SECS` | `10`                        |
    /// | `ATELIER_PRESET`                   | unset                       |
    ///
    /// The API key itself (`ATELIER_API_KEY`) is read by the credential.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str, default: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let defaults = QueueConfig::default();

        let capacity: usize = parse(
            "ATELIER_QUEUE_CAPACITY",
            &get("ATELIER_QUEUE_CAPACITY", &defaults.capacity.to_string()),
            "a positive integer",
        )?;
        if capacity == 0 {
            return Err(ConfigError {
                var: "ATELIER_QUEUE_CAPACITY",
                expected: "a positive integer",
                value: "0".into(),
            });
        }
        let throttle_ms: u64 = parse(
            "ATELIER_THROTTLE_MS",
            &get(
                "ATELIER_THROTTLE_MS",
                &defaults.throttle.as_millis().to_string(),
            ),
            "a number of milliseconds",
        )?;
        let cooldown_secs: u64 = parse(
            "ATELIER_RATE_LIMIT_COOLDOWN_SECS",
            &get(
                "ATELIER_RATE_LIMIT_COOLDOWN_SECS",
                &defaults.rate_limit_cooldown.as_secs().to_string(),
            ),
            "a number of seconds",
        )?;

        Ok(Self {
            api_url: get("ATELIER_API_URL", DEFAULT_API_URL),
            model: get("ATELIER_MODEL", DEFAULT_MODEL),
            database_url: get("DATABASE_URL", "sqlite://atelier.db"),
            input_dir: PathBuf::from(get("ATELIER_INPUT_DIR", "./input")),
            output_dir: PathBuf::from(get("ATELIER_OUTPUT_DIR", "./output")),
            queue: QueueConfig {
                capacity,
                throttle: Duration::from_millis(throttle_ms),
                rate_limit_cooldown: Duration::from_secs(cooldown_secs),
            },
            preset: lookup("ATELIER_PRESET")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }
}

fn parse<T: std::str::FromStr>(
    var: &'static str,
    value: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError {
        var,
        expected,
        value: value.to_string(),
    })
}

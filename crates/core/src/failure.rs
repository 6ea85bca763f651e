//! Failure classification for generation errors.
//!
//! The queue controller decides its recovery policy from the class alone:
//! credential failures pause the queue, throttling holds the queue for a
//! cooldown, everything else lets the queue continue.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

/// Messages indicating the stored credential reference is no longer valid.
const CREDENTIAL_PATTERN: &str =
    r"(?i)requested entity was not found|api key not valid|api_key_invalid|invalid api key";

/// Messages indicating throttling or quota exhaustion.
const RATE_LIMIT_PATTERN: &str =
    r"(?i)\b429\b|resource_exhausted|quota|rate[ _-]?limit|too many requests";

static CREDENTIAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CREDENTIAL_PATTERN).expect("valid regex"));

static RATE_LIMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(RATE_LIMIT_PATTERN).expect("valid regex"));

/// HTTP status codes treated as an expired or revoked credential.
const CREDENTIAL_STATUSES: &[u16] = &[401, 403];

/// HTTP status code for throttling.
pub const RATE_LIMIT_STATUS: u16 = 429;

// ---------------------------------------------------------------------------
// FailureClass
// ---------------------------------------------------------------------------

/// Classification of a failed generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    CredentialExpired,
    RateLimited,
    MissingInput,
    Generic,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::CredentialExpired => "credential_expired",
            FailureClass::RateLimited => "rate_limited",
            FailureClass::MissingInput => "missing_input",
            FailureClass::Generic => "generic",
        }
    }

    /// Banner text shown to the user, if this class warrants one.
    pub fn banner(&self) -> Option<&'static str> {
        match self {
            FailureClass::CredentialExpired => Some(
                "Your API key is no longer valid. Select a key again before resuming the queue.",
            ),
            FailureClass::RateLimited => {
                Some("The image service is throttling requests. The queue will pause briefly.")
            }
            FailureClass::MissingInput | FailureClass::Generic => None,
        }
    }
}

/// Classify a failure from an optional HTTP status and its message.
///
/// Credential failures take precedence over throttling.
pub fn classify_failure(status: Option<u16>, message: &str) -> FailureClass {
    if CREDENTIAL_RE.is_match(message) || status.is_some_and(|s| CREDENTIAL_STATUSES.contains(&s))
    {
        return FailureClass::CredentialExpired;
    }
    if status == Some(RATE_LIMIT_STATUS) || RATE_LIMIT_RE.is_match(message) {
        return FailureClass::RateLimited;
    }
    FailureClass::Generic
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

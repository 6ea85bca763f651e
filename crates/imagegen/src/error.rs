use atelier_core::failure::{classify_failure, FailureClass};

/// Errors from a generation attempt.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Image API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response carried no image.
    #[error("No image in response: {0}")]
    EmptyResult(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The job had no source bytes or media type.
    #[error("Job has no source image")]
    MissingInput,

    #[error("No API key available")]
    MissingCredential,
}

impl GenerationError {
    /// HTTP status associated with the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            GenerationError::Http(e) => e.status().map(|s| s.as_u16()),
            GenerationError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Map onto the controller's recovery taxonomy.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            GenerationError::MissingCredential => FailureClass::CredentialExpired,
            GenerationError::MissingInput => FailureClass::MissingInput,
            GenerationError::EmptyResult(_) | GenerationError::MalformedResponse(_) => {
                FailureClass::Generic
            }
            GenerationError::Api { status, message } => classify_failure(Some(*status), message),
            GenerationError::Http(e) => classify_failure(self.status(), &e.to_string()),
        }
    }
}

/// Errors from acquiring a credential.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Environment variable {0} is not set")]
    NotConfigured(String),
}

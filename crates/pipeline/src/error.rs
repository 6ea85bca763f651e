use atelier_core::error::CoreError;
use atelier_imagegen::CredentialError;

/// Errors surfaced by [`Studio`](crate::Studio) operations.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Credential unavailable: {0}")]
    Credential(#[from] CredentialError),
}

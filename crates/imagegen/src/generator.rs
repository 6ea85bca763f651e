//! Seams between the queue controller and the outside world.

use async_trait::async_trait;
use atelier_core::compiler::GenerationRequest;
use atelier_core::job::ImagePayload;

use crate::error::{CredentialError, GenerationError};

/// Produces a relit image from a source image and a compiled request.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(
        &self,
        image: &[u8],
        media_type: &str,
        request: &GenerationRequest,
    ) -> Result<ImagePayload, GenerationError>;
}

/// Holds whatever authorises generation calls.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn has_valid_credential(&self) -> bool;

    /// Obtain a credential, possibly by asking the user.
    async fn acquire_credential(&self) -> Result<(), CredentialError>;

    /// Forget the cached validity after the service rejected it.
    async fn invalidate(&self);
}

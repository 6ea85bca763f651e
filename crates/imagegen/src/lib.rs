//! Collaborators that talk to the hosted image model.
//!
//! - [`ImageGenerator`] / [`CredentialProvider`]: the seams the queue
//!   controller depends on.
//! - [`GeminiClient`]: `generateContent` over HTTP via [`reqwest`].
//! - [`ApiKeyCredential`]: API key sourced from the environment.

pub mod client;
pub mod credential;
pub mod error;
pub mod generator;

pub use client::{ClientConfig, GeminiClient};
pub use credential::ApiKeyCredential;
pub use error::{CredentialError, GenerationError};
pub use generator::{CredentialProvider, ImageGenerator};

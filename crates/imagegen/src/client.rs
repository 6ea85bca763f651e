//! REST client for the hosted image model's `generateContent` endpoint.
//!
//! The source image travels base64-encoded as inline data next to the
//! compiled prompt; the response is scanned for the first inline image.

use std::sync::Arc;

use async_trait::async_trait;
use atelier_core::compiler::GenerationRequest;
use atelier_core::job::ImagePayload;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::credential::ApiKeyCredential;
use crate::error::GenerationError;
use crate::generator::ImageGenerator;

/// Default service base URL.
pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com";

/// Default image model.
pub const DEFAULT_MODEL: &str = "gemini-3-pro-image-preview";

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Endpoint settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL without trailing slash, e.g. `https://host`.
    pub api_url: String,
    pub model: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: RequestGenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    Inline {
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestGenerationConfig<'a> {
    response_modalities: [&'static str; 1],
    image_config: ImageConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig<'a> {
    aspect_ratio: &'a str,
    image_size: &'a str,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    status: Option<String>,
}

// ---------------------------------------------------------------------------
// Payload helpers
// ---------------------------------------------------------------------------

fn build_request_body<'a>(
    image: &[u8],
    media_type: &str,
    request: &'a GenerationRequest,
) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![RequestContent {
            parts: vec![
                RequestPart::Inline {
                    inline_data: InlineData {
                        mime_type: media_type.to_string(),
                        data: BASE64.encode(image),
                    },
                },
                RequestPart::Text {
                    text: &request.prompt,
                },
            ],
        }],
        generation_config: RequestGenerationConfig {
            response_modalities: ["IMAGE"],
            image_config: ImageConfig {
                aspect_ratio: request.aspect_ratio.as_str(),
                image_size: request.resolution.as_str(),
            },
        },
    }
}

/// First inline image in the response.
fn extract_image(response: GenerateContentResponse) -> Result<ImagePayload, GenerationError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GenerationError::EmptyResult(format!("prompt blocked: {reason}")));
    }

    let mut finish_reason = None;
    let mut text = None;
    for candidate in response.candidates {
        finish_reason = finish_reason.or(candidate.finish_reason);
        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        for part in parts {
            if let Some(inline) = part.inline_data {
                let bytes = BASE64.decode(inline.data.as_bytes()).map_err(|e| {
                    GenerationError::MalformedResponse(format!("invalid base64 image data: {e}"))
                })?;
                if bytes.is_empty() {
                    return Err(GenerationError::EmptyResult("image data was empty".into()));
                }
                return Ok(ImagePayload::new(bytes, inline.mime_type));
            }
            text = text.or(part.text);
        }
    }

    let detail = text
        .or(finish_reason)
        .unwrap_or_else(|| "no candidates".to_string());
    Err(GenerationError::EmptyResult(detail))
}

/// Build an API error from a non-2xx response body.
fn api_error(status: u16, body: &str) -> GenerationError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) => format!("{code}: {}", envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => body.trim().to_string(),
    };
    GenerationError::Api { status, message }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the hosted image model.
pub struct GeminiClient {
    client: reqwest::Client,
    config: ClientConfig,
    credential: Arc<ApiKeyCredential>,
}

impl GeminiClient {
    pub fn new(config: ClientConfig, credential: Arc<ApiKeyCredential>) -> Self {
        Self::with_client(reqwest::Client::new(), config, credential)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(
        client: reqwest::Client,
        config: ClientConfig,
        credential: Arc<ApiKeyCredential>,
    ) -> Self {
        Self {
            client,
            config,
            credential,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_url.trim_end_matches('/'),
            self.config.model
        )
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or an
    /// [`GenerationError::Api`] built from the status and body.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GenerationError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(api_error(status.as_u16(), &body));
        }
        Ok(response)
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate(
        &self,
        image: &[u8],
        media_type: &str,
        request: &GenerationRequest,
    ) -> Result<ImagePayload, GenerationError> {
        if image.is_empty() || media_type.is_empty() {
            return Err(GenerationError::MissingInput);
        }
        let key = self
            .credential
            .current_key()
            .await
            .ok_or(GenerationError::MissingCredential)?;

        tracing::debug!(
            model = %self.config.model,
            aspect_ratio = request.aspect_ratio.as_str(),
            resolution = request.resolution.as_str(),
            bytes = image.len(),
            "Calling generateContent"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, key)
            .json(&build_request_body(image, media_type, request))
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
        extract_image(parsed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

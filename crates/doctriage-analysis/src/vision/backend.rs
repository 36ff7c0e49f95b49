//! Provider backend abstraction.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use doctriage::http_client::HttpError;
use doctriage::models::{DocumentContent, PageImage};
use doctriage::rate_limit::is_rate_limit_message;
use doctriage::Provider;

/// Errors from provider calls.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("backend not available: {0}")]
    NotAvailable(String),

    #[error("rate limited by {provider}: {message}")]
    RateLimited { provider: Provider, message: String },

    #[error("{provider} API error ({status}): {message}")]
    Http {
        provider: Provider,
        status: u16,
        message: String,
    },

    #[error("{provider} API error: {message}")]
    Provider { provider: Provider, message: String },

    #[error("{0} returned no content")]
    EmptyResponse(Provider),

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

impl VisionError {
    /// Build the error for a non-success HTTP status.
    pub fn from_status(provider: Provider, status: u16, body: String) -> Self {
        if status == 429 || is_rate_limit_message(&body) {
            Self::RateLimited {
                provider,
                message: body,
            }
        } else {
            Self::Http {
                provider,
                status,
                message: body,
            }
        }
    }

    /// Build the error for an error payload inside a 200 response.
    pub fn from_message(provider: Provider, message: String) -> Self {
        if is_rate_limit_message(&message) {
            Self::RateLimited { provider, message }
        } else {
            Self::Provider { provider, message }
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_) | Self::NotAvailable(_))
    }
}

impl From<HttpError> for VisionError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Timeout => Self::Timeout,
            HttpError::Decode(msg) => Self::Decode(msg),
            HttpError::Transport(msg) | HttpError::Build(msg) => Self::Transport(msg),
        }
    }
}

/// Usage counts reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportedUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Normalized provider output.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    /// Generated text from a chat/vision model.
    Chat {
        text: String,
        reported_usage: Option<ReportedUsage>,
    },
    /// Per-page markdown from an OCR model.
    Ocr { pages: Vec<String> },
}

impl ProviderResponse {
    /// All text in the response; OCR pages joined by blank lines.
    pub fn text(&self) -> String {
        match self {
            Self::Chat { text, .. } => text.clone(),
            Self::Ocr { pages } => pages.join("\n\n"),
        }
    }
}

/// Placeholder in prompt templates replaced with the document text.
pub const DOCUMENT_PLACEHOLDER: &str = "{{DOCUMENT_TO_CLASSIFY}}";

/// One classification request.
#[derive(Debug, Clone, Copy)]
pub struct VisionRequest<'a> {
    pub system_prompt: &'a str,
    pub content: &'a DocumentContent,
    pub max_output_tokens: u32,
}

impl VisionRequest<'_> {
    pub fn validate(&self) -> Result<(), VisionError> {
        if self.system_prompt.trim().is_empty() {
            return Err(VisionError::InvalidRequest(
                "system prompt is empty".to_string(),
            ));
        }
        if self.content.is_empty() {
            return Err(VisionError::InvalidRequest(
                "document content is empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl<'a> VisionRequest<'a> {
    /// Instruction text with any document text substituted into the template,
    /// plus the document text that still has to be sent separately.
    pub fn prompt_parts(&self) -> (String, Option<&'a str>) {
        match self.content {
            DocumentContent::Text(text) if self.system_prompt.contains(DOCUMENT_PLACEHOLDER) => {
                (self.system_prompt.replace(DOCUMENT_PLACEHOLDER, text), None)
            }
            DocumentContent::Text(text) => (self.system_prompt.to_string(), Some(text.as_str())),
            DocumentContent::Images(_) => (self.system_prompt.to_string(), None),
        }
    }

    /// Page images attached to the request.
    pub fn images(&self) -> &'a [PageImage] {
        match self.content {
            DocumentContent::Images(images) => images,
            DocumentContent::Text(_) => &[],
        }
    }
}

/// A hosted model that classifies page images or text.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    fn provider(&self) -> Provider;

    fn model_name(&self) -> &str;

    /// Check if this backend has what it needs to make calls.
    fn is_available(&self) -> bool;

    /// Get a hint for how to make this backend available.
    fn availability_hint(&self) -> String;

    /// Make a single attempt. Retries are handled by the client.
    async fn complete(&self, request: &VisionRequest<'_>) -> Result<ProviderResponse, VisionError>;
}

/// A hosted OCR model that turns a whole PDF into page text.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    fn model_name(&self) -> &str;

    fn is_available(&self) -> bool;

    fn availability_hint(&self) -> String;

    /// OCR the first `max_pages` pages of `pdf_path` in a single attempt.
    async fn ocr(&self, pdf_path: &Path, max_pages: usize) -> Result<ProviderResponse, VisionError>;
}

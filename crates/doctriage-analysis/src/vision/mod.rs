//! Hosted model backends for document classification.
//!
//! Supported providers:
//! - Gemini: page images (or text) through `generateContent`
//! - Azure OpenAI: page images through chat completions
//! - Mistral: OCR of the whole PDF, classified afterwards by a Gemini text model

mod azure;
mod backend;
mod client;
mod gemini;
mod mistral;

pub use azure::AzureBackend;
pub use backend::{
    OcrBackend, ProviderResponse, ReportedUsage, VisionBackend, VisionError, VisionRequest,
    DOCUMENT_PLACEHOLDER,
};
pub use client::{CallFailure, Completion, OcrClient, VisionClient};
pub use gemini::GeminiBackend;
pub use mistral::MistralBackend;

use std::sync::Arc;
use std::time::Duration;

use doctriage::catalog::{self, ModelSpec};
use doctriage::config::ProvidersConfig;
use doctriage::Provider;

/// Build the backend that classifies with `spec`.
pub fn vision_backend(
    spec: &ModelSpec,
    providers: &ProvidersConfig,
    timeout: Duration,
) -> Result<Arc<dyn VisionBackend>, VisionError> {
    match spec.provider {
        Provider::Gemini => Ok(Arc::new(GeminiBackend::new(
            &providers.gemini,
            spec.name,
            timeout,
        )?)),
        Provider::Azure => Ok(Arc::new(AzureBackend::new(
            &providers.azure,
            spec.name,
            timeout,
        )?)),
        Provider::Mistral => Err(VisionError::InvalidRequest(format!(
            "{} is an OCR model and cannot classify on its own",
            spec.name
        ))),
    }
}

/// Build the OCR backend for a page-billed model.
pub fn ocr_backend(
    spec: &ModelSpec,
    providers: &ProvidersConfig,
    timeout: Duration,
) -> Result<Arc<dyn OcrBackend>, VisionError> {
    match spec.provider {
        Provider::Mistral => Ok(Arc::new(MistralBackend::new(
            &providers.mistral,
            spec.name,
            timeout,
        )?)),
        other => Err(VisionError::InvalidRequest(format!(
            "{} ({}) is not an OCR model",
            spec.name, other
        ))),
    }
}

/// The text model that classifies OCR output of `spec`, if any.
pub fn text_classifier(spec: &ModelSpec) -> Option<&'static ModelSpec> {
    spec.text_classifier.and_then(catalog::lookup)
}

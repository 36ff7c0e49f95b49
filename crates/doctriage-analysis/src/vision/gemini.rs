//! Google Gemini `generateContent` backend.
//!
//! Sends the instruction text and the rendered pages as inline PNG parts in a
//! single user turn. Requires `GOOGLE_API_KEY` (or `GEMINI_API_KEY`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use doctriage::config::GeminiConfig;
use doctriage::http_client::HttpClient;
use doctriage::Provider;

use super::backend::{ProviderResponse, VisionBackend, VisionError, VisionRequest};

const API_KEY_HINT: &str =
    "GOOGLE_API_KEY not set. Get an API key from https://ai.google.dev/";

/// Gemini backend for one model.
pub struct GeminiBackend {
    client: HttpClient,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GeminiPromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

impl GeminiBackend {
    pub fn new(config: &GeminiConfig, model: &str, timeout: Duration) -> Result<Self, VisionError> {
        Ok(Self {
            client: HttpClient::new("gemini", timeout)?,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn endpoint(&self, api_key: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        )
    }
}

fn build_request(request: &VisionRequest<'_>) -> GeminiRequest {
    let (prompt, document_text) = request.prompt_parts();
    let text = match document_text {
        Some(doc) => format!("{}\n\n{}", prompt, doc),
        None => prompt,
    };

    let mut parts = vec![GeminiPart::Text { text }];
    parts.extend(request.images().iter().map(|image| GeminiPart::InlineData {
        inline_data: GeminiInlineData {
            mime_type: image.mime_type.clone(),
            data: image.data_base64.clone(),
        },
    }));

    GeminiRequest {
        contents: vec![GeminiContent {
            role: "user",
            parts,
        }],
        generation_config: GeminiGenerationConfig {
            temperature: 0.0,
            top_p: 0.95,
            max_output_tokens: request.max_output_tokens,
        },
    }
}

fn parse_response(response: GeminiResponse) -> Result<ProviderResponse, VisionError> {
    if let Some(error) = response.error {
        return Err(VisionError::from_message(Provider::Gemini, error.message));
    }

    let candidate = match response.candidates.and_then(|c| c.into_iter().next()) {
        Some(candidate) => candidate,
        None => {
            if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
                return Err(VisionError::Provider {
                    provider: Provider::Gemini,
                    message: format!("prompt blocked: {}", reason),
                });
            }
            return Err(VisionError::EmptyResponse(Provider::Gemini));
        }
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        if let Some(reason) = candidate.finish_reason.filter(|r| r != "STOP") {
            return Err(VisionError::Provider {
                provider: Provider::Gemini,
                message: format!("generation stopped: {}", reason),
            });
        }
        return Err(VisionError::EmptyResponse(Provider::Gemini));
    }

    // Gemini usage is estimated from the request rather than read back.
    Ok(ProviderResponse::Chat {
        text,
        reported_usage: None,
    })
}

#[async_trait]
impl VisionBackend for GeminiBackend {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn availability_hint(&self) -> String {
        if self.api_key.is_none() {
            API_KEY_HINT.to_string()
        } else {
            format!("Gemini is available (model: {})", self.model)
        }
    }

    async fn complete(&self, request: &VisionRequest<'_>) -> Result<ProviderResponse, VisionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| VisionError::NotAvailable(API_KEY_HINT.to_string()))?;
        request.validate()?;

        let body = build_request(request);
        let response = self
            .client
            .post_json(&self.endpoint(api_key), &body, &[])
            .await?;

        if !response.is_success() {
            let status = response.status.as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::from_status(Provider::Gemini, status, body));
        }

        let parsed: GeminiResponse = response.json().await?;
        parse_response(parsed)
    }
}

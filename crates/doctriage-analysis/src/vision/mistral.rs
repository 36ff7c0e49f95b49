//! Mistral OCR backend.
//!
//! Uploads the PDF, asks for a signed URL, then runs OCR on that URL. Only the
//! first `max_pages` pages of the result are kept.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use doctriage::config::MistralConfig;
use doctriage::http_client::{HttpClient, HttpResponse};
use doctriage::Provider;

use super::backend::{OcrBackend, ProviderResponse, VisionError};

const API_KEY_HINT: &str = "MISTRAL_API_KEY not set. Create a key at https://console.mistral.ai/";

/// Mistral OCR backend.
pub struct MistralBackend {
    client: HttpClient,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    model: &'a str,
    document: OcrDocument<'a>,
}

#[derive(Debug, Serialize)]
struct OcrDocument<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    document_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    pages: Vec<OcrPage>,
}

#[derive(Debug, Deserialize)]
struct OcrPage {
    index: u32,
    #[serde(default)]
    markdown: String,
}

impl MistralBackend {
    pub fn new(config: &MistralConfig, model: &str, timeout: Duration) -> Result<Self, VisionError> {
        Ok(Self {
            client: HttpClient::new("mistral-ocr", timeout)?,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    async fn upload(&self, auth: &str, pdf_path: &Path) -> Result<String, VisionError> {
        let bytes = tokio::fs::read(pdf_path)
            .await
            .map_err(|e| VisionError::InvalidRequest(format!("{}: {}", pdf_path.display(), e)))?;
        let file_name = pdf_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")
            .map_err(|e| VisionError::InvalidRequest(e.to_string()))?;
        let form = Form::new().text("purpose", "ocr").part("file", part);

        let url = format!("{}/v1/files", self.base_url);
        let response = self
            .client
            .post_multipart(&url, form, &[("Authorization", auth)])
            .await?;
        let uploaded: UploadedFile = checked(response).await?.json().await?;
        Ok(uploaded.id)
    }

    async fn signed_url(&self, auth: &str, file_id: &str) -> Result<String, VisionError> {
        let url = format!("{}/v1/files/{}/url?expiry=24", self.base_url, file_id);
        let response = self.client.get(&url, &[("Authorization", auth)]).await?;
        let signed: SignedUrl = checked(response).await?.json().await?;
        Ok(signed.url)
    }

    async fn process(&self, auth: &str, document_url: &str) -> Result<OcrResponse, VisionError> {
        let body = OcrRequest {
            model: &self.model,
            document: OcrDocument {
                kind: "document_url",
                document_url,
            },
        };
        let url = format!("{}/v1/ocr", self.base_url);
        let response = self
            .client
            .post_json(&url, &body, &[("Authorization", auth)])
            .await?;
        Ok(checked(response).await?.json().await?)
    }
}

async fn checked(response: HttpResponse) -> Result<HttpResponse, VisionError> {
    if response.is_success() {
        return Ok(response);
    }
    let status = response.status.as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(VisionError::from_status(Provider::Mistral, status, body))
}

/// Keep the first `max_pages` pages in page order.
fn first_pages(mut pages: Vec<OcrPage>, max_pages: usize) -> Vec<String> {
    pages.sort_by_key(|p| p.index);
    pages
        .into_iter()
        .take(max_pages)
        .map(|p| p.markdown)
        .collect()
}

#[async_trait]
impl OcrBackend for MistralBackend {
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
            format!("Mistral OCR is available (model: {})", self.model)
        }
    }

    async fn ocr(&self, pdf_path: &Path, max_pages: usize) -> Result<ProviderResponse, VisionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| VisionError::NotAvailable(API_KEY_HINT.to_string()))?;
        if max_pages == 0 {
            return Err(VisionError::InvalidRequest(
                "page limit must be at least 1".to_string(),
            ));
        }
        let auth = format!("Bearer {}", api_key);

        let file_id = self.upload(&auth, pdf_path).await?;
        tracing::debug!("Uploaded {} as {}", pdf_path.display(), file_id);
        let document_url = self.signed_url(&auth, &file_id).await?;
        let response = self.process(&auth, &document_url).await?;

        let pages = first_pages(response.pages, max_pages);
        if pages.iter().all(|p| p.trim().is_empty()) {
            return Err(VisionError::EmptyResponse(Provider::Mistral));
        }
        Ok(ProviderResponse::Ocr { pages })
    }
}

//! Azure OpenAI chat completions backend.
//!
//! The prompt template goes in the system message; the pages go in the user
//! message as `image_url` parts carrying data URLs. Azure reports exact token
//! usage, which is used instead of the estimate.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use doctriage::config::AzureConfig;
use doctriage::http_client::HttpClient;
use doctriage::Provider;

use super::backend::{ProviderResponse, ReportedUsage, VisionBackend, VisionError, VisionRequest};

const USER_INSTRUCTION: &str = "Please analyze this document and provide its classification.";

/// Azure OpenAI backend bound to one deployment.
pub struct AzureBackend {
    client: HttpClient,
    api_key: Option<String>,
    endpoint: Option<String>,
    deployment: Option<String>,
    api_version: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    error: Option<ChatError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ChatError {
    message: String,
}

impl AzureBackend {
    pub fn new(config: &AzureConfig, model: &str, timeout: Duration) -> Result<Self, VisionError> {
        Ok(Self {
            client: HttpClient::new("azure-openai", timeout)?,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            endpoint: config
                .endpoint
                .as_deref()
                .map(|e| e.trim_end_matches('/').to_string()),
            deployment: config.deployment_for(model).map(String::from),
            api_version: config.api_version.clone(),
            model: model.to_string(),
        })
    }

    fn missing_setting(&self) -> Option<&'static str> {
        if self.api_key.is_none() {
            Some("AZURE_OPENAI_API_KEY")
        } else if self.endpoint.is_none() {
            Some("AZURE_OPENAI_ENDPOINT")
        } else if self.deployment.is_none() {
            Some(if self.model.eq_ignore_ascii_case("gpt-4o-mini") {
                "AZURE_OPENAI_GPT_4o_MINI_DEPLOYMENT_NAME"
            } else {
                "AZURE_OPENAI_DEPLOYMENT_NAME"
            })
        } else {
            None
        }
    }

    fn url(&self, endpoint: &str, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint, deployment, self.api_version
        )
    }
}

fn build_request(request: &VisionRequest<'_>) -> ChatRequest {
    let (prompt, document_text) = request.prompt_parts();
    let images = request.images();

    let user = if images.is_empty() {
        MessageContent::Text(document_text.unwrap_or(USER_INSTRUCTION).to_string())
    } else {
        let mut parts = vec![ContentPart::Text {
            text: USER_INSTRUCTION.to_string(),
        }];
        parts.extend(images.iter().map(|image| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:{};base64,{}", image.mime_type, image.data_base64),
            },
        }));
        MessageContent::Parts(parts)
    };

    ChatRequest {
        messages: vec![
            ChatMessage {
                role: "system",
                content: MessageContent::Text(prompt),
            },
            ChatMessage {
                role: "user",
                content: user,
            },
        ],
        max_tokens: request.max_output_tokens,
        temperature: 0.0,
        top_p: 0.95,
    }
}

fn parse_response(response: ChatResponse) -> Result<ProviderResponse, VisionError> {
    if let Some(error) = response.error {
        return Err(VisionError::from_message(Provider::Azure, error.message));
    }

    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|t| !t.trim().is_empty())
        .ok_or(VisionError::EmptyResponse(Provider::Azure))?;

    Ok(ProviderResponse::Chat {
        text,
        reported_usage: response.usage.map(|u| ReportedUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }),
    })
}

#[async_trait]
impl VisionBackend for AzureBackend {
    fn provider(&self) -> Provider {
        Provider::Azure
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        self.missing_setting().is_none()
    }

    fn availability_hint(&self) -> String {
        match self.missing_setting() {
            Some(var) => format!("{} not set", var),
            None => format!(
                "Azure OpenAI is available (model: {}, deployment: {})",
                self.model,
                self.deployment.as_deref().unwrap_or_default()
            ),
        }
    }

    async fn complete(&self, request: &VisionRequest<'_>) -> Result<ProviderResponse, VisionError> {
        let (Some(api_key), Some(endpoint), Some(deployment)) = (
            self.api_key.as_deref(),
            self.endpoint.as_deref(),
            self.deployment.as_deref(),
        ) else {
            return Err(VisionError::NotAvailable(self.availability_hint()));
        };
        request.validate()?;

        let body = build_request(request);
        let response = self
            .client
            .post_json(&self.url(endpoint, deployment), &body, &[("api-key", api_key)])
            .await?;

        if !response.is_success() {
            let status = response.status.as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::from_status(Provider::Azure, status, body));
        }

        let parsed: ChatResponse = response.json().await?;
        parse_response(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctriage::models::{DocumentContent, PageImage};

    fn config() -> AzureConfig {
        AzureConfig {
            api_key: Some("k".to_string()),
            endpoint: Some("https://example.openai.azure.com/".to_string()),
            deployment: Some("gpt4o-prod".to_string()),
            mini_deployment: None,
            api_version: "2024-02-15-preview".to_string(),
        }
    }

    #[test]
    fn test_request_shape_with_images() {
        let content = DocumentContent::Images(vec![PageImage::png(1, "AAAA".to_string())]);
        let request = VisionRequest {
            system_prompt: "You classify shipping documents.",
            content: &content,
            max_output_tokens: 4000,
        };
        let json = serde_json::to_value(build_request(&request)).unwrap();

        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "You classify shipping documents.");
        let parts = &json["messages"][1]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,AAAA");
        assert_eq!(json["max_tokens"], 4000);
        assert_eq!(json["temperature"], 0.0);
    }

    #[test]
    fn test_text_document_goes_in_user_message() {
        let content = DocumentContent::Text("PACKING LIST".to_string());
        let request = VisionRequest {
            system_prompt: "Classify.",
            content: &content,
            max_output_tokens: 50,
        };
        let json = serde_json::to_value(build_request(&request)).unwrap();
        assert_eq!(json["messages"][1]["content"], "PACKING LIST");
    }

    #[test]
    fn test_parse_reported_usage() {
        let raw = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Final Classification: INVOICE"}}],
            "usage": {"prompt_tokens": 1800, "completion_tokens": 120, "total_tokens": 1920}
        }"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        match parse_response(response).unwrap() {
            ProviderResponse::Chat {
                text,
                reported_usage,
            } => {
                assert_eq!(text, "Final Classification: INVOICE");
                assert_eq!(
                    reported_usage,
                    Some(ReportedUsage {
                        input_tokens: 1800,
                        output_tokens: 120
                    })
                );
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_and_empty() {
        let raw = r#"{"error": {"code": "429", "message": "Rate limit is exceeded. Try again in 7 seconds."}}"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        assert!(parse_response(response).unwrap_err().is_rate_limited());

        let raw = r#"{"choices": [{"message": {"content": null}}]}"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            parse_response(response),
            Err(VisionError::EmptyResponse(Provider::Azure))
        ));
    }

    #[test]
    fn test_deployment_per_model() {
        let backend = AzureBackend::new(&config(), "gpt-4o", Duration::from_secs(5)).unwrap();
        assert!(backend.is_available());
        assert_eq!(
            backend.url("https://example.openai.azure.com", "gpt4o-prod"),
            "https://example.openai.azure.com/openai/deployments/gpt4o-prod/chat/completions?api-version=2024-02-15-preview"
        );

        let mini = AzureBackend::new(&config(), "gpt-4o-mini", Duration::from_secs(5)).unwrap();
        assert!(!mini.is_available());
        assert!(mini
            .availability_hint()
            .contains("AZURE_OPENAI_GPT_4o_MINI_DEPLOYMENT_NAME"));
    }
}

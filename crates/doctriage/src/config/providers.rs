//! Provider credentials and endpoints.

use serde::{Deserialize, Serialize};

use super::{env_string, ConfigError};
use crate::catalog::{self, ModelSpec, Provider};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MISTRAL_BASE_URL: &str = "https://api.mistral.ai";
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";

/// Google Gemini settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

fn default_gemini_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_gemini_base_url(),
        }
        .with_env_overrides()
    }
}

impl GeminiConfig {
    /// `GOOGLE_API_KEY` (or `GEMINI_API_KEY`) and `GEMINI_BASE_URL`.
    pub fn with_overrides_from<F>(mut self, lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GOOGLE_API_KEY").or_else(|| lookup("GEMINI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup("GEMINI_BASE_URL") {
            self.base_url = url;
        }
        self
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(&env_string)
    }
}

/// Azure OpenAI settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Deployment serving gpt-4o
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
    /// Deployment serving gpt-4o-mini
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mini_deployment: Option<String>,
    #[serde(default = "default_azure_api_version")]
    pub api_version: String,
}

fn default_azure_api_version() -> String {
    DEFAULT_AZURE_API_VERSION.to_string()
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            deployment: None,
            mini_deployment: None,
            api_version: default_azure_api_version(),
        }
        .with_env_overrides()
    }
}

impl AzureConfig {
    /// Supported env vars:
    /// - `AZURE_OPENAI_API_KEY`
    /// - `AZURE_OPENAI_ENDPOINT`
    /// - `AZURE_OPENAI_DEPLOYMENT_NAME`
    /// - `AZURE_OPENAI_GPT_4o_MINI_DEPLOYMENT_NAME`
    /// - `AZURE_OPENAI_API_VERSION`
    pub fn with_overrides_from<F>(mut self, lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("AZURE_OPENAI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(endpoint) = lookup("AZURE_OPENAI_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
        if let Some(name) = lookup("AZURE_OPENAI_DEPLOYMENT_NAME") {
            self.deployment = Some(name);
        }
        if let Some(name) = lookup("AZURE_OPENAI_GPT_4o_MINI_DEPLOYMENT_NAME") {
            self.mini_deployment = Some(name);
        }
        if let Some(version) = lookup("AZURE_OPENAI_API_VERSION") {
            self.api_version = version;
        }
        self
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(&env_string)
    }

    /// Deployment name serving `model`.
    pub fn deployment_for(&self, model: &str) -> Option<&str> {
        if model.eq_ignore_ascii_case("gpt-4o-mini") {
            self.mini_deployment.as_deref()
        } else {
            self.deployment.as_deref()
        }
    }
}

/// Mistral OCR settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MistralConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_mistral_base_url")]
    pub base_url: String,
}

fn default_mistral_base_url() -> String {
    DEFAULT_MISTRAL_BASE_URL.to_string()
}

impl Default for MistralConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_mistral_base_url(),
        }
        .with_env_overrides()
    }
}

impl MistralConfig {
    /// `MISTRAL_API_KEY` and `MISTRAL_BASE_URL`.
    pub fn with_overrides_from<F>(mut self, lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("MISTRAL_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup("MISTRAL_BASE_URL") {
            self.base_url = url;
        }
        self
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(&env_string)
    }
}

/// All provider settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub azure: AzureConfig,
    #[serde(default)]
    pub mistral: MistralConfig,
}

impl ProvidersConfig {
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(&env_string)
    }

    pub fn with_overrides_from<F>(self, lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            gemini: self.gemini.with_overrides_from(lookup),
            azure: self.azure.with_overrides_from(lookup),
            mistral: self.mistral.with_overrides_from(lookup),
        }
    }

    /// Verify that every credential the model needs is present.
    pub fn check_credentials(&self, spec: &ModelSpec) -> Result<(), ConfigError> {
        match spec.provider {
            Provider::Gemini => require(&self.gemini.api_key, "GOOGLE_API_KEY"),
            Provider::Azure => {
                require(&self.azure.api_key, "AZURE_OPENAI_API_KEY")?;
                require(&self.azure.endpoint, "AZURE_OPENAI_ENDPOINT")?;
                if self.azure.deployment_for(spec.name).is_none() {
                    let var = if spec.name == "gpt-4o-mini" {
                        "AZURE_OPENAI_GPT_4o_MINI_DEPLOYMENT_NAME"
                    } else {
                        "AZURE_OPENAI_DEPLOYMENT_NAME"
                    };
                    return Err(ConfigError::MissingKey(var.to_string()));
                }
                Ok(())
            }
            Provider::Mistral => {
                require(&self.mistral.api_key, "MISTRAL_API_KEY")?;
                match spec.text_classifier.and_then(catalog::lookup) {
                    Some(classifier) => self.check_credentials(classifier),
                    None => Ok(()),
                }
            }
        }
    }
}

fn require(value: &Option<String>, name: &str) -> Result<(), ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(ConfigError::MissingKey(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn empty() -> ProvidersConfig {
        ProvidersConfig {
            gemini: GeminiConfig {
                api_key: None,
                base_url: default_gemini_base_url(),
            },
            azure: AzureConfig {
                api_key: None,
                endpoint: None,
                deployment: None,
                mini_deployment: None,
                api_version: default_azure_api_version(),
            },
            mistral: MistralConfig {
                api_key: None,
                base_url: default_mistral_base_url(),
            },
        }
    }

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_gemini_key_alias() {
        let config = empty().with_overrides_from(&lookup(&[("GEMINI_API_KEY", "g-key")]));
        assert_eq!(config.gemini.api_key.as_deref(), Some("g-key"));

        let config = empty().with_overrides_from(&lookup(&[
            ("GEMINI_API_KEY", "alias"),
            ("GOOGLE_API_KEY", "primary"),
        ]));
        assert_eq!(config.gemini.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn test_azure_deployment_per_model() {
        let config = empty().with_overrides_from(&lookup(&[
            ("AZURE_OPENAI_DEPLOYMENT_NAME", "gpt4o-prod"),
            ("AZURE_OPENAI_GPT_4o_MINI_DEPLOYMENT_NAME", "gpt4o-mini-prod"),
        ]));
        assert_eq!(config.azure.deployment_for("gpt-4o"), Some("gpt4o-prod"));
        assert_eq!(
            config.azure.deployment_for("gpt-4o-mini"),
            Some("gpt4o-mini-prod")
        );
        assert_eq!(config.azure.api_version, DEFAULT_AZURE_API_VERSION);
    }

    #[test]
    fn test_missing_gemini_key() {
        let spec = catalog::lookup("gemini-2.0-flash").unwrap();
        let err = empty().check_credentials(spec).unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn test_mistral_needs_classifier_key() {
        let spec = catalog::lookup("mistral-ocr-latest").unwrap();
        let config = empty().with_overrides_from(&lookup(&[("MISTRAL_API_KEY", "m")]));
        let err = config.check_credentials(spec).unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));

        let config = config.with_overrides_from(&lookup(&[("GOOGLE_API_KEY", "g")]));
        assert!(config.check_credentials(spec).is_ok());
    }

    #[test]
    fn test_azure_requires_deployment() {
        let spec = catalog::lookup("gpt-4o-mini").unwrap();
        let config = empty().with_overrides_from(&lookup(&[
            ("AZURE_OPENAI_API_KEY", "k"),
            ("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com"),
            ("AZURE_OPENAI_DEPLOYMENT_NAME", "gpt4o"),
        ]));
        let err = config.check_credentials(spec).unwrap_err();
        assert!(err
            .to_string()
            .contains("AZURE_OPENAI_GPT_4o_MINI_DEPLOYMENT_NAME"));
    }
}

//! Supported classification models and the provider that serves each one.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pricing::Pricing;

/// Hosted API family a model belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Gemini `generateContent` API.
    Gemini,
    /// Azure OpenAI chat completions deployment.
    Azure,
    /// Mistral OCR, followed by a Gemini text classification.
    Mistral,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Azure => "azure",
            Self::Mistral => "mistral",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Some(Self::Gemini),
            "azure" | "openai" | "azure-openai" => Some(Self::Azure),
            "mistral" | "mistral-ocr" => Some(Self::Mistral),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of one model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSpec {
    pub name: &'static str,
    pub provider: Provider,
    pub pricing: Pricing,
    /// Whether the model accepts page images directly.
    pub vision: bool,
    /// Model used to classify OCR text when this model only extracts text.
    pub text_classifier: Option<&'static str>,
}

/// Model used when neither config nor environment choose one.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Gemini model that classifies Mistral OCR output.
pub const OCR_TEXT_CLASSIFIER: &str = "gemini-1.5-flash";

const GEMINI_FLASH_PRICING: Pricing = Pricing::Tokens {
    input_per_1k: 0.000035,
    output_per_1k: 0.000070,
};

pub const MODELS: &[ModelSpec] = &[
    ModelSpec {
        name: "gemini-1.5-flash",
        provider: Provider::Gemini,
        pricing: GEMINI_FLASH_PRICING,
        vision: true,
        text_classifier: None,
    },
    ModelSpec {
        name: "gemini-2.0-flash",
        provider: Provider::Gemini,
        pricing: GEMINI_FLASH_PRICING,
        vision: true,
        text_classifier: None,
    },
    ModelSpec {
        name: "gemini-2.0-flash-lite",
        provider: Provider::Gemini,
        pricing: GEMINI_FLASH_PRICING,
        vision: true,
        text_classifier: None,
    },
    ModelSpec {
        name: "gpt-4o",
        provider: Provider::Azure,
        pricing: Pricing::Tokens {
            input_per_1k: 0.005,
            output_per_1k: 0.015,
        },
        vision: true,
        text_classifier: None,
    },
    ModelSpec {
        name: "gpt-4o-mini",
        provider: Provider::Azure,
        pricing: Pricing::Tokens {
            input_per_1k: 0.00015,
            output_per_1k: 0.0006,
        },
        vision: true,
        text_classifier: None,
    },
    ModelSpec {
        name: "mistral-ocr-latest",
        provider: Provider::Mistral,
        pricing: Pricing::Pages { per_page: 0.000105 },
        vision: false,
        text_classifier: Some(OCR_TEXT_CLASSIFIER),
    },
];

/// Look up a model by name (case-insensitive).
pub fn lookup(name: &str) -> Option<&'static ModelSpec> {
    let name = name.trim();
    MODELS.iter().find(|m| m.name.eq_ignore_ascii_case(name))
}

/// Names of all models served by a provider.
pub fn models_for(provider: Provider) -> impl Iterator<Item = &'static ModelSpec> {
    MODELS.iter().filter(move |m| m.provider == provider)
}

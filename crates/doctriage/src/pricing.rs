//! Token estimation and cost calculation.
//!
//! Costs are estimates derived from a static price table. Providers that report
//! exact token usage (Azure) replace the estimated counts, but the prices
//! themselves are always list prices and every output labels cost as estimated.

use serde::{Deserialize, Serialize};

/// Tokens charged per attached page image.
pub const IMAGE_TOKENS: u64 = 1024;

/// Characters per token in the rough estimate.
const CHARS_PER_TOKEN: usize = 4;

/// Price schedule of one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum Pricing {
    /// USD per 1000 input and output tokens.
    Tokens { input_per_1k: f64, output_per_1k: f64 },
    /// USD per processed page.
    Pages { per_page: f64 },
}

impl Pricing {
    /// Cost of a token-billed call. Page-billed models return 0.
    pub fn token_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        match self {
            Self::Tokens {
                input_per_1k,
                output_per_1k,
            } => {
                (input_tokens as f64 / 1000.0) * input_per_1k
                    + (output_tokens as f64 / 1000.0) * output_per_1k
            }
            Self::Pages { .. } => 0.0,
        }
    }

    /// Cost of a page-billed call. Token-billed models return 0.
    pub fn page_cost(&self, pages: u64) -> f64 {
        match self {
            Self::Pages { per_page } => pages as f64 * per_page,
            Self::Tokens { .. } => 0.0,
        }
    }
}

/// Rough token count of a piece of text.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() / CHARS_PER_TOKEN) as u64
}

/// Input token estimate for a prompt plus attachments.
pub fn estimate_input_tokens(prompt: &str, text: Option<&str>, images: usize) -> u64 {
    estimate_tokens(prompt) + text.map(estimate_tokens).unwrap_or(0) + images as u64 * IMAGE_TOKENS
}

/// Token counts for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    pub input: u64,
    pub output: u64,
    pub total: u64,
    /// False when the provider reported exact usage.
    #[serde(default = "default_estimated")]
    pub estimated: bool,
}

fn default_estimated() -> bool {
    true
}

impl TokenCounts {
    pub fn estimated(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            total: input + output,
            estimated: true,
        }
    }

    pub fn reported(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            total: input + output,
            estimated: false,
        }
    }
}

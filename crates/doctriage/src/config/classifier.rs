//! Model selection and run limits.

use serde::{Deserialize, Serialize};

use super::{env_string, parse_value};
use crate::catalog::DEFAULT_MODEL;
use crate::http_client::DEFAULT_TIMEOUT_SECS;
use crate::rate_limit::{DEFAULT_MAX_RETRIES, DEFAULT_PARALLEL};

/// Settings controlling what is sent to the model and how often.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Model name from the catalog
    #[serde(default = "default_model")]
    pub model: String,
    /// Pages rendered per document
    #[serde(default = "default_pages_no")]
    pub pages_no: usize,
    /// Maximum tokens the model may generate
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Concurrent API calls (1 to 10)
    #[serde(default = "default_parallel_max")]
    pub parallel_max: usize,
    /// Soft ceiling on estimated cost in USD
    #[serde(default = "default_budget_limit")]
    pub budget_limit: f64,
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    /// Send the PDF text layer instead of page images
    #[serde(default)]
    pub text_mode: bool,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_pages_no() -> usize {
    2
}

fn default_max_output_tokens() -> u32 {
    4000
}

fn default_parallel_max() -> usize {
    DEFAULT_PARALLEL
}

fn default_budget_limit() -> f64 {
    10.0
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_request_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl ClassifierConfig {
    /// Base default without env overrides.
    fn base_default() -> Self {
        Self {
            model: default_model(),
            pages_no: default_pages_no(),
            max_output_tokens: default_max_output_tokens(),
            parallel_max: default_parallel_max(),
            budget_limit: default_budget_limit(),
            max_retries: default_max_retries(),
            request_timeout: default_request_timeout(),
            text_mode: false,
        }
    }

    /// Check if the config equals the default (for skip_serializing_if).
    pub fn is_default(&self) -> bool {
        *self == Self::base_default()
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `MODEL`: model name
    /// - `PAGES_NO`: pages rendered per document
    /// - `MAX_OUTPUT_TOKENS`: generation limit
    /// - `PARALLEL_MAX`: concurrent API calls
    /// - `BUDGET_LIMIT`: cost ceiling in USD
    /// - `MAX_RETRIES`: retries after the first attempt
    /// - `REQUEST_TIMEOUT`: request timeout in seconds
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(env_string)
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("MODEL") {
            self.model = model;
        }
        if let Some(n) = parse_value("PAGES_NO", lookup("PAGES_NO")) {
            self.pages_no = n;
        }
        if let Some(n) = parse_value("MAX_OUTPUT_TOKENS", lookup("MAX_OUTPUT_TOKENS")) {
            self.max_output_tokens = n;
        }
        if let Some(n) = parse_value("PARALLEL_MAX", lookup("PARALLEL_MAX")) {
            self.parallel_max = n;
        }
        if let Some(limit) = parse_value("BUDGET_LIMIT", lookup("BUDGET_LIMIT")) {
            self.budget_limit = limit;
        }
        if let Some(n) = parse_value("MAX_RETRIES", lookup("MAX_RETRIES")) {
            self.max_retries = n;
        }
        if let Some(secs) = parse_value("REQUEST_TIMEOUT", lookup("REQUEST_TIMEOUT")) {
            self.request_timeout = secs;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_base_defaults() {
        let config = ClassifierConfig::base_default();
        assert_eq!(config.pages_no, 2);
        assert_eq!(config.max_output_tokens, 4000);
        assert_eq!(config.parallel_max, 5);
        assert_eq!(config.budget_limit, 10.0);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.request_timeout, 120);
        assert!(config.is_default());
    }

    #[test]
    fn test_overrides_apply() {
        let config = ClassifierConfig::base_default().with_overrides_from(vars(&[
            ("MODEL", "gpt-4o"),
            ("PAGES_NO", "4"),
            ("PARALLEL_MAX", "8"),
            ("BUDGET_LIMIT", "2.5"),
            ("MAX_RETRIES", "0"),
        ]));
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.pages_no, 4);
        assert_eq!(config.parallel_max, 8);
        assert_eq!(config.budget_limit, 2.5);
        assert_eq!(config.max_retries, 0);
        assert!(!config.is_default());
    }

    #[test]
    fn test_invalid_override_is_ignored() {
        let config = ClassifierConfig::base_default()
            .with_overrides_from(vars(&[("PAGES_NO", "many"), ("BUDGET_LIMIT", "")]));
        assert_eq!(config.pages_no, 2);
        assert_eq!(config.budget_limit, 10.0);
    }
}

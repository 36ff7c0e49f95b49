//! Resolved settings of a single classification run.

use std::path::PathBuf;
use std::time::Duration;

use super::paths::PROMPT_FALLBACKS;
use super::{Config, ConfigError};
use crate::catalog::{self, ModelSpec};
use crate::rate_limit::{RetryPolicy, MAX_PARALLEL};

/// Explicit per-run configuration passed to every component.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub model: &'static ModelSpec,
    /// Pages rendered per document.
    pub max_pages: usize,
    pub max_output_tokens: u32,
    pub parallel_max: usize,
    pub budget_limit: f64,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub text_mode: bool,
    pub output_dir: PathBuf,
    pub prompt_file: Option<PathBuf>,
    pub validation_file: Option<PathBuf>,
    pub docs_dir: Option<PathBuf>,
    pub file_filter: Option<String>,
    /// Classify at most this many documents.
    pub limit: Option<usize>,
}

impl RunConfig {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let classifier = &config.classifier;
        let model = catalog::lookup(&classifier.model)
            .ok_or_else(|| ConfigError::UnknownModel(classifier.model.clone()))?;

        Ok(Self {
            model,
            max_pages: classifier.pages_no,
            max_output_tokens: classifier.max_output_tokens,
            parallel_max: classifier.parallel_max,
            budget_limit: classifier.budget_limit,
            retry: RetryPolicy::default().with_max_retries(classifier.max_retries),
            request_timeout: Duration::from_secs(classifier.request_timeout),
            text_mode: classifier.text_mode,
            output_dir: config.resolve_path(&config.paths.output_dir),
            prompt_file: config.paths.prompt_file.as_deref().map(|p| config.resolve_path(p)),
            validation_file: config
                .paths
                .validation_file
                .as_deref()
                .map(|p| config.resolve_path(p)),
            docs_dir: config.paths.docs_dir.as_deref().map(|p| config.resolve_path(p)),
            file_filter: config.paths.file_filter.clone(),
            limit: None,
        })
    }

    /// Switch to another model from the catalog.
    pub fn set_model(&mut self, name: &str) -> Result<(), ConfigError> {
        self.model =
            catalog::lookup(name).ok_or_else(|| ConfigError::UnknownModel(name.to_string()))?;
        Ok(())
    }

    /// Tag used in output file names.
    pub fn engine_tag(&self) -> &'static str {
        self.model.name
    }

    /// Check limits before any API call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pages == 0 {
            return Err(ConfigError::Invalid(
                "pages per document must be at least 1".to_string(),
            ));
        }
        if self.max_output_tokens == 0 {
            return Err(ConfigError::Invalid(
                "max output tokens must be at least 1".to_string(),
            ));
        }
        if !self.budget_limit.is_finite() || self.budget_limit < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "budget limit must be a non-negative number, got {}",
                self.budget_limit
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.parallel_max > MAX_PARALLEL {
            tracing::warn!(
                "PARALLEL_MAX {} exceeds {}, it will be clamped",
                self.parallel_max,
                MAX_PARALLEL
            );
        }
        Ok(())
    }

    /// Locate the prompt template: the configured file, else the first
    /// existing fallback location.
    pub fn find_prompt_file(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref path) = self.prompt_file {
            if path.is_file() {
                return Ok(path.clone());
            }
            return Err(ConfigError::MissingFile {
                kind: "prompt template",
                path: path.clone(),
            });
        }
        PROMPT_FALLBACKS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
            .ok_or_else(|| ConfigError::MissingFile {
                kind: "prompt template",
                path: PathBuf::from(PROMPT_FALLBACKS[0]),
            })
    }

    /// The validation dataset, which must exist.
    pub fn require_validation_file(&self) -> Result<PathBuf, ConfigError> {
        let path = self
            .validation_file
            .clone()
            .ok_or_else(|| ConfigError::MissingKey("VALIDATION_FILE".to_string()))?;
        if !path.is_file() {
            return Err(ConfigError::MissingFile {
                kind: "validation dataset",
                path,
            });
        }
        Ok(path)
    }
}

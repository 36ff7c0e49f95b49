//! Input and output locations.

use serde::{Deserialize, Serialize};

use super::env_string;

/// Default directory for run outputs.
pub const DEFAULT_OUTPUT_DIR: &str = "results";

/// Prompt locations tried when none is configured.
pub const PROMPT_FALLBACKS: &[&str] = &[
    "prompt_template.txt",
    "prompts/document_classification_prompt.txt",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory for result files
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Prompt template file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<String>,
    /// Validation dataset (CSV)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_file: Option<String>,
    /// Directory joined with `file_name` dataset entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_dir: Option<String>,
    /// Only classify documents whose path contains this substring
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_filter: Option<String>,
}

fn default_output_dir() -> String {
    DEFAULT_OUTPUT_DIR.to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl PathsConfig {
    fn base_default() -> Self {
        Self {
            output_dir: default_output_dir(),
            prompt_file: None,
            validation_file: None,
            docs_dir: None,
            file_filter: None,
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::base_default()
    }

    /// Apply `OUTPUT_DIR`, `PROMPT_FILE`, `VALIDATION_FILE`, `DOCS_DIR` and
    /// `FILE_FILTER`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(env_string)
    }

    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("OUTPUT_DIR") {
            self.output_dir = dir;
        }
        if let Some(file) = lookup("PROMPT_FILE") {
            self.prompt_file = Some(file);
        }
        if let Some(file) = lookup("VALIDATION_FILE") {
            self.validation_file = Some(file);
        }
        if let Some(dir) = lookup("DOCS_DIR") {
            self.docs_dir = Some(dir);
        }
        if let Some(filter) = lookup("FILE_FILTER") {
            self.file_filter = Some(filter);
        }
        self
    }
}

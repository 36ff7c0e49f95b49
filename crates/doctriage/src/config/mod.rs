//! Configuration management.
//!
//! Settings come from three layers: a discovered or explicit config file,
//! environment variables (applied by each section's `Default` and again after
//! a file is parsed), and CLI flags applied to the resolved [`RunConfig`].

mod classifier;
mod loader;
mod paths;
mod providers;
mod run;

pub use classifier::ClassifierConfig;
pub use loader::{load_config, LoadOptions};
pub use paths::PathsConfig;
pub use providers::{AzureConfig, GeminiConfig, MistralConfig, ProvidersConfig};
pub use run::RunConfig;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort a run before any API call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {format} config: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },
    #[error("missing required setting {0}")]
    MissingKey(String),
    #[error("{kind} not found: {path}")]
    MissingFile { kind: &'static str, path: PathBuf },
    #[error("unknown model '{0}' (run `doctriage models` for the supported list)")]
    UnknownModel(String),
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model selection and run limits.
    #[serde(default, skip_serializing_if = "ClassifierConfig::is_default")]
    pub classifier: ClassifierConfig,
    /// Provider credentials and endpoints.
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Input and output locations.
    #[serde(default, skip_serializing_if = "PathsConfig::is_default")]
    pub paths: PathsConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery.
    /// Automatically discovers doctriage config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("doctriage").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config file {}: {}", path.display(), e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            Err(_) => Self::default_with_env(),
        }
    }

    /// Create a default config with environment variable overrides applied.
    /// Equivalent to `Self::default()` since sections apply env overrides in
    /// their own Default implementations.
    pub fn default_with_env() -> Self {
        Self::default()
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse config text in the format named by `ext`, then apply env overrides.
    pub fn parse(contents: &str, ext: &str) -> Result<Self, ConfigError> {
        let config: Config = match ext {
            "toml" => toml::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "TOML",
                message: e.to_string(),
            })?,
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "YAML",
                message: e.to_string(),
            })?,
            _ => serde_json::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "JSON",
                message: e.to_string(),
            })?,
        };
        Ok(config.with_env_overrides())
    }

    /// Re-apply environment overrides on top of file values.
    pub fn with_env_overrides(mut self) -> Self {
        self.classifier = self.classifier.with_env_overrides();
        self.providers = self.providers.with_env_overrides();
        self.paths = self.paths.with_env_overrides();
        self
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// Without a config file, relative paths stay relative to the CWD.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            return p.to_path_buf();
        }
        match self.base_dir() {
            Some(base) => base.join(p),
            None => p.to_path_buf(),
        }
    }

    /// Resolve the settings of one run.
    pub fn run_config(&self) -> Result<RunConfig, ConfigError> {
        RunConfig::from_config(self)
    }
}

/// Non-empty environment variable.
pub(crate) fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a raw variable value. Unparseable values are logged and ignored.
pub(crate) fn parse_value<T: FromStr>(name: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        let json = r#"{"classifier": {"model": "gpt-4o-mini", "pages_no": 3}}"#;
        let toml = "[classifier]\nmodel = \"gpt-4o-mini\"\npages_no = 3\n";
        let yaml = "classifier:\n  model: gpt-4o-mini\n  pages_no: 3\n";

        for (text, ext) in [(json, "json"), (toml, "toml"), (yaml, "yaml")] {
            let config = Config::parse(text, ext).unwrap();
            assert_eq!(config.classifier.pages_no, 3, "format {}", ext);
        }
    }

    #[test]
    fn test_parse_error_names_format() {
        let err = Config::parse("classifier = [", "toml").unwrap_err();
        assert!(err.to_string().contains("TOML"));
    }

    #[test]
    fn test_resolve_path_uses_config_dir() {
        let mut config = Config::default();
        assert_eq!(config.resolve_path("data.csv"), PathBuf::from("data.csv"));

        config.source_path = Some(PathBuf::from("/etc/doctriage/doctriage.toml"));
        assert_eq!(
            config.resolve_path("data.csv"),
            PathBuf::from("/etc/doctriage/data.csv")
        );
        assert_eq!(config.resolve_path("/tmp/x.csv"), PathBuf::from("/tmp/x.csv"));
    }

    #[tokio::test]
    async fn test_load_from_path_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doctriage.json");
        std::fs::write(&path, r#"{"paths": {"output_dir": "out"}}"#).unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.source_path.as_deref(), Some(path.as_path()));
        assert_eq!(config.base_dir().as_deref(), Some(dir.path()));
    }

    #[tokio::test]
    async fn test_load_from_missing_path() {
        let err = Config::load_from_path(Path::new("/nonexistent/doctriage.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}

//! Configuration loading.

use std::path::PathBuf;

use super::{Config, ConfigError};

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
}

/// Load config from the explicit path, or auto-discover via prefer.
///
/// An explicit path that cannot be read or parsed is an error; a discovered
/// file that fails to parse is logged and ignored.
pub async fn load_config(options: &LoadOptions) -> Result<Config, ConfigError> {
    if let Some(ref path) = options.config_path {
        tracing::debug!("Loading config from {}", path.display());
        return Config::load_from_path(path).await;
    }
    Ok(Config::load().await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_path_errors_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doctriage.yaml");
        std::fs::write(&path, "classifier: [unclosed").unwrap();

        let options = LoadOptions {
            config_path: Some(path),
        };
        let err = load_config(&options).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { format: "YAML", .. }));
    }

    #[tokio::test]
    async fn test_explicit_path_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doctriage.toml");
        std::fs::write(&path, "[paths]\nvalidation_file = \"validation.csv\"\n").unwrap();

        let options = LoadOptions {
            config_path: Some(path),
        };
        let config = load_config(&options).await.unwrap();
        let run_file = config.resolve_path("validation.csv");
        assert_eq!(run_file, dir.path().join("validation.csv"));
    }
}

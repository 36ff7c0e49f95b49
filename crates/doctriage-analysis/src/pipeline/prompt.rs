//! Prompt template loading.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::vision::DOCUMENT_PLACEHOLDER;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to read prompt template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("prompt template {0} is empty")]
    Empty(PathBuf),
}

/// Read a prompt template, rejecting empty files.
pub fn load_prompt(path: &Path) -> Result<String, PromptError> {
    let text = std::fs::read_to_string(path).map_err(|source| PromptError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if text.trim().is_empty() {
        return Err(PromptError::Empty(path.to_path_buf()));
    }
    if text.contains(DOCUMENT_PLACEHOLDER) {
        tracing::debug!(
            "Prompt {} embeds document text at {}",
            path.display(),
            DOCUMENT_PLACEHOLDER
        );
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "Classify the document.\n{{DOCUMENT_TO_CLASSIFY}}\n").unwrap();
        assert!(load_prompt(&path).unwrap().contains(DOCUMENT_PLACEHOLDER));

        std::fs::write(&path, "  \n").unwrap();
        assert!(matches!(load_prompt(&path), Err(PromptError::Empty(_))));

        let missing = dir.path().join("missing.txt");
        assert!(matches!(load_prompt(&missing), Err(PromptError::Read { .. })));
    }
}

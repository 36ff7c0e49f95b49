use serde::{Deserialize, Serialize};

/// One row of the validation dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub classification: String,
}

impl ValidationRecord {
    /// Identifier of the document: `file_path` when present, else `file_name`.
    pub fn document_id(&self) -> Option<&str> {
        self.file_path
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.file_name.as_deref().filter(|s| !s.trim().is_empty()))
    }
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One rendered page, PNG encoded as base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    /// 1-based page number in the source document.
    pub page_number: u32,
    pub mime_type: String,
    pub data_base64: String,
}

impl PageImage {
    pub fn png(page_number: u32, data_base64: String) -> Self {
        Self {
            page_number,
            mime_type: "image/png".to_string(),
            data_base64,
        }
    }
}

/// Payload sent to a provider: page images or extracted text, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum DocumentContent {
    Images(Vec<PageImage>),
    Text(String),
}

impl DocumentContent {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Images(images) => images.is_empty(),
            Self::Text(text) => text.trim().is_empty(),
        }
    }

    pub fn image_count(&self) -> usize {
        match self {
            Self::Images(images) => images.len(),
            Self::Text(_) => 0,
        }
    }
}

/// A document queued for classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationTask {
    /// Key used to attribute the result; the dataset's path value.
    pub document_id: String,
    pub file_path: PathBuf,
    pub expected_label: Option<String>,
}

impl ClassificationTask {
    pub fn new(document_id: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            document_id: document_id.into(),
            file_path: file_path.into(),
            expected_label: None,
        }
    }

    pub fn with_expected(mut self, label: impl Into<String>) -> Self {
        self.expected_label = Some(label.into());
        self
    }

    /// File name component of the path, falling back to the document id.
    pub fn filename(&self) -> String {
        self.file_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| self.document_id.clone())
    }
}

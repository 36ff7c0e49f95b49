use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pricing::TokenCounts;

/// Outcome of classifying one document. Produced exactly once per task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub document_id: String,
    pub filename: String,
    /// None when the document failed before a label could be extracted.
    pub predicted_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_label: Option<String>,
    #[serde(default)]
    pub raw_response_text: String,
    #[serde(default, with = "super::duration_secs")]
    pub response_time: Option<Duration>,
    #[serde(default)]
    pub estimated_cost: f64,
    /// Cost of the OCR pass, when text was extracted by a separate engine.
    #[serde(default)]
    pub ocr_cost: f64,
    #[serde(default)]
    pub token_counts: TokenCounts,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_engine: Option<String>,
}

impl ClassificationResult {
    /// A failed result carrying no prediction and no cost.
    pub fn failed(
        document_id: impl Into<String>,
        filename: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            filename: filename.into(),
            predicted_label: None,
            expected_label: None,
            raw_response_text: String::new(),
            response_time: None,
            estimated_cost: 0.0,
            ocr_cost: 0.0,
            token_counts: TokenCounts::default(),
            retry_count: 0,
            error: Some(error.into()),
            ocr_engine: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.predicted_label.is_some()
    }

    /// Classification cost plus OCR cost.
    pub fn total_cost(&self) -> f64 {
        self.estimated_cost + self.ocr_cost
    }

    /// Whether the prediction matches the expected label.
    /// None when either side is missing.
    pub fn is_correct(&self) -> Option<bool> {
        match (&self.predicted_label, &self.expected_label) {
            (Some(predicted), Some(expected)) => Some(predicted == expected),
            _ => None,
        }
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Aggregate token counts of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTotals {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
    #[serde(default)]
    pub total: u64,
}

/// Statistics of one classification run, derived from its results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSummary {
    pub model: String,
    /// Fraction of scored documents predicted correctly (0 to 1).
    pub accuracy: f64,
    pub correct_count: usize,
    pub total_count: usize,
    /// Successful calls as a percentage of all calls (0 to 100).
    pub completion_percentage: f64,
    pub successful_calls: usize,
    pub failed_calls: usize,
    /// Number of successful documents per retry count.
    pub retry_counts: BTreeMap<u32, usize>,
    /// Share of successful documents that needed at least one retry (0 to 100).
    pub retry_percentage: f64,
    /// Mean response time in seconds over documents with a timing.
    pub average_response_time: f64,
    pub total_api_time: f64,
    #[serde(alias = "total_run_time")]
    pub total_processing_time: f64,
    pub total_cost: f64,
    pub ocr_cost: f64,
    pub total_tokens: TokenTotals,
    pub total_pages: u64,
    pub budget_limit: f64,
    pub over_budget: bool,
    pub cost_is_estimate: bool,
}

/// One scored row of a run, as stored under `detailed_results`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoredDocument {
    #[serde(alias = "file")]
    pub filename: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub document_id: String,
    pub predicted: String,
    pub expected: String,
    pub correct: bool,
    pub response_time: f64,
    pub cost: f64,
    pub retries: u32,
}

/// The parts of a detailed results file needed for multi-run aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunFile {
    #[serde(default)]
    pub summary: RunSummary,
    #[serde(default)]
    pub detailed_results: Vec<ScoredDocument>,
}

/// Agreement of predictions for one file across repeated runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyRecord {
    pub filename: String,
    pub most_common_prediction: String,
    pub mode_count: usize,
    pub runs: usize,
    pub consistency_percentage: f64,
    pub correct_percentage: f64,
    pub expected_label: String,
    pub avg_response_time: f64,
}

/// Per-run values kept alongside the averages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunPoint {
    pub accuracy: f64,
    pub completion_percentage: f64,
    pub average_response_time: f64,
    pub run_time: f64,
    pub cost: f64,
    pub tokens: u64,
}

/// Averages over a set of runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiRunSummary {
    pub num_runs: usize,
    pub average_accuracy: f64,
    pub average_completion: f64,
    pub average_response_time: f64,
    pub average_run_time: f64,
    pub total_cost: f64,
    pub average_cost_per_run: f64,
    pub total_tokens: u64,
    pub average_tokens_per_run: f64,
    pub runs: Vec<RunPoint>,
}

/// Result of one prompt-optimisation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptResult {
    pub name: String,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_file_accepts_legacy_fields() {
        let json = r#"{
            "summary": {"accuracy": 0.9, "total_run_time": 12.5, "total_tokens": {"total": 300}},
            "detailed_results": [
                {"file": "a.pdf", "predicted": "INVOICE", "expected": "INVOICE", "correct": true}
            ]
        }"#;
        let run: RunFile = serde_json::from_str(json).unwrap();
        assert_eq!(run.summary.total_processing_time, 12.5);
        assert_eq!(run.summary.total_tokens.total, 300);
        assert_eq!(run.detailed_results[0].filename, "a.pdf");
        assert!(run.detailed_results[0].correct);
    }

    #[test]
    fn test_retry_histogram_round_trips() {
        let mut summary = RunSummary::default();
        summary.retry_counts.insert(0, 4);
        summary.retry_counts.insert(2, 1);
        let json = serde_json::to_string(&summary).unwrap();
        let back: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.retry_counts, summary.retry_counts);
    }
}

//! JSON report files.

use std::path::{Path, PathBuf};

use serde::Serialize;

use doctriage::models::{
    ClassificationResult, ConsistencyRecord, MultiRunSummary, RunSummary, ScoredDocument,
    UsageRecord,
};

use super::{write_text, ReportError};

/// `classification_detailed_results_*.json`, readable back as a `RunFile`.
#[derive(Serialize)]
pub struct DetailedRunFile<'a> {
    pub summary: &'a RunSummary,
    pub detailed_results: &'a [ScoredDocument],
    pub raw_results: &'a [ClassificationResult],
    pub cost_history: &'a [UsageRecord],
}

/// `run_summary_*.json`.
#[derive(Serialize)]
pub struct RunSummaryFile<'a> {
    pub timestamp: &'a str,
    pub model: &'a str,
    pub ocr_engine: Option<&'a str>,
    pub summary: &'a RunSummary,
    pub prompt: &'a str,
}

/// `aggregated_results_*.json`.
#[derive(Serialize)]
pub struct AggregateFile<'a> {
    pub timestamp: &'a str,
    pub num_runs: usize,
    pub source_files: &'a [PathBuf],
    pub summary: &'a MultiRunSummary,
    pub consistency: &'a [ConsistencyRecord],
}

pub(super) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(value)?;
    write_text(path, &json)
}

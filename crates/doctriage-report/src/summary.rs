//! Single-run statistics.

use std::collections::BTreeMap;
use std::time::Duration;

use doctriage::models::{ClassificationResult, RunSummary, ScoredDocument, TokenTotals};

/// Run-level values that do not come from the results themselves.
#[derive(Debug, Clone, Default)]
pub struct SummaryOptions {
    pub model: String,
    pub budget_limit: f64,
    /// Wall-clock duration of the whole run.
    pub total_processing_time: Duration,
    /// Pages billed by page-priced models.
    pub total_pages: u64,
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Fold the results of one run into its summary.
///
/// Only results with both a prediction and an expected label are scored;
/// `UNKNOWN` counts as a wrong prediction. Results without a prediction count
/// as failed calls and stay out of the accuracy denominator.
pub fn summarize(results: &[ClassificationResult], options: &SummaryOptions) -> RunSummary {
    let mut correct_count = 0;
    let mut total_count = 0;
    for result in results {
        if let Some(correct) = result.is_correct() {
            total_count += 1;
            if correct {
                correct_count += 1;
            }
        }
    }

    let successful: Vec<&ClassificationResult> = results.iter().filter(|r| r.is_success()).collect();
    let successful_calls = successful.len();
    let failed_calls = results.len() - successful_calls;

    let mut retry_counts = BTreeMap::new();
    for result in &successful {
        *retry_counts.entry(result.retry_count).or_insert(0) += 1;
    }
    let retried = successful.iter().filter(|r| r.retry_count > 0).count();

    let timings: Vec<f64> = successful
        .iter()
        .filter_map(|r| r.response_time)
        .map(|d| d.as_secs_f64())
        .collect();
    let total_api_time: f64 = timings.iter().sum();

    let mut total_tokens = TokenTotals::default();
    for result in results {
        total_tokens.input += result.token_counts.input;
        total_tokens.output += result.token_counts.output;
        total_tokens.total += result.token_counts.total;
    }

    let total_cost: f64 = results.iter().map(|r| r.total_cost()).sum();
    let ocr_cost: f64 = results.iter().map(|r| r.ocr_cost).sum();

    RunSummary {
        model: options.model.clone(),
        accuracy: mean(correct_count as f64, total_count),
        correct_count,
        total_count,
        completion_percentage: mean(successful_calls as f64 * 100.0, results.len()),
        successful_calls,
        failed_calls,
        retry_counts,
        retry_percentage: mean(retried as f64 * 100.0, successful_calls),
        average_response_time: mean(total_api_time, timings.len()),
        total_api_time,
        total_processing_time: options.total_processing_time.as_secs_f64(),
        total_cost,
        ocr_cost,
        total_tokens,
        total_pages: options.total_pages,
        budget_limit: options.budget_limit,
        over_budget: total_cost > options.budget_limit,
        cost_is_estimate: true,
    }
}

/// One row per document that produced a prediction.
pub fn score_documents(results: &[ClassificationResult]) -> Vec<ScoredDocument> {
    results
        .iter()
        .filter_map(|result| {
            let predicted = result.predicted_label.clone()?;
            Some(ScoredDocument {
                filename: result.filename.clone(),
                document_id: result.document_id.clone(),
                predicted,
                expected: result.expected_label.clone().unwrap_or_default(),
                correct: result.is_correct() == Some(true),
                response_time: result.response_time.map(|d| d.as_secs_f64()).unwrap_or(0.0),
                cost: result.total_cost(),
                retries: result.retry_count,
            })
        })
        .collect()
}

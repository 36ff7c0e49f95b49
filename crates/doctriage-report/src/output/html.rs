//! Askama templates for the HTML reports.
//!
//! Values are formatted up front so the templates only lay them out.

use askama::Template;

use doctriage::models::{ConsistencyRecord, MultiRunSummary};

use super::{ReportError, RunReport};

/// Label-level row for the results table.
pub struct ResultRow {
    pub filename: String,
    pub predicted: String,
    pub expected: String,
    pub correct: bool,
    pub time_str: String,
    pub cost_str: String,
    pub retries: u32,
}

/// A failed document.
pub struct FailureRow {
    pub filename: String,
    pub error: String,
    pub retries: u32,
}

/// One bar of the retry histogram.
pub struct RetryBucket {
    pub retries: u32,
    pub count: usize,
}

#[derive(Template)]
#[template(path = "run_report.html")]
pub struct RunReportTemplate<'a> {
    pub title: String,
    pub timestamp: &'a str,
    pub model: &'a str,
    pub ocr_engine: &'a str,
    pub prompt: &'a str,
    pub accuracy_str: String,
    pub correct_count: usize,
    pub total_count: usize,
    pub completion_str: String,
    pub successful_calls: usize,
    pub failed_calls: usize,
    pub retry_str: String,
    pub avg_time_str: String,
    pub run_time_str: String,
    pub cost_str: String,
    pub budget_str: String,
    pub over_budget: bool,
    pub tokens_str: String,
    pub retry_buckets: Vec<RetryBucket>,
    pub rows: Vec<ResultRow>,
    pub failures: Vec<FailureRow>,
}

/// Per-file consistency row.
pub struct ConsistencyRow {
    pub filename: String,
    pub prediction: String,
    pub expected: String,
    pub agreement_str: String,
    pub correct_str: String,
    pub stable: bool,
}

/// Per-run row of the aggregate report.
pub struct RunRow {
    pub index: usize,
    pub accuracy_str: String,
    pub completion_str: String,
    pub cost_str: String,
    pub run_time_str: String,
}

#[derive(Template)]
#[template(path = "aggregated_report.html")]
pub struct AggregateReportTemplate<'a> {
    pub timestamp: &'a str,
    pub num_runs: usize,
    pub accuracy_str: String,
    pub completion_str: String,
    pub avg_time_str: String,
    pub total_cost_str: String,
    pub cost_per_run_str: String,
    pub tokens_per_run_str: String,
    pub runs: Vec<RunRow>,
    pub rows: Vec<ConsistencyRow>,
}

fn percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

fn dollars(cost: f64) -> String {
    format!("${:.4}", cost)
}

fn seconds(secs: f64) -> String {
    format!("{:.2}s", secs)
}

pub fn render_run_html(report: &RunReport<'_>, timestamp: &str) -> Result<String, ReportError> {
    let summary = report.summary;

    let rows = report
        .scored
        .iter()
        .map(|doc| ResultRow {
            filename: doc.filename.clone(),
            predicted: doc.predicted.clone(),
            expected: doc.expected.clone(),
            correct: doc.correct,
            time_str: seconds(doc.response_time),
            cost_str: dollars(doc.cost),
            retries: doc.retries,
        })
        .collect();

    let failures = report
        .results
        .iter()
        .filter(|r| !r.is_success())
        .map(|r| FailureRow {
            filename: r.filename.clone(),
            error: r.error.clone().unwrap_or_default(),
            retries: r.retry_count,
        })
        .collect();

    let template = RunReportTemplate {
        title: format!("Classification Report: {}", report.model),
        timestamp,
        model: report.model,
        ocr_engine: report.ocr_engine.unwrap_or("none"),
        prompt: report.prompt,
        accuracy_str: percent(summary.accuracy),
        correct_count: summary.correct_count,
        total_count: summary.total_count,
        completion_str: format!("{:.2}%", summary.completion_percentage),
        successful_calls: summary.successful_calls,
        failed_calls: summary.failed_calls,
        retry_str: format!("{:.2}%", summary.retry_percentage),
        avg_time_str: seconds(summary.average_response_time),
        run_time_str: seconds(summary.total_processing_time),
        cost_str: dollars(summary.total_cost),
        budget_str: dollars(summary.budget_limit),
        over_budget: summary.over_budget,
        tokens_str: format!(
            "{} ({} in, {} out)",
            summary.total_tokens.total, summary.total_tokens.input, summary.total_tokens.output
        ),
        retry_buckets: summary
            .retry_counts
            .iter()
            .map(|(&retries, &count)| RetryBucket { retries, count })
            .collect(),
        rows,
        failures,
    };
    Ok(template.render()?)
}

pub fn render_aggregate_html(
    summary: &MultiRunSummary,
    consistency: &[ConsistencyRecord],
    timestamp: &str,
) -> Result<String, ReportError> {
    let template = AggregateReportTemplate {
        timestamp,
        num_runs: summary.num_runs,
        accuracy_str: percent(summary.average_accuracy),
        completion_str: format!("{:.2}%", summary.average_completion),
        avg_time_str: seconds(summary.average_response_time),
        total_cost_str: dollars(summary.total_cost),
        cost_per_run_str: dollars(summary.average_cost_per_run),
        tokens_per_run_str: format!("{:.0}", summary.average_tokens_per_run),
        runs: summary
            .runs
            .iter()
            .enumerate()
            .map(|(i, run)| RunRow {
                index: i + 1,
                accuracy_str: percent(run.accuracy),
                completion_str: format!("{:.2}%", run.completion_percentage),
                cost_str: dollars(run.cost),
                run_time_str: seconds(run.run_time),
            })
            .collect(),
        rows: consistency
            .iter()
            .map(|r| ConsistencyRow {
                filename: r.filename.clone(),
                prediction: r.most_common_prediction.clone(),
                expected: r.expected_label.clone(),
                agreement_str: format!("{} of {} ({:.1}%)", r.mode_count, r.runs, r.consistency_percentage),
                correct_str: format!("{:.1}%", r.correct_percentage),
                stable: r.mode_count == r.runs,
            })
            .collect(),
    };
    Ok(template.render()?)
}

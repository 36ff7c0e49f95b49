//! Report files.
//!
//! Every file written by one [`ReportWriter`] shares the same `%Y%m%d_%H%M%S`
//! timestamp, so the outputs of a run sort together and never overwrite an
//! earlier run.

mod csv_out;
mod html;
mod json;

pub use csv_out::{write_consistency_csv, write_prompt_csv, write_results_csv};
pub use html::{render_aggregate_html, render_run_html};
pub use json::{AggregateFile, DetailedRunFile, RunSummaryFile};

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::info;

use doctriage::models::{
    ClassificationResult, ConsistencyRecord, MultiRunSummary, PromptResult, RunSummary,
    ScoredDocument, UsageRecord,
};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

/// Everything one classification run reports.
pub struct RunReport<'a> {
    pub model: &'a str,
    /// Engine tag used in file names.
    pub engine: &'a str,
    pub ocr_engine: Option<&'a str>,
    /// Prompt template path.
    pub prompt: &'a str,
    pub summary: &'a RunSummary,
    pub scored: &'a [ScoredDocument],
    pub results: &'a [ClassificationResult],
    pub usage: &'a [UsageRecord],
}

/// Files written for one run.
#[derive(Debug, Clone)]
pub struct RunFiles {
    pub detailed_json: PathBuf,
    pub summary_json: PathBuf,
    pub csv: PathBuf,
    pub html: PathBuf,
}

/// Files written for a multi-run aggregation.
#[derive(Debug, Clone)]
pub struct AggregateFiles {
    pub json: PathBuf,
    pub csv: PathBuf,
    pub html: PathBuf,
}

/// Writes timestamped report files into one directory.
pub struct ReportWriter {
    output_dir: PathBuf,
    created_at: DateTime<Local>,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self::at(output_dir, Local::now())
    }

    /// Writer with a fixed timestamp.
    pub fn at(output_dir: impl Into<PathBuf>, created_at: DateTime<Local>) -> Self {
        Self {
            output_dir: output_dir.into(),
            created_at,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn timestamp(&self) -> String {
        self.created_at.format(TIMESTAMP_FORMAT).to_string()
    }

    fn ensure_dir(&self) -> Result<(), ReportError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| ReportError::Write {
            path: self.output_dir.clone(),
            source,
        })
    }

    fn path(&self, stem: &str, ext: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.{}", stem, self.timestamp(), ext))
    }

    /// Write the detailed JSON, summary JSON, CSV and HTML of a run.
    pub fn write_run(&self, report: &RunReport<'_>) -> Result<RunFiles, ReportError> {
        self.ensure_dir()?;
        let timestamp = self.timestamp();
        let engine = sanitize(report.engine);

        let detailed_json = self.path(&format!("classification_detailed_results_{}", engine), "json");
        json::write_json(
            &detailed_json,
            &DetailedRunFile {
                summary: report.summary,
                detailed_results: report.scored,
                raw_results: report.results,
                cost_history: report.usage,
            },
        )?;

        let summary_json = self.path(&format!("run_summary_{}", engine), "json");
        json::write_json(
            &summary_json,
            &RunSummaryFile {
                timestamp: &timestamp,
                model: report.model,
                ocr_engine: report.ocr_engine,
                summary: report.summary,
                prompt: report.prompt,
            },
        )?;

        let csv = self.path(&format!("classification_results_{}", engine), "csv");
        write_results_csv(&csv, report.scored)?;

        let html = self.path(&format!("classification_report_{}", engine), "html");
        write_text(&html, &render_run_html(report, &timestamp)?)?;

        info!("Wrote run reports to {}", self.output_dir.display());
        Ok(RunFiles {
            detailed_json,
            summary_json,
            csv,
            html,
        })
    }

    /// Write the aggregated JSON, consistency CSV and HTML of several runs.
    pub fn write_aggregate(
        &self,
        summary: &MultiRunSummary,
        consistency: &[ConsistencyRecord],
        sources: &[PathBuf],
    ) -> Result<AggregateFiles, ReportError> {
        self.ensure_dir()?;
        let timestamp = self.timestamp();

        let json = self.path("aggregated_results", "json");
        json::write_json(
            &json,
            &AggregateFile {
                timestamp: &timestamp,
                num_runs: summary.num_runs,
                source_files: sources,
                summary,
                consistency,
            },
        )?;

        let csv = self.path("consistency", "csv");
        write_consistency_csv(&csv, consistency)?;

        let html = self.path("aggregated_report", "html");
        write_text(&html, &render_aggregate_html(summary, consistency, &timestamp)?)?;

        info!("Wrote aggregate reports to {}", self.output_dir.display());
        Ok(AggregateFiles { json, csv, html })
    }

    /// Write the ranked prompt comparison.
    pub fn write_prompt_comparison(&self, results: &[PromptResult]) -> Result<PathBuf, ReportError> {
        self.ensure_dir()?;
        let path = self.path("prompt_comparison", "csv");
        write_prompt_csv(&path, results)?;
        Ok(path)
    }
}

pub(crate) fn write_text(path: &Path, contents: &str) -> Result<(), ReportError> {
    std::fs::write(path, contents).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Make an engine tag safe for file names.
fn sanitize(tag: &str) -> String {
    tag.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

//! CSV report files.

use std::path::Path;

use serde::Serialize;

use doctriage::models::{ConsistencyRecord, PromptResult, ScoredDocument};

use super::ReportError;

/// Flat row of the per-document results CSV.
#[derive(Serialize)]
struct ResultRow<'a> {
    filename: &'a str,
    document_id: &'a str,
    predicted: &'a str,
    expected: &'a str,
    correct: bool,
    response_time: f64,
    cost: f64,
    retries: u32,
}

#[derive(Serialize)]
struct PromptRow<'a> {
    rank: usize,
    name: &'a str,
    accuracy: f64,
    notes: &'a str,
}

fn write_rows<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_results_csv(path: &Path, scored: &[ScoredDocument]) -> Result<(), ReportError> {
    write_rows(
        path,
        scored.iter().map(|doc| ResultRow {
            filename: &doc.filename,
            document_id: if doc.document_id.is_empty() {
                &doc.filename
            } else {
                &doc.document_id
            },
            predicted: &doc.predicted,
            expected: &doc.expected,
            correct: doc.correct,
            response_time: doc.response_time,
            cost: doc.cost,
            retries: doc.retries,
        }),
    )
}

pub fn write_consistency_csv(path: &Path, records: &[ConsistencyRecord]) -> Result<(), ReportError> {
    write_rows(path, records)
}

/// Prompts in the given order, ranked from 1.
pub fn write_prompt_csv(path: &Path, results: &[PromptResult]) -> Result<(), ReportError> {
    write_rows(
        path,
        results.iter().enumerate().map(|(i, p)| PromptRow {
            rank: i + 1,
            name: &p.name,
            accuracy: p.accuracy,
            notes: p.notes.as_deref().unwrap_or(""),
        }),
    )
}

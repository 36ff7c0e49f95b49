//! Multi-run aggregation and prediction consistency.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use doctriage::models::{ConsistencyRecord, MultiRunSummary, RunFile, RunPoint};

use crate::output::ReportError;

/// File name prefix of detailed run files.
pub const RUN_FILE_PREFIX: &str = "classification_detailed_results_";

/// Load run files, failing on the first unreadable one.
pub fn load_run_files(paths: &[PathBuf]) -> Result<Vec<RunFile>, ReportError> {
    let mut runs = Vec::with_capacity(paths.len());
    for path in paths {
        let contents = std::fs::read_to_string(path).map_err(|source| ReportError::Read {
            path: path.clone(),
            source,
        })?;
        let run: RunFile = serde_json::from_str(&contents).map_err(|source| ReportError::Parse {
            path: path.clone(),
            source,
        })?;
        debug!(
            "Loaded {} ({} documents)",
            path.display(),
            run.detailed_results.len()
        );
        runs.push(run);
    }
    Ok(runs)
}

/// Detailed run files in `dir`, sorted by name (and therefore by timestamp).
///
/// With `engine`, only files written for that engine are returned.
pub fn find_run_files(dir: &Path, engine: Option<&str>) -> Result<Vec<PathBuf>, ReportError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ReportError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let prefix = match engine {
        Some(engine) => format!("{}{}_", RUN_FILE_PREFIX, engine),
        None => RUN_FILE_PREFIX.to_string(),
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|path| {
            path.extension().is_some_and(|ext| ext == "json")
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix))
        })
        .collect();
    files.sort();
    Ok(files)
}

#[derive(Default)]
struct FileTally {
    predictions: BTreeMap<String, usize>,
    runs: usize,
    correct: usize,
    expected: String,
    response_time: f64,
}

/// Per-file agreement of predictions across runs, ordered by filename.
///
/// The most common prediction is the label with the highest count; ties go to
/// the lexicographically smallest label.
pub fn analyze_consistency(runs: &[RunFile]) -> Vec<ConsistencyRecord> {
    let mut by_file: BTreeMap<&str, FileTally> = BTreeMap::new();

    for run in runs {
        for doc in &run.detailed_results {
            if doc.filename.is_empty() {
                continue;
            }
            let tally = by_file.entry(doc.filename.as_str()).or_default();
            tally.runs += 1;
            if !doc.predicted.is_empty() {
                *tally.predictions.entry(doc.predicted.clone()).or_insert(0) += 1;
            }
            if doc.correct {
                tally.correct += 1;
            }
            if tally.expected.is_empty() {
                tally.expected = doc.expected.clone();
            }
            tally.response_time += doc.response_time;
        }
    }

    by_file
        .into_iter()
        .map(|(filename, tally)| {
            let (label, count) = most_common(&tally.predictions);
            let runs = tally.runs as f64;
            ConsistencyRecord {
                filename: filename.to_string(),
                most_common_prediction: label,
                mode_count: count,
                runs: tally.runs,
                consistency_percentage: count as f64 / runs * 100.0,
                correct_percentage: tally.correct as f64 / runs * 100.0,
                expected_label: tally.expected,
                avg_response_time: tally.response_time / runs,
            }
        })
        .collect()
}

fn most_common(predictions: &BTreeMap<String, usize>) -> (String, usize) {
    let mut best: Option<(&String, usize)> = None;
    // Ascending label order: a later label only wins with a strictly higher count.
    for (label, &count) in predictions {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((label, count));
        }
    }
    best.map(|(label, count)| (label.clone(), count))
        .unwrap_or_default()
}

/// Averages of the run summaries.
pub fn summarize_runs(runs: &[RunFile]) -> MultiRunSummary {
    let points: Vec<RunPoint> = runs
        .iter()
        .map(|run| RunPoint {
            accuracy: run.summary.accuracy,
            completion_percentage: run.summary.completion_percentage,
            average_response_time: run.summary.average_response_time,
            run_time: run.summary.total_processing_time,
            cost: run.summary.total_cost,
            tokens: run.summary.total_tokens.total,
        })
        .collect();

    let n = points.len();
    let avg = |f: fn(&RunPoint) -> f64| -> f64 {
        if n == 0 {
            0.0
        } else {
            points.iter().map(f).sum::<f64>() / n as f64
        }
    };

    let total_cost: f64 = points.iter().map(|p| p.cost).sum();
    let total_tokens: u64 = points.iter().map(|p| p.tokens).sum();

    MultiRunSummary {
        num_runs: n,
        average_accuracy: avg(|p| p.accuracy),
        average_completion: avg(|p| p.completion_percentage),
        average_response_time: avg(|p| p.average_response_time),
        average_run_time: avg(|p| p.run_time),
        total_cost,
        average_cost_per_run: avg(|p| p.cost),
        total_tokens,
        average_tokens_per_run: avg(|p| p.tokens as f64),
        runs: points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctriage::models::{RunSummary, ScoredDocument};

    fn doc(filename: &str, predicted: &str, expected: &str) -> ScoredDocument {
        ScoredDocument {
            filename: filename.to_string(),
            predicted: predicted.to_string(),
            expected: expected.to_string(),
            correct: predicted == expected,
            response_time: 2.0,
            ..Default::default()
        }
    }

    fn run(docs: Vec<ScoredDocument>, accuracy: f64, cost: f64) -> RunFile {
        RunFile {
            summary: RunSummary {
                accuracy,
                total_cost: cost,
                ..Default::default()
            },
            detailed_results: docs,
        }
    }

    #[test]
    fn test_mode_and_percentages() {
        let runs = vec![
            run(vec![doc("x.pdf", "A", "A")], 1.0, 0.1),
            run(vec![doc("x.pdf", "A", "A")], 1.0, 0.1),
            run(vec![doc("x.pdf", "B", "A")], 0.0, 0.1),
        ];
        let records = analyze_consistency(&runs);
        assert_eq!(records.len(), 1);
        let x = &records[0];
        assert_eq!(x.most_common_prediction, "A");
        assert_eq!(x.mode_count, 2);
        assert_eq!(x.runs, 3);
        assert!((x.consistency_percentage - 200.0 / 3.0).abs() < 1e-9);
        assert!((x.correct_percentage - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(x.expected_label, "A");
        assert_eq!(x.avg_response_time, 2.0);
    }

    #[test]
    fn test_tie_goes_to_smallest_label() {
        let runs = vec![
            run(vec![doc("y.pdf", "RIDER", "RIDER")], 1.0, 0.0),
            run(vec![doc("y.pdf", "CHARTER", "RIDER")], 0.0, 0.0),
        ];
        let records = analyze_consistency(&runs);
        assert_eq!(records[0].most_common_prediction, "CHARTER");
        assert_eq!(records[0].consistency_percentage, 50.0);
    }

    #[test]
    fn test_reloading_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for (i, predicted) in ["A", "B", "A"].iter().enumerate() {
            let path = dir
                .path()
                .join(format!("{}gemini_2025010{}_120000.json", RUN_FILE_PREFIX, i));
            let file = run(vec![doc("x.pdf", predicted, "A"), doc("z.pdf", "C", "C")], 0.5, 0.2);
            std::fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();
            paths.push(path);
        }

        let found = find_run_files(dir.path(), Some("gemini")).unwrap();
        assert_eq!(found, paths);

        let first = analyze_consistency(&load_run_files(&found).unwrap());
        let second = analyze_consistency(&load_run_files(&found).unwrap());
        assert_eq!(first, second);
        assert_eq!(first.iter().map(|r| r.filename.as_str()).collect::<Vec<_>>(), vec!["x.pdf", "z.pdf"]);
        assert_eq!(first[1].consistency_percentage, 100.0);
    }

    #[test]
    fn test_engine_filter_and_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let gemini = dir.path().join(format!("{}gemini_20250101_120000.json", RUN_FILE_PREFIX));
        let azure = dir.path().join(format!("{}gpt-4o_20250101_120000.json", RUN_FILE_PREFIX));
        std::fs::write(&gemini, "{}").unwrap();
        std::fs::write(&azure, "not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        assert_eq!(find_run_files(dir.path(), Some("gemini")).unwrap(), vec![gemini.clone()]);
        assert_eq!(find_run_files(dir.path(), None).unwrap().len(), 2);
        assert!(matches!(
            load_run_files(&[azure]),
            Err(ReportError::Parse { .. })
        ));
    }

    #[test]
    fn test_multi_run_averages() {
        let runs = vec![run(vec![], 0.8, 0.10), run(vec![], 0.9, 0.30)];
        let summary = summarize_runs(&runs);
        assert_eq!(summary.num_runs, 2);
        assert!((summary.average_accuracy - 0.85).abs() < 1e-9);
        assert!((summary.total_cost - 0.40).abs() < 1e-9);
        assert!((summary.average_cost_per_run - 0.20).abs() < 1e-9);
        assert_eq!(summary.runs.len(), 2);

        let empty = summarize_runs(&[]);
        assert_eq!(empty.num_runs, 0);
        assert_eq!(empty.average_accuracy, 0.0);
    }
}

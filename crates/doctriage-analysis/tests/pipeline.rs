//! End-to-end pipeline runs against scripted backends.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use doctriage::config::Config;
use doctriage::models::ClassificationTask;
use doctriage::rate_limit::RetryPolicy;
use doctriage::RunConfig;
use doctriage_analysis::{Pipeline, RunOutcome};

use common::{write_pdf, ExhaustedBackend, InstrumentedBackend, StemRasterizer};

fn run_config(parallel: usize, max_pages: usize, max_retries: u32) -> RunConfig {
    let mut config = Config::default();
    config.classifier.model = "gemini-2.0-flash".to_string();
    let mut run = config.run_config().unwrap();
    run.parallel_max = parallel;
    run.max_pages = max_pages;
    run.retry = RetryPolicy::immediate(max_retries);
    run
}

fn documents(dir: &std::path::Path, names: &[&str], pages: usize) -> Vec<ClassificationTask> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(format!("{}.pdf", name));
            write_pdf(&path, pages);
            ClassificationTask::new(format!("{}.pdf", name), path).with_expected(name.to_uppercase())
        })
        .collect()
}

#[tokio::test]
async fn in_flight_calls_never_exceed_parallel_limit() {
    let dir = tempfile::tempdir().unwrap();
    let names = [
        "invoice", "charter", "rider", "lading", "manifest", "receipt", "notice", "survey",
        "statement", "contract", "letter", "protest",
    ];
    let tasks = documents(dir.path(), &names, 1);

    let backend = Arc::new(InstrumentedBackend::new(Duration::from_millis(20)));
    let pipeline = Pipeline::with_backend(&run_config(3, 2, 0), "Classify.".to_string(), backend.clone())
        .with_rasterizer(Arc::new(StemRasterizer));

    let run = pipeline.run(tasks).await;

    assert_eq!(run.outcome, RunOutcome::Completed);
    let max_seen = backend.max_seen.load(Ordering::SeqCst);
    assert!(max_seen <= 3, "{} calls in flight", max_seen);
    // Calls overlapped rather than running one at a time.
    assert!(max_seen > 1, "{} calls in flight", max_seen);
    assert!(run.peak_in_flight <= 3);
    assert_eq!(pipeline.governor().in_flight(), 0);
    assert_eq!(backend.calls.load(Ordering::SeqCst), names.len());

    // Results are attributed by document, whatever order they finished in.
    for (result, name) in run.results.iter().zip(names) {
        assert_eq!(result.document_id, format!("{}.pdf", name));
        assert_eq!(result.predicted_label.as_deref(), Some(name.to_uppercase().as_str()));
        assert_eq!(result.is_correct(), Some(true));
    }
}

#[tokio::test]
async fn five_page_document_sends_first_two_pages() {
    let dir = tempfile::tempdir().unwrap();
    let tasks = documents(dir.path(), &["charter"], 5);

    let backend = Arc::new(InstrumentedBackend::new(Duration::ZERO));
    let pipeline = Pipeline::with_backend(&run_config(1, 2, 0), "Classify.".to_string(), backend.clone())
        .with_rasterizer(Arc::new(StemRasterizer));

    let run = pipeline.run(tasks).await;

    assert_eq!(*backend.image_counts.lock().unwrap(), vec![2]);
    let tokens = run.results[0].token_counts;
    assert!(tokens.estimated);
    assert!(tokens.input >= 2 * 1024);
}

#[tokio::test]
async fn retries_are_bounded_and_failures_cost_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let tasks = documents(dir.path(), &["invoice", "charter"], 1);

    let backend = Arc::new(ExhaustedBackend {
        calls: AtomicUsize::new(0),
    });
    let pipeline = Pipeline::with_backend(&run_config(2, 2, 2), "Classify.".to_string(), backend.clone())
        .with_rasterizer(Arc::new(StemRasterizer));

    let run = pipeline.run(tasks).await;

    assert_eq!(backend.calls.load(Ordering::SeqCst), 2 * 3);
    for result in &run.results {
        assert!(!result.is_success());
        assert_eq!(result.retry_count, 2);
        assert_eq!(result.estimated_cost, 0.0);
        assert!(result.predicted_label.is_none());
        assert!(result.error.as_deref().unwrap().contains("rate limited"));
    }
    assert_eq!(run.usage.attempts, 6);
    assert_eq!(run.usage.cost, 0.0);
    assert_eq!(run.usage_records.len(), 6);
}

//! Classification run command.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local};
use console::style;

use doctriage::models::{ClassificationResult, ClassificationTask, RunSummary};
use doctriage::{Config, RunConfig};
use doctriage_analysis::pipeline::{build_tasks, load_prompt, load_validation, DatasetFilter};
use doctriage_analysis::{ClassificationRun, Pipeline};
use doctriage_report::{
    analyze_consistency, load_run_files, score_documents, summarize, summarize_runs,
    ReportWriter, RunReport, SummaryOptions,
};

use super::RunArgs;
use crate::cli::progress::RunProgress;

/// Apply command-line flags on top of the configured run settings.
fn apply_args(run: &mut RunConfig, args: &RunArgs) -> anyhow::Result<()> {
    if let Some(ref model) = args.model {
        run.set_model(model)?;
    }
    if let Some(pages) = args.pages {
        run.max_pages = pages;
    }
    if let Some(parallel) = args.parallel {
        run.parallel_max = parallel;
    }
    if let Some(budget) = args.budget {
        run.budget_limit = budget;
    }
    if let Some(retries) = args.max_retries {
        run.retry = run.retry.with_max_retries(retries);
    }
    if let Some(timeout) = args.timeout {
        run.request_timeout = std::time::Duration::from_secs(timeout);
    }
    if args.text_mode {
        run.text_mode = true;
    }
    if let Some(ref path) = args.validation_file {
        run.validation_file = Some(path.clone());
    }
    if let Some(ref dir) = args.docs_dir {
        run.docs_dir = Some(dir.clone());
    }
    if let Some(ref path) = args.prompt_file {
        run.prompt_file = Some(path.clone());
    }
    if let Some(ref dir) = args.output_dir {
        run.output_dir = dir.clone();
    }
    if let Some(ref filter) = args.filter {
        run.file_filter = Some(filter.clone());
    }
    if args.limit.is_some() {
        run.limit = args.limit;
    }
    Ok(())
}

fn load_tasks(run: &RunConfig) -> anyhow::Result<Vec<ClassificationTask>> {
    let validation = run.require_validation_file()?;
    let records = load_validation(&validation)?;
    let dataset_dir = validation.parent().unwrap_or(Path::new("."));
    let filter = DatasetFilter {
        docs_dir: run.docs_dir.as_deref(),
        file_filter: run.file_filter.as_deref(),
        limit: run.limit,
    };
    let tasks = build_tasks(&records, dataset_dir, &filter);
    if tasks.is_empty() {
        anyhow::bail!("No documents to classify in {}", validation.display());
    }
    Ok(tasks)
}

/// Timestamp for the next writer, strictly after the previous run's second.
fn next_timestamp(previous: Option<DateTime<Local>>) -> DateTime<Local> {
    let now = Local::now();
    match previous {
        Some(prev) if now.timestamp() <= prev.timestamp() => prev + chrono::Duration::seconds(1),
        _ => now,
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn wait_for_interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C, runs cannot be interrupted: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Label for the token totals: estimated when any counted result was estimated.
fn token_label(results: &[ClassificationResult]) -> &'static str {
    let estimated = results
        .iter()
        .filter(|r| r.is_success())
        .any(|r| r.token_counts.estimated);
    if estimated {
        "Tokens (estimated):"
    } else {
        "Tokens (reported):"
    }
}

/// Classify the validation dataset `runs` times.
pub async fn cmd_classify(config: &Config, args: &RunArgs, runs: usize) -> anyhow::Result<()> {
    let mut run = config.run_config()?;
    apply_args(&mut run, args)?;
    run.validate()?;
    config.providers.check_credentials(run.model)?;

    let tasks = load_tasks(&run)?;
    let prompt_path = run.find_prompt_file()?;
    let prompt = load_prompt(&prompt_path)?;

    println!(
        "{} {} documents with {} ({} pages, {} parallel)",
        style("Classifying").cyan().bold(),
        tasks.len(),
        style(run.model.name).bold(),
        run.max_pages,
        run.parallel_max
    );

    let runs = runs.max(1);
    let mut written: Vec<PathBuf> = Vec::new();
    let mut last_timestamp = None;

    for index in 1..=runs {
        let pipeline = Pipeline::new(&run, &config.providers, prompt.clone())
            .with_context(|| format!("Cannot classify with {}", run.model.name))?;

        let label = if runs > 1 {
            format!("Run {}/{}", index, runs)
        } else {
            "Classifying".to_string()
        };
        let progress = RunProgress::new(tasks.len(), &label);
        let pipeline = pipeline.with_progress(progress.callback());

        let result = pipeline
            .run_until(tasks.clone(), wait_for_interrupt())
            .await;
        progress.finish();

        let at = next_timestamp(last_timestamp);
        last_timestamp = Some(at);
        let writer = ReportWriter::at(&run.output_dir, at);
        let (summary, detailed) = write_run(&writer, &run, &pipeline, &result, &prompt_path)?;
        print_summary(&summary, &result);
        written.push(detailed);

        if result.outcome.is_interrupted() {
            println!("{}", style("Interrupted; partial results were saved.").yellow());
            break;
        }
    }

    if written.len() > 1 {
        aggregate_runs(&run.output_dir, &written)?;
    }
    Ok(())
}

fn write_run(
    writer: &ReportWriter,
    run: &RunConfig,
    pipeline: &Pipeline,
    result: &ClassificationRun,
    prompt_path: &Path,
) -> anyhow::Result<(RunSummary, PathBuf)> {
    let options = SummaryOptions {
        model: run.model.name.to_string(),
        budget_limit: run.budget_limit,
        total_processing_time: result.elapsed,
        total_pages: result.usage.pages,
    };
    let summary = summarize(&result.results, &options);
    let scored = score_documents(&result.results);
    let prompt = prompt_path.display().to_string();

    let files = writer
        .write_run(&RunReport {
            model: run.model.name,
            engine: run.engine_tag(),
            ocr_engine: pipeline.ocr_engine(),
            prompt: &prompt,
            summary: &summary,
            scored: &scored,
            results: &result.results,
            usage: &result.usage_records,
        })
        .with_context(|| format!("Failed to write reports to {}", writer.output_dir().display()))?;

    println!("  {} {}", style("Report:").dim(), files.html.display());
    Ok((summary, files.detailed_json))
}

fn print_summary(summary: &RunSummary, result: &ClassificationRun) {
    println!("\n{}", style("Run Summary").bold());
    println!("{}", "-".repeat(50));
    println!(
        "  {:<22} {:.2}% ({}/{})",
        "Accuracy:",
        summary.accuracy * 100.0,
        summary.correct_count,
        summary.total_count
    );
    println!(
        "  {:<22} {:.2}% ({} failed)",
        "Completion:", summary.completion_percentage, summary.failed_calls
    );
    println!("  {:<22} {:.2}%", "Retried:", summary.retry_percentage);
    println!(
        "  {:<22} {:.2}s",
        "Avg response time:", summary.average_response_time
    );
    println!(
        "  {:<22} {:.2}s",
        "Total run time:", summary.total_processing_time
    );
    println!(
        "  {:<22} {} in, {} out",
        token_label(&result.results),
        summary.total_tokens.input,
        summary.total_tokens.output
    );
    if summary.total_pages > 0 {
        println!("  {:<22} {}", "OCR pages:", summary.total_pages);
    }
    let cost = format!("${:.4}", summary.total_cost);
    if summary.over_budget {
        println!(
            "  {:<22} {} {}",
            "Estimated cost:",
            style(cost).red(),
            style(format!("(over ${:.2} budget)", summary.budget_limit)).red()
        );
    } else {
        println!("  {:<22} {}", "Estimated cost:", cost);
    }
    println!("  {:<22} {}", "Peak in flight:", result.peak_in_flight);
}

fn aggregate_runs(output_dir: &Path, files: &[PathBuf]) -> anyhow::Result<()> {
    let runs = load_run_files(files)?;
    let summary = summarize_runs(&runs);
    let consistency = analyze_consistency(&runs);
    let written = ReportWriter::new(output_dir).write_aggregate(&summary, &consistency, files)?;

    println!(
        "\n{} {} runs, average accuracy {:.2}%",
        style("Aggregated").cyan().bold(),
        summary.num_runs,
        summary.average_accuracy * 100.0
    );
    println!("  {} {}", style("Report:").dim(), written.html.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_config() {
        let mut run = Config::default().run_config().unwrap();
        let args = RunArgs {
            model: Some("gpt-4o-mini".to_string()),
            pages: Some(4),
            budget: Some(2.5),
            max_retries: Some(5),
            text_mode: true,
            limit: Some(3),
            ..Default::default()
        };
        apply_args(&mut run, &args).unwrap();
        assert_eq!(run.model.name, "gpt-4o-mini");
        assert_eq!(run.max_pages, 4);
        assert_eq!(run.budget_limit, 2.5);
        assert_eq!(run.retry.max_retries, 5);
        assert!(run.text_mode);
        assert_eq!(run.limit, Some(3));
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let mut run = Config::default().run_config().unwrap();
        let args = RunArgs {
            model: Some("gpt-5-turbo".to_string()),
            ..Default::default()
        };
        assert!(apply_args(&mut run, &args).is_err());
    }

    #[test]
    fn test_timestamps_never_repeat() {
        let first = next_timestamp(None);
        let second = next_timestamp(Some(first));
        assert!(second.timestamp() > first.timestamp());
    }

    #[test]
    fn test_tasks_from_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("validation.csv");
        std::fs::write(
            &csv,
            "file_name,classification\ncharter.pdf,CHARTER_PARTY\ninvoice.pdf,INVOICE\n",
        )
        .unwrap();

        let mut run = Config::default().run_config().unwrap();
        run.validation_file = Some(csv);
        run.limit = Some(1);
        let tasks = load_tasks(&run).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].file_path, dir.path().join("charter.pdf"));
    }

    fn answered(id: &str, tokens: doctriage::pricing::TokenCounts) -> ClassificationResult {
        let mut result = ClassificationResult::failed(id, id, "");
        result.error = None;
        result.predicted_label = Some("INVOICE".to_string());
        result.token_counts = tokens;
        result
    }

    #[test]
    fn test_token_label_follows_results() {
        use doctriage::pricing::TokenCounts;

        let reported = vec![
            answered("a", TokenCounts::reported(10, 2)),
            answered("b", TokenCounts::reported(8, 1)),
        ];
        assert_eq!(token_label(&reported), "Tokens (reported):");

        let mixed = vec![
            answered("a", TokenCounts::reported(10, 2)),
            answered("b", TokenCounts::estimated(8, 1)),
        ];
        assert_eq!(token_label(&mixed), "Tokens (estimated):");

        // Failed results carry no tokens and do not count.
        let mut failed = ClassificationResult::failed("c", "c", "timeout");
        failed.token_counts = TokenCounts::estimated(0, 0);
        let with_failure = vec![answered("a", TokenCounts::reported(10, 2)), failed];
        assert_eq!(token_label(&with_failure), "Tokens (reported):");
    }

    #[tokio::test]
    async fn test_interrupt_wait_stays_pending() {
        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(50), wait_for_interrupt()).await;
        assert!(waited.is_err());
    }
}

//! Multi-run aggregation command.

use std::path::PathBuf;

use anyhow::Context;
use console::style;

use doctriage::Config;
use doctriage_report::consistency::find_run_files;
use doctriage_report::{analyze_consistency, load_run_files, summarize_runs, ReportWriter};

/// Aggregate run files into consistency reports.
pub fn cmd_aggregate(
    config: &Config,
    files: Vec<PathBuf>,
    dir: Option<PathBuf>,
    engine: Option<&str>,
) -> anyhow::Result<()> {
    let dir = dir.unwrap_or_else(|| config.resolve_path(&config.paths.output_dir));

    let files = if files.is_empty() {
        find_run_files(&dir, engine)
            .with_context(|| format!("Failed to list run files in {}", dir.display()))?
    } else {
        files
    };
    if files.is_empty() {
        anyhow::bail!("No run files found in {}", dir.display());
    }

    let runs = load_run_files(&files)?;
    let summary = summarize_runs(&runs);
    let consistency = analyze_consistency(&runs);

    println!("\n{}", style("Aggregated Results").bold());
    println!("{}", "-".repeat(50));
    println!("  {:<22} {}", "Runs:", summary.num_runs);
    println!(
        "  {:<22} {:.2}%",
        "Average accuracy:",
        summary.average_accuracy * 100.0
    );
    println!(
        "  {:<22} {:.2}%",
        "Average completion:", summary.average_completion
    );
    println!(
        "  {:<22} {:.2}s",
        "Avg response time:", summary.average_response_time
    );
    println!(
        "  {:<22} ${:.4} (${:.4} per run)",
        "Estimated cost:", summary.total_cost, summary.average_cost_per_run
    );

    let unstable: Vec<_> = consistency.iter().filter(|r| r.mode_count < r.runs).collect();
    if !unstable.is_empty() {
        println!("\n{}", style("Inconsistent predictions:").yellow());
        for record in unstable {
            println!(
                "  {:<40} {} ({}/{} runs, expected {})",
                record.filename,
                record.most_common_prediction,
                record.mode_count,
                record.runs,
                record.expected_label
            );
        }
    }

    let written = ReportWriter::new(&dir).write_aggregate(&summary, &consistency, &files)?;
    println!("\n  {} {}", style("Report:").dim(), written.html.display());
    println!("  {} {}", style("CSV:").dim(), written.csv.display());
    Ok(())
}

//! Prompt comparison command.

use std::path::Path;

use anyhow::Context;
use console::style;

use doctriage_report::{load_prompt_results, rank_prompts, ReportWriter};

/// Rank prompt results found in `dir`, best first.
pub fn cmd_prompts(dir: &Path, output_dir: Option<&Path>) -> anyhow::Result<()> {
    let results = load_prompt_results(dir)
        .with_context(|| format!("Failed to read prompt results from {}", dir.display()))?;
    if results.is_empty() {
        println!("No prompt results found in {}", dir.display());
        return Ok(());
    }
    let ranked = rank_prompts(results);

    println!("\n{}", style("Prompt Comparison").bold());
    println!("{}", "-".repeat(60));
    for (i, prompt) in ranked.iter().enumerate() {
        let accuracy = format!("{:>6.2}%", prompt.accuracy * 100.0);
        let accuracy = if i == 0 {
            style(accuracy).green().bold()
        } else {
            style(accuracy)
        };
        println!("  {:>2}. {} {}", i + 1, accuracy, prompt.name);
        if let Some(ref notes) = prompt.notes {
            println!("      {}", style(notes).dim());
        }
    }

    if let Some(output_dir) = output_dir {
        let path = ReportWriter::new(output_dir).write_prompt_comparison(&ranked)?;
        println!("\n  {} {}", style("CSV:").dim(), path.display());
    }
    Ok(())
}

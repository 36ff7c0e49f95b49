//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod aggregate;
mod check;
mod classify;
mod models;
mod prompts;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use doctriage::config::{load_config, LoadOptions};

#[derive(Parser)]
#[command(name = "doctriage")]
#[command(about = "Benchmark document-type classification with hosted vision models")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Run settings that can be given on the command line.
#[derive(clap::Args, Debug, Default)]
pub struct RunArgs {
    /// Model to classify with (see `doctriage models`)
    #[arg(short, long)]
    model: Option<String>,
    /// Pages sent per document
    #[arg(short, long)]
    pages: Option<usize>,
    /// Maximum concurrent API calls (1-10)
    #[arg(short = 'j', long)]
    parallel: Option<usize>,
    /// Soft budget in USD
    #[arg(long)]
    budget: Option<f64>,
    /// Retries after the first attempt
    #[arg(long)]
    max_retries: Option<u32>,
    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Classify the PDF text layer instead of page images
    #[arg(long)]
    text_mode: bool,
    /// Validation dataset CSV
    #[arg(long)]
    validation_file: Option<PathBuf>,
    /// Directory holding documents listed by `file_name`
    #[arg(long)]
    docs_dir: Option<PathBuf>,
    /// Prompt template file
    #[arg(long)]
    prompt_file: Option<PathBuf>,
    /// Directory for report files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Only classify documents whose name contains this text
    #[arg(long)]
    filter: Option<String>,
    /// Classify at most this many documents
    #[arg(short, long)]
    limit: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the validation dataset and write run reports
    Classify {
        #[command(flatten)]
        run: RunArgs,
        /// Repeat the run this many times, then aggregate consistency
        #[arg(long, default_value = "1")]
        runs: usize,
    },

    /// Aggregate detailed run files into consistency reports
    Aggregate {
        /// Run files to aggregate (default: every run file in the results directory)
        files: Vec<PathBuf>,
        /// Directory to search for run files and write reports to
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Only aggregate runs of this engine (e.g. gemini-2.0-flash)
        #[arg(short, long)]
        engine: Option<String>,
    },

    /// Rank prompt-optimisation results by accuracy
    Prompts {
        /// Directory of prompt result JSON files
        #[arg(default_value = "results")]
        dir: PathBuf,
        /// Also write a CSV into this directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Check credentials and required tools for a model
    Check {
        /// Model to check (default: configured model)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List supported models and their prices
    Models,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
    };
    let config = load_config(&options).await?;

    match cli.command {
        Commands::Classify { run, runs } => classify::cmd_classify(&config, &run, runs).await,
        Commands::Aggregate { files, dir, engine } => {
            aggregate::cmd_aggregate(&config, files, dir, engine.as_deref())
        }
        Commands::Prompts { dir, output_dir } => {
            prompts::cmd_prompts(&dir, output_dir.as_deref())
        }
        Commands::Check { model } => check::cmd_check(&config, model.as_deref()),
        Commands::Models => {
            models::cmd_models();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_classify_flags() {
        let cli = Cli::try_parse_from([
            "doctriage", "classify", "-m", "gpt-4o", "-p", "3", "-j", "4", "--runs", "5",
            "--text-mode", "--limit", "10",
        ])
        .unwrap();
        match cli.command {
            Commands::Classify { run, runs } => {
                assert_eq!(run.model.as_deref(), Some("gpt-4o"));
                assert_eq!(run.pages, Some(3));
                assert_eq!(run.parallel, Some(4));
                assert_eq!(run.limit, Some(10));
                assert!(run.text_mode);
                assert_eq!(runs, 5);
            }
            _ => panic!("expected classify"),
        }
    }
}

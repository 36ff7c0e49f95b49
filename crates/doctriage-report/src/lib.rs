//! Scoring and reporting for doctriage runs.
//!
//! - [`summary`]: statistics of a single run
//! - [`consistency`]: agreement of predictions across repeated runs
//! - [`compare`]: ranking of prompt-optimisation results
//! - [`output`]: JSON, CSV and HTML files

pub mod compare;
pub mod consistency;
pub mod output;
pub mod summary;

pub use compare::{load_prompt_results, rank_prompts};
pub use consistency::{analyze_consistency, load_run_files, summarize_runs};
pub use output::{ReportError, ReportWriter, RunReport};
pub use summary::{score_documents, summarize, SummaryOptions};

//! Progress display for classification runs.

use std::sync::Arc;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use doctriage::models::ClassificationResult;
use doctriage_analysis::pipeline::ProgressCallback;

/// One bar per run, advanced as documents finish.
pub struct RunProgress {
    bar: ProgressBar,
}

impl RunProgress {
    pub fn new(total: usize, label: &str) -> Self {
        let bar = ProgressBar::new(total as u64);
        if let Ok(progress_style) = ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len} ({elapsed})")
        {
            bar.set_style(progress_style.progress_chars("█▓░"));
        }
        bar.set_message(label.to_string());
        Self { bar }
    }

    /// Callback for the pipeline; failed documents are printed above the bar.
    pub fn callback(&self) -> ProgressCallback {
        let bar = self.bar.clone();
        Arc::new(move |result: &ClassificationResult| {
            if let Some(ref error) = result.error {
                bar.println(format!(
                    "  {} {}: {}",
                    style("✗").red(),
                    result.document_id,
                    error
                ));
            }
            bar.inc(1);
        })
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

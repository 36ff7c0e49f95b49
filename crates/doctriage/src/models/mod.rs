//! Domain models shared across the workspace.

mod result;
mod summary;
mod task;
mod usage;
mod validation;

pub mod duration_secs;

pub use result::ClassificationResult;
pub use summary::{
    ConsistencyRecord, MultiRunSummary, PromptResult, RunFile, RunPoint, RunSummary,
    ScoredDocument, TokenTotals,
};
pub use task::{ClassificationTask, DocumentContent, PageImage};
pub use usage::{UsageLedger, UsageRecord, UsageTotals};
pub use validation::ValidationRecord;

/// Label recorded when no classification could be extracted.
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

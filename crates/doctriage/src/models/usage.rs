use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One API attempt. Appended once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub model_name: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    /// Pages processed, for page-billed OCR calls.
    #[serde(default)]
    pub pages: u64,
    pub cost: f64,
    /// Retry index of this attempt (0 for the first).
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Running totals across all attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub cost: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub pages: u64,
    pub attempts: u64,
}

#[derive(Debug, Default)]
struct LedgerState {
    records: Vec<UsageRecord>,
    totals: UsageTotals,
}

/// Append-only usage history with running totals.
///
/// A single mutex serializes appends so totals stay consistent with the
/// record list under concurrent tasks.
#[derive(Debug, Default)]
pub struct UsageLedger {
    state: Mutex<LedgerState>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: UsageRecord) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.totals.cost += record.cost;
        state.totals.input_tokens += record.input_tokens;
        state.totals.output_tokens += record.output_tokens;
        state.totals.total_tokens += record.total_tokens;
        state.totals.pages += record.pages;
        state.totals.attempts += 1;
        state.records.push(record);
    }

    pub fn totals(&self) -> UsageTotals {
        match self.state.lock() {
            Ok(guard) => guard.totals,
            Err(poisoned) => poisoned.into_inner().totals,
        }
    }

    /// Copy of all records in append order.
    pub fn records(&self) -> Vec<UsageRecord> {
        match self.state.lock() {
            Ok(guard) => guard.records.clone(),
            Err(poisoned) => poisoned.into_inner().records.clone(),
        }
    }
}

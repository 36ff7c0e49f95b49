//! Counting-semaphore governor for in-flight API calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default number of concurrent calls.
pub const DEFAULT_PARALLEL: usize = 5;

/// Largest accepted concurrency.
pub const MAX_PARALLEL: usize = 10;

#[derive(Debug, Error)]
pub enum GovernorError {
    #[error("governor closed")]
    Closed,
}

/// Bounds the number of concurrently executing provider calls.
///
/// Cloning shares the same semaphore and counters.
#[derive(Debug, Clone)]
pub struct Governor {
    semaphore: Arc<Semaphore>,
    limit: usize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Default for Governor {
    fn default() -> Self {
        Self::new(DEFAULT_PARALLEL)
    }
}

impl Governor {
    /// Create a governor, clamping the limit to `1..=MAX_PARALLEL`.
    pub fn new(limit: usize) -> Self {
        let clamped = clamp_limit(limit);
        Self {
            semaphore: Arc::new(Semaphore::new(clamped)),
            limit: clamped,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Calls currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously held permits observed.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Wait for a permit. Dropping the permit releases it.
    pub async fn acquire(&self) -> Result<GovernorPermit, GovernorError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GovernorError::Closed)?;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        Ok(GovernorPermit {
            _permit: permit,
            in_flight: self.in_flight.clone(),
        })
    }
}

/// RAII permit held for the duration of one provider call.
#[derive(Debug)]
pub struct GovernorPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for GovernorPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn clamp_limit(limit: usize) -> usize {
    if limit == 0 {
        tracing::warn!("Parallel limit 0 is invalid, using 1");
        1
    } else if limit > MAX_PARALLEL {
        tracing::warn!(
            "Parallel limit {} exceeds maximum of {}, clamping",
            limit,
            MAX_PARALLEL
        );
        MAX_PARALLEL
    } else {
        limit
    }
}

//! Retrying clients that price every attempt into the usage ledger.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use doctriage::models::{UsageLedger, UsageRecord, UsageTotals};
use doctriage::pricing::{estimate_input_tokens, estimate_tokens, Pricing, TokenCounts};
use doctriage::rate_limit::{Governor, GovernorPermit, RetryPolicy};

use super::backend::{OcrBackend, ProviderResponse, VisionBackend, VisionError, VisionRequest};

/// A successful call after zero or more retries.
#[derive(Debug, Clone)]
pub struct Completion {
    pub response: ProviderResponse,
    pub token_counts: TokenCounts,
    pub cost: f64,
    /// Pages billed, for OCR calls.
    pub pages: u64,
    /// Duration of the successful attempt.
    pub response_time: Duration,
    pub retries: u32,
}

impl Completion {
    pub fn text(&self) -> String {
        self.response.text()
    }
}

/// A call that failed on its last attempt.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct CallFailure {
    #[source]
    pub error: VisionError,
    /// Retries made before giving up.
    pub retries: u32,
}

async fn permit(governor: &Governor) -> Result<GovernorPermit, CallFailure> {
    governor.acquire().await.map_err(|e| CallFailure {
        error: VisionError::NotAvailable(e.to_string()),
        retries: 0,
    })
}

struct Attempted<T> {
    value: T,
    retries: u32,
    elapsed: Duration,
}

/// Run `attempt` until it succeeds, fails permanently, or the policy runs out.
///
/// Every failed attempt is recorded in the ledger with zero tokens and cost.
async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    ledger: &UsageLedger,
    model: &str,
    mut attempt: F,
) -> Result<Attempted<T>, CallFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, VisionError>>,
{
    let mut retry = 0;
    loop {
        let start = Instant::now();
        match attempt().await {
            Ok(value) => {
                return Ok(Attempted {
                    value,
                    retries: retry,
                    elapsed: start.elapsed(),
                })
            }
            Err(error) => {
                ledger.record(UsageRecord {
                    timestamp: Utc::now(),
                    model_name: model.to_string(),
                    input_tokens: 0,
                    output_tokens: 0,
                    total_tokens: 0,
                    pages: 0,
                    cost: 0.0,
                    retries: retry,
                    error: Some(error.to_string()),
                });

                if !error.is_retryable() || retry >= policy.max_retries {
                    return Err(CallFailure {
                        error,
                        retries: retry,
                    });
                }

                retry += 1;
                let wait = policy.delay_for(retry, error.is_rate_limited());
                warn!(
                    "{} call failed ({}), retry {}/{} in {:?}",
                    model, error, retry, policy.max_retries, wait
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}

/// Classification calls against one vision or text model.
#[derive(Clone)]
pub struct VisionClient {
    backend: Arc<dyn VisionBackend>,
    pricing: Pricing,
    retry: RetryPolicy,
    ledger: Arc<UsageLedger>,
}

impl VisionClient {
    pub fn new(
        backend: Arc<dyn VisionBackend>,
        pricing: Pricing,
        retry: RetryPolicy,
        ledger: Arc<UsageLedger>,
    ) -> Self {
        Self {
            backend,
            pricing,
            retry,
            ledger,
        }
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    pub fn backend(&self) -> &dyn VisionBackend {
        self.backend.as_ref()
    }

    /// Running totals of every attempt made through this client's ledger.
    pub fn totals(&self) -> UsageTotals {
        self.ledger.totals()
    }

    /// [`complete`](Self::complete) while holding a governor permit.
    ///
    /// The permit covers every retry of the document and is released when the
    /// call returns or the future is dropped.
    pub async fn complete_governed(
        &self,
        governor: &Governor,
        request: &VisionRequest<'_>,
    ) -> Result<Completion, CallFailure> {
        let _permit = permit(governor).await?;
        self.complete(request).await
    }

    /// Classify one document, retrying per the policy.
    pub async fn complete(&self, request: &VisionRequest<'_>) -> Result<Completion, CallFailure> {
        let model = self.backend.model_name().to_string();
        let attempted = with_retries(&self.retry, &self.ledger, &model, || {
            self.backend.complete(request)
        })
        .await?;

        let response = attempted.value;
        let token_counts = match &response {
            ProviderResponse::Chat {
                reported_usage: Some(usage),
                ..
            } => TokenCounts::reported(usage.input_tokens, usage.output_tokens),
            _ => {
                let (prompt, document_text) = request.prompt_parts();
                TokenCounts::estimated(
                    estimate_input_tokens(&prompt, document_text, request.images().len()),
                    estimate_tokens(&response.text()),
                )
            }
        };
        let cost = self.pricing.token_cost(token_counts.input, token_counts.output);

        self.ledger.record(UsageRecord {
            timestamp: Utc::now(),
            model_name: model.clone(),
            input_tokens: token_counts.input,
            output_tokens: token_counts.output,
            total_tokens: token_counts.total,
            pages: 0,
            cost,
            retries: attempted.retries,
            error: None,
        });
        debug!(
            "{} responded in {:?} ({} tokens, ${:.6})",
            model, attempted.elapsed, token_counts.total, cost
        );

        Ok(Completion {
            response,
            token_counts,
            cost,
            pages: 0,
            response_time: attempted.elapsed,
            retries: attempted.retries,
        })
    }
}

/// OCR calls against a page-billed model.
#[derive(Clone)]
pub struct OcrClient {
    backend: Arc<dyn OcrBackend>,
    pricing: Pricing,
    retry: RetryPolicy,
    ledger: Arc<UsageLedger>,
}

impl OcrClient {
    pub fn new(
        backend: Arc<dyn OcrBackend>,
        pricing: Pricing,
        retry: RetryPolicy,
        ledger: Arc<UsageLedger>,
    ) -> Self {
        Self {
            backend,
            pricing,
            retry,
            ledger,
        }
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    pub fn backend(&self) -> &dyn OcrBackend {
        self.backend.as_ref()
    }

    /// [`ocr`](Self::ocr) while holding a governor permit.
    pub async fn ocr_governed(
        &self,
        governor: &Governor,
        pdf_path: &Path,
        max_pages: usize,
    ) -> Result<Completion, CallFailure> {
        let _permit = permit(governor).await?;
        self.ocr(pdf_path, max_pages).await
    }

    /// Extract text from the first `max_pages` pages, retrying per the policy.
    pub async fn ocr(&self, pdf_path: &Path, max_pages: usize) -> Result<Completion, CallFailure> {
        let model = self.backend.model_name().to_string();
        let attempted = with_retries(&self.retry, &self.ledger, &model, || {
            self.backend.ocr(pdf_path, max_pages)
        })
        .await?;

        let response = attempted.value;
        let pages = match &response {
            ProviderResponse::Ocr { pages } => pages.len() as u64,
            ProviderResponse::Chat { .. } => 0,
        };
        let cost = self.pricing.page_cost(pages);

        self.ledger.record(UsageRecord {
            timestamp: Utc::now(),
            model_name: model,
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            pages,
            cost,
            retries: attempted.retries,
            error: None,
        });

        Ok(Completion {
            response,
            token_counts: TokenCounts::default(),
            cost,
            pages,
            response_time: attempted.elapsed,
            retries: attempted.retries,
        })
    }
}
